//! Per-credential sync session: the cache slot, the single pending-write
//! slot, and the access-token slot held by the browsing session.
//!
//! Slots are plain storage keys scoped by a fingerprint of the credential,
//! so two credentials never share offline state. The session object is
//! constructed once per authenticated credential and owned by the store
//! registry; there is no module-global slot state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::warn;
use sha2::{Digest, Sha256};

use haushalt_core::finance::{parse_document, FinanceData};
use haushalt_core::storage::SafeStorage;

/// Slot holding the session's bearer token.
pub const ACCESS_TOKEN_KEY: &str = "auth_access_token";

const CACHE_KEY_PREFIX: &str = "finance_backend_cache_v1";
const PENDING_KEY_PREFIX: &str = "finance_backend_pending_v1";

pub fn read_access_token(storage: &SafeStorage) -> Option<String> {
    storage.read(ACCESS_TOKEN_KEY).filter(|t| !t.is_empty())
}

pub fn store_access_token(storage: &SafeStorage, token: &str) {
    storage.write(ACCESS_TOKEN_KEY, Some(token));
}

pub fn clear_access_token(storage: &SafeStorage) {
    storage.write(ACCESS_TOKEN_KEY, None);
}

fn credential_fingerprint(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    digest
        .iter()
        .take(8)
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// Offline-sync state for one authenticated credential: the last known-good
/// remote document and at most one unconfirmed write.
pub struct SyncSession {
    token: String,
    cache_key: String,
    pending_key: String,
    storage: Arc<SafeStorage>,
    online_flush_registered: AtomicBool,
}

impl SyncSession {
    pub fn new(storage: Arc<SafeStorage>, token: impl Into<String>) -> Self {
        let token = token.into();
        let fingerprint = credential_fingerprint(&token);
        Self {
            cache_key: format!("{}_{}", CACHE_KEY_PREFIX, fingerprint),
            pending_key: format!("{}_{}", PENDING_KEY_PREFIX, fingerprint),
            token,
            storage,
            online_flush_registered: AtomicBool::new(false),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Last known-good remote document, if one has been cached.
    pub fn read_cached(&self) -> Option<FinanceData> {
        self.storage
            .read(&self.cache_key)
            .and_then(|raw| parse_document(&raw))
    }

    pub fn write_cached(&self, data: &FinanceData) {
        self.write_slot(&self.cache_key, data);
    }

    /// The most recent write not yet confirmed by the backend, if any.
    pub fn read_pending(&self) -> Option<FinanceData> {
        self.storage
            .read(&self.pending_key)
            .and_then(|raw| parse_document(&raw))
    }

    pub fn write_pending(&self, data: Option<&FinanceData>) {
        match data {
            Some(data) => self.write_slot(&self.pending_key, data),
            None => self.storage.write(&self.pending_key, None),
        }
    }

    fn write_slot(&self, key: &str, data: &FinanceData) {
        match serde_json::to_string(data) {
            Ok(raw) => self.storage.write(key, Some(&raw)),
            Err(err) => warn!("failed to serialize finance document for {key}: {err}"),
        }
    }

    /// Claim the one online-flush subscription for this session. Returns
    /// false if already claimed.
    pub(crate) fn try_register_online_flush(&self) -> bool {
        !self.online_flush_registered.swap(true, Ordering::SeqCst)
    }
}
