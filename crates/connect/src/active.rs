//! Active store selection: local store without a credential, one shared
//! remote-backed store per credential.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use haushalt_core::finance::{FinanceStore, LocalFinanceStore};
use haushalt_core::storage::SafeStorage;

use crate::client::FinanceApiClient;
use crate::offline::{ConnectivitySignal, OfflineSyncedStore};
use crate::session::{self, SyncSession};

/// Owns the per-session context: the API client, the persistence adapter,
/// the connectivity signal and one [`SyncSession`] per credential.
pub struct StoreRegistry {
    client: Arc<FinanceApiClient>,
    storage: Arc<SafeStorage>,
    signal: ConnectivitySignal,
    local: Arc<LocalFinanceStore>,
    sessions: Mutex<HashMap<String, OfflineSyncedStore>>,
}

impl StoreRegistry {
    pub fn new(client: FinanceApiClient, storage: Arc<SafeStorage>) -> Self {
        Self {
            client: Arc::new(client),
            local: Arc::new(LocalFinanceStore::new(Arc::clone(&storage))),
            storage,
            signal: ConnectivitySignal::new(),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Notify all registered sessions that connectivity returned; each
    /// attempts a pending flush.
    pub fn connectivity_restored(&self) {
        self.signal.restored();
    }

    /// The store the UI should talk to. An explicit credential wins; absent
    /// one, the stored session token decides. No credential routes to the
    /// local store, a credential to the remote-backed offline store for that
    /// credential (created once, then reused, so the online-flush
    /// subscription stays unique).
    pub fn active_store(&self, token: Option<String>) -> Arc<dyn FinanceStore> {
        let token = token.or_else(|| session::read_access_token(&self.storage));
        let Some(token) = token else {
            return Arc::clone(&self.local) as Arc<dyn FinanceStore>;
        };

        let mut sessions = self.sessions.lock().unwrap();
        let store = sessions
            .entry(token.clone())
            .or_insert_with(|| {
                let session = Arc::new(SyncSession::new(Arc::clone(&self.storage), token));
                let store = OfflineSyncedStore::new(Arc::clone(&self.client), session);
                store.register_online_flush(&self.signal);
                store
            })
            .clone();
        Arc::new(store)
    }
}
