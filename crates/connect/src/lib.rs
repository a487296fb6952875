//! Remote persistence for the haushalt finance document: the typed REST
//! client, the offline-capable store with optimistic writes and a single
//! pending-write slot, and active-store selection per session.

mod active;
mod client;
mod error;
mod offline;
mod session;

pub use active::StoreRegistry;
pub use client::{AuthToken, FinanceApiClient};
pub use error::{ConnectError, Result};
pub use offline::{ConnectivitySignal, OfflineSyncedStore};
pub use session::{
    clear_access_token, read_access_token, store_access_token, SyncSession, ACCESS_TOKEN_KEY,
};

#[cfg(test)]
pub(crate) mod testing;
