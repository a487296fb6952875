//! Remote-backed finance store with optimistic offline synchronization.
//!
//! Reads flush the pending slot best-effort, then prefer fresh server state
//! and fall back to the cached copy. Writes are optimistic: a failed remote
//! write is cached locally and parked in the single pending slot, to be
//! flushed on the next read or on a connectivity-restored signal. Conflict
//! policy is last-writer-wins on the whole document; a stale pending flush
//! overwrites server state.

use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, warn};
use tokio::sync::broadcast;

use haushalt_core::errors::Result as CoreResult;
use haushalt_core::finance::{
    Expense, FinanceCategory, FinanceData, FinanceStore, Income, NetWorthSnapshot, RecurringBill,
    DEFAULT_CURRENCY,
};

use crate::client::FinanceApiClient;
use crate::error::Result;
use crate::session::SyncSession;

/// Connectivity-restored signal, standing in for the browser `online` event.
#[derive(Debug, Clone)]
pub struct ConnectivitySignal {
    tx: broadcast::Sender<()>,
}

impl ConnectivitySignal {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(8);
        Self { tx }
    }

    /// Fire the signal. Subscribed sessions attempt a pending flush.
    pub fn restored(&self) {
        let _ = self.tx.send(());
    }

    fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }
}

impl Default for ConnectivitySignal {
    fn default() -> Self {
        Self::new()
    }
}

/// [`FinanceStore`] over the remote API, resilient to transient network
/// failure: `get` and `set` never fail and user writes are never dropped.
#[derive(Clone)]
pub struct OfflineSyncedStore {
    client: Arc<FinanceApiClient>,
    session: Arc<SyncSession>,
}

impl OfflineSyncedStore {
    pub fn new(client: Arc<FinanceApiClient>, session: Arc<SyncSession>) -> Self {
        Self { client, session }
    }

    pub fn session(&self) -> &Arc<SyncSession> {
        &self.session
    }

    /// Flush the pending slot if it holds a document. On success the slot is
    /// cleared and the cache updated; on failure the slot is left intact for
    /// the next opportunity.
    pub async fn sync_pending(&self) -> Result<()> {
        let Some(pending) = self.session.read_pending() else {
            return Ok(());
        };
        self.client
            .put_document(self.session.token(), &pending)
            .await?;
        self.session.write_pending(None);
        self.session.write_cached(&pending);
        Ok(())
    }

    /// Subscribe this session to the connectivity-restored signal. Idempotent
    /// per credential: a second registration is a no-op, so one signal never
    /// triggers duplicate flush attempts.
    pub fn register_online_flush(&self, signal: &ConnectivitySignal) {
        if !self.session.try_register_online_flush() {
            return;
        }
        let mut rx = signal.subscribe();
        let store = self.clone();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => {
                        if let Err(err) = store.sync_pending().await {
                            warn!("online flush failed; keeping pending write: {err}");
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }

    async fn update<F>(&self, mutate: F)
    where
        F: FnOnce(&mut FinanceData) + Send,
    {
        let mut data = self.get().await;
        mutate(&mut data);
        self.set(data).await;
    }
}

#[async_trait]
impl FinanceStore for OfflineSyncedStore {
    async fn get(&self) -> FinanceData {
        if let Err(err) = self.sync_pending().await {
            debug!("pending flush before read failed: {err}");
        }
        match self.client.get_document(self.session.token()).await {
            Ok(Some(data)) => {
                // a successful fetch means the server is the fresher source
                self.session.write_cached(&data);
                self.session.write_pending(None);
                data
            }
            Ok(None) => {
                let data = FinanceData::default_data(DEFAULT_CURRENCY);
                self.session.write_cached(&data);
                data
            }
            Err(err) => {
                debug!("remote fetch failed; serving cached document: {err}");
                self.session
                    .read_cached()
                    .unwrap_or_else(|| FinanceData::default_data(DEFAULT_CURRENCY))
            }
        }
    }

    async fn set(&self, next: FinanceData) {
        match self.client.put_document(self.session.token(), &next).await {
            Ok(_) => {
                self.session.write_cached(&next);
                self.session.write_pending(None);
            }
            Err(err) => {
                warn!("remote write failed; queueing pending write: {err}");
                self.session.write_cached(&next);
                self.session.write_pending(Some(&next));
            }
        }
    }

    async fn upsert_category(&self, category: FinanceCategory) {
        self.update(|data| data.upsert_category(category)).await;
    }

    async fn delete_category(&self, category_id: &str) -> CoreResult<()> {
        let mut data = self.get().await;
        data.delete_category(category_id)?;
        self.set(data).await;
        Ok(())
    }

    async fn upsert_expense(&self, expense: Expense) {
        self.update(|data| data.upsert_expense(expense)).await;
    }

    async fn delete_expense(&self, expense_id: &str) {
        self.update(|data| data.delete_expense(expense_id)).await;
    }

    async fn upsert_income(&self, income: Income) {
        self.update(|data| data.upsert_income(income)).await;
    }

    async fn delete_income(&self, income_id: &str) {
        self.update(|data| data.delete_income(income_id)).await;
    }

    async fn upsert_recurring_bill(&self, bill: RecurringBill) {
        self.update(|data| data.upsert_recurring_bill(bill)).await;
    }

    async fn delete_recurring_bill(&self, bill_id: &str) {
        self.update(|data| data.delete_recurring_bill(bill_id))
            .await;
    }

    async fn upsert_net_worth_snapshot(&self, snapshot: NetWorthSnapshot) {
        self.update(|data| data.upsert_net_worth_snapshot(snapshot))
            .await;
    }

    async fn delete_net_worth_snapshot(&self, snapshot_id: &str) {
        self.update(|data| data.delete_net_worth_snapshot(snapshot_id))
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{dead_server_url, start_mock_server, MockOutcome};
    use haushalt_core::storage::SafeStorage;
    use rust_decimal_macros::dec;

    fn session(storage: &Arc<SafeStorage>) -> Arc<SyncSession> {
        Arc::new(SyncSession::new(Arc::clone(storage), "tok_test"))
    }

    fn store_at(base_url: &str, session: &Arc<SyncSession>) -> OfflineSyncedStore {
        OfflineSyncedStore::new(
            Arc::new(FinanceApiClient::new(base_url)),
            Arc::clone(session),
        )
    }

    fn marked_doc() -> FinanceData {
        let mut data = FinanceData::default_data("EUR");
        data.upsert_expense(Expense {
            id: "exp_marker".to_string(),
            date: "2025-06-10".parse().unwrap(),
            name: "Coffee".to_string(),
            amount: haushalt_core::finance::Money::new(dec!(3.5), "EUR"),
            category_id: "cat_groceries".to_string(),
            notes: None,
        });
        data
    }

    fn doc_envelope(data: &FinanceData) -> String {
        serde_json::json!({ "data": data }).to_string()
    }

    #[tokio::test]
    async fn get_falls_back_to_cache_when_fetch_fails() {
        let storage = Arc::new(SafeStorage::in_memory());
        let session = session(&storage);
        let cached = marked_doc();
        session.write_cached(&cached);

        let store = store_at(&dead_server_url().await, &session);
        assert_eq!(store.get().await, cached);
    }

    #[tokio::test]
    async fn get_without_cache_synthesizes_the_default() {
        let storage = Arc::new(SafeStorage::in_memory());
        let session = session(&storage);
        let store = store_at(&dead_server_url().await, &session);
        assert_eq!(store.get().await, FinanceData::default_data("EUR"));
    }

    #[tokio::test]
    async fn successful_fetch_caches_and_clears_pending() {
        let remote = marked_doc();
        // first request is the pending flush (rejected), second the fetch
        let (base_url, _captured, server) = start_mock_server(vec![
            MockOutcome::respond(500, r#"{"detail":"nope"}"#),
            MockOutcome::respond(200, &doc_envelope(&remote)),
        ])
        .await;

        let storage = Arc::new(SafeStorage::in_memory());
        let session = session(&storage);
        session.write_pending(Some(&FinanceData::default_data("EUR")));

        let store = store_at(&base_url, &session);
        assert_eq!(store.get().await, remote);
        assert!(session.read_pending().is_none());
        assert_eq!(session.read_cached(), Some(remote));

        server.abort();
    }

    #[tokio::test]
    async fn empty_remote_document_yields_a_cached_default() {
        let (base_url, _captured, server) =
            start_mock_server(vec![MockOutcome::respond(200, r#"{"data": null}"#)]).await;

        let storage = Arc::new(SafeStorage::in_memory());
        let session = session(&storage);
        let store = store_at(&base_url, &session);

        let data = store.get().await;
        assert_eq!(data, FinanceData::default_data("EUR"));
        assert_eq!(session.read_cached(), Some(data));

        server.abort();
    }

    #[tokio::test]
    async fn failed_set_is_optimistic_and_parks_the_write() {
        let storage = Arc::new(SafeStorage::in_memory());
        let session = session(&storage);
        let store = store_at(&dead_server_url().await, &session);

        let doc = marked_doc();
        store.set(doc.clone()).await;

        // caller saw success; the write waits in the pending slot and the
        // optimistic view is cached
        assert_eq!(session.read_pending(), Some(doc.clone()));
        assert_eq!(session.read_cached(), Some(doc));
    }

    #[tokio::test]
    async fn flush_clears_pending_and_updates_cache() {
        let storage = Arc::new(SafeStorage::in_memory());
        let session = session(&storage);

        let doc = marked_doc();
        store_at(&dead_server_url().await, &session).set(doc.clone()).await;
        assert!(session.read_pending().is_some());

        let (base_url, captured, server) =
            start_mock_server(vec![MockOutcome::respond(200, &doc_envelope(&doc))]).await;
        let store = store_at(&base_url, &session);
        store.sync_pending().await.unwrap();

        assert!(session.read_pending().is_none());
        assert_eq!(session.read_cached(), Some(doc));
        let requests = captured.lock().await.clone();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, "PUT");

        server.abort();
    }

    #[tokio::test]
    async fn failed_flush_leaves_the_pending_slot_intact() {
        let storage = Arc::new(SafeStorage::in_memory());
        let session = session(&storage);
        let doc = marked_doc();
        session.write_pending(Some(&doc));

        let store = store_at(&dead_server_url().await, &session);
        assert!(store.sync_pending().await.is_err());
        assert_eq!(session.read_pending(), Some(doc));
    }

    #[tokio::test]
    async fn connectivity_signal_triggers_the_flush() {
        let storage = Arc::new(SafeStorage::in_memory());
        let session = session(&storage);
        let doc = marked_doc();
        session.write_pending(Some(&doc));

        let (base_url, captured, server) =
            start_mock_server(vec![MockOutcome::respond(200, &doc_envelope(&doc))]).await;
        let store = store_at(&base_url, &session);

        let signal = ConnectivitySignal::new();
        store.register_online_flush(&signal);
        store.register_online_flush(&signal); // idempotent
        signal.restored();

        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        assert!(session.read_pending().is_none());
        assert_eq!(captured.lock().await.len(), 1);

        server.abort();
    }

    #[tokio::test]
    async fn convenience_methods_compose_get_and_set() {
        let initial = FinanceData::default_data("EUR");
        let mut after = initial.clone();
        after.upsert_expense(marked_doc().expenses[0].clone());

        let (base_url, captured, server) = start_mock_server(vec![
            MockOutcome::respond(200, &doc_envelope(&initial)), // get
            MockOutcome::respond(200, &doc_envelope(&after)),   // set
        ])
        .await;

        let storage = Arc::new(SafeStorage::in_memory());
        let session = session(&storage);
        let store = store_at(&base_url, &session);
        store.upsert_expense(marked_doc().expenses[0].clone()).await;

        let requests = captured.lock().await.clone();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].method, "GET");
        assert_eq!(requests[1].method, "PUT");
        assert!(requests[1].body.contains("exp_marker"));

        server.abort();
    }
}
