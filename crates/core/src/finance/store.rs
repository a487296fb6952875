//! The store contract shared by local and remote-backed persistence, plus
//! the local implementation.

use std::sync::Arc;

use async_trait::async_trait;
use log::warn;

use crate::errors::Result;
use crate::finance::migration::parse_document;
use crate::finance::model::{
    Expense, FinanceCategory, FinanceData, Income, NetWorthSnapshot, RecurringBill,
    DEFAULT_CURRENCY,
};
use crate::storage::SafeStorage;

/// Default slot key for the primary local document.
pub const FINANCE_DATA_KEY: &str = "finance_data_v1";

/// CRUD façade over one finance document.
///
/// `get` and `set` never fail: schema mismatches resolve to the default
/// document and transport/persistence failures are absorbed by the
/// implementation. The one surfaced failure is the referential-integrity
/// check in `delete_category`.
///
/// Convenience methods are read-modify-write and are not serialized against
/// each other; two overlapping calls on the same instance can lose one
/// update. Callers issue them from discrete form submissions and await each
/// call, which is the supported usage.
#[async_trait]
pub trait FinanceStore: Send + Sync {
    async fn get(&self) -> FinanceData;
    async fn set(&self, next: FinanceData);

    async fn upsert_category(&self, category: FinanceCategory);
    async fn delete_category(&self, category_id: &str) -> Result<()>;

    async fn upsert_expense(&self, expense: Expense);
    async fn delete_expense(&self, expense_id: &str);

    async fn upsert_income(&self, income: Income);
    async fn delete_income(&self, income_id: &str);

    async fn upsert_recurring_bill(&self, bill: RecurringBill);
    async fn delete_recurring_bill(&self, bill_id: &str);

    async fn upsert_net_worth_snapshot(&self, snapshot: NetWorthSnapshot);
    async fn delete_net_worth_snapshot(&self, snapshot_id: &str);
}

/// Store over the local persistence adapter: one JSON blob in one slot,
/// normalized on every load.
pub struct LocalFinanceStore {
    storage: Arc<SafeStorage>,
    slot_key: String,
}

impl LocalFinanceStore {
    pub fn new(storage: Arc<SafeStorage>) -> Self {
        Self::with_slot_key(storage, FINANCE_DATA_KEY)
    }

    pub fn with_slot_key(storage: Arc<SafeStorage>, slot_key: impl Into<String>) -> Self {
        Self {
            storage,
            slot_key: slot_key.into(),
        }
    }

    fn load(&self) -> FinanceData {
        self.storage
            .read(&self.slot_key)
            .and_then(|raw| parse_document(&raw))
            .unwrap_or_else(|| FinanceData::default_data(DEFAULT_CURRENCY))
    }

    fn persist(&self, data: &FinanceData) {
        match serde_json::to_string(data) {
            Ok(raw) => self.storage.write(&self.slot_key, Some(&raw)),
            Err(err) => warn!("failed to serialize finance document: {err}"),
        }
    }
}

#[async_trait]
impl FinanceStore for LocalFinanceStore {
    async fn get(&self) -> FinanceData {
        self.load()
    }

    async fn set(&self, next: FinanceData) {
        self.persist(&next);
    }

    async fn upsert_category(&self, category: FinanceCategory) {
        let mut data = self.load();
        data.upsert_category(category);
        self.persist(&data);
    }

    async fn delete_category(&self, category_id: &str) -> Result<()> {
        let mut data = self.load();
        data.delete_category(category_id)?;
        self.persist(&data);
        Ok(())
    }

    async fn upsert_expense(&self, expense: Expense) {
        let mut data = self.load();
        data.upsert_expense(expense);
        self.persist(&data);
    }

    async fn delete_expense(&self, expense_id: &str) {
        let mut data = self.load();
        data.delete_expense(expense_id);
        self.persist(&data);
    }

    async fn upsert_income(&self, income: Income) {
        let mut data = self.load();
        data.upsert_income(income);
        self.persist(&data);
    }

    async fn delete_income(&self, income_id: &str) {
        let mut data = self.load();
        data.delete_income(income_id);
        self.persist(&data);
    }

    async fn upsert_recurring_bill(&self, bill: RecurringBill) {
        let mut data = self.load();
        data.upsert_recurring_bill(bill);
        self.persist(&data);
    }

    async fn delete_recurring_bill(&self, bill_id: &str) {
        let mut data = self.load();
        data.delete_recurring_bill(bill_id);
        self.persist(&data);
    }

    async fn upsert_net_worth_snapshot(&self, snapshot: NetWorthSnapshot) {
        let mut data = self.load();
        data.upsert_net_worth_snapshot(snapshot);
        self.persist(&data);
    }

    async fn delete_net_worth_snapshot(&self, snapshot_id: &str) {
        let mut data = self.load();
        data.delete_net_worth_snapshot(snapshot_id);
        self.persist(&data);
    }
}
