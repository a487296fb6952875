//! The versioned finance document and its pure document-level operations.
//!
//! Both the local store and the remote-backed store mutate state through the
//! operations on [`FinanceData`]; the stores themselves only decide where
//! the document is persisted.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::errors::{FinanceError, Result};
use crate::ids::uid;

/// On-disk schema version this build reads and writes.
pub const SCHEMA_VERSION: u32 = 1;

/// Currency used when a document has to be synthesized client-side.
pub const DEFAULT_CURRENCY: &str = "EUR";

/// A monetary value in major units, e.g. `12.34 EUR`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    pub amount: Decimal,
    pub currency: String,
}

impl Money {
    pub fn new(amount: Decimal, currency: impl Into<String>) -> Self {
        Self {
            amount,
            currency: currency.into(),
        }
    }

    pub fn zero(currency: impl Into<String>) -> Self {
        Self::new(Decimal::ZERO, currency)
    }
}

/// A calendar month, serialized as `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    year: i32,
    month: u32,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid year-month (expected YYYY-MM): {0}")]
pub struct ParseYearMonthError(String);

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// The month containing today, used when legacy data carries no month.
    pub fn current() -> Self {
        Self::from_date(chrono::Utc::now().date_naive())
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn first_day(&self) -> NaiveDate {
        // month is validated at construction
        NaiveDate::from_ymd_opt(self.year, self.month, 1).expect("valid year-month")
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = ParseYearMonthError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let invalid = || ParseYearMonthError(s.to_string());
        let (year, month) = s.split_once('-').ok_or_else(invalid)?;
        if year.len() != 4 || month.len() != 2 {
            return Err(invalid());
        }
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        Self::new(year, month).ok_or_else(invalid)
    }
}

impl Serialize for YearMonth {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for YearMonth {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// A spending bucket. Deletion is blocked while referenced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinanceCategory {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// A single point-in-time spend event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    pub id: String,
    pub date: NaiveDate,
    pub name: String,
    pub amount: Money,
    pub category_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// A single point-in-time income event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Income {
    pub id: String,
    pub date: NaiveDate,
    pub name: String,
    pub amount: Money,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// One step of a bill's amount history, effective from `effective_month` on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmountChange {
    pub effective_month: YearMonth,
    pub amount: Money,
}

/// A monthly obligation recurring from `start_month` onward while `active`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurringBill {
    pub id: String,
    pub name: String,
    pub category_id: String,
    pub due_day: u8,
    pub start_month: YearMonth,
    pub amount_history: Vec<AmountChange>,
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl RecurringBill {
    /// Amount in force for `month`: the latest history entry at or before
    /// that month (step function). `None` before `start_month`.
    pub fn amount_for_month(&self, month: YearMonth) -> Option<&Money> {
        if month < self.start_month {
            return None;
        }
        self.amount_history
            .iter()
            .filter(|change| change.effective_month <= month)
            .max_by_key(|change| change.effective_month)
            .map(|change| &change.amount)
    }

    /// Record an amount change effective from `month`. At most one entry per
    /// month: a change for an already-present month overwrites it. History
    /// stays sorted by effective month.
    pub fn set_amount_from(&mut self, month: YearMonth, amount: Money) {
        self.amount_history
            .retain(|change| change.effective_month != month);
        self.amount_history.push(AmountChange {
            effective_month: month,
            amount,
        });
        self.amount_history
            .sort_by_key(|change| change.effective_month);
    }
}

/// One account line inside a net-worth group, e.g. "Brokerage".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetWorthLine {
    pub id: String,
    pub name: String,
    pub amount: Money,
}

/// Canonical net-worth group ids.
pub const NET_WORTH_GROUPS: [(&str, &str); 3] = [
    ("liquid", "Liquid"),
    ("investment", "Investment"),
    ("material", "Material"),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetWorthGroup {
    pub id: String,
    pub name: String,
    pub lines: Vec<NetWorthLine>,
}

impl NetWorthGroup {
    pub fn empty(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            lines: Vec::new(),
        }
    }

    /// Lines are keyed by trimmed account name from the UI's perspective;
    /// storage stays id-keyed.
    pub fn upsert_line(&mut self, name: &str, amount: Money) {
        let name = name.trim();
        match self.lines.iter_mut().find(|line| line.name.trim() == name) {
            Some(line) => line.amount = amount,
            None => self.lines.push(NetWorthLine {
                id: uid("nwl"),
                name: name.to_string(),
                amount,
            }),
        }
    }
}

/// Net-worth snapshot, at most one per month (id is `nw_<month>`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetWorthSnapshot {
    pub id: String,
    pub month: YearMonth,
    pub groups: Vec<NetWorthGroup>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl NetWorthSnapshot {
    /// Fresh snapshot for `month` with the three canonical empty groups.
    pub fn for_month(month: YearMonth) -> Self {
        Self {
            id: format!("nw_{}", month),
            month,
            groups: NET_WORTH_GROUPS
                .iter()
                .map(|(id, name)| NetWorthGroup::empty(id, name))
                .collect(),
            notes: None,
        }
    }
}

/// The root finance document, persisted wholesale as one JSON blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinanceData {
    pub version: u32,
    pub currency: String,
    pub categories: Vec<FinanceCategory>,
    pub expenses: Vec<Expense>,
    pub incomes: Vec<Income>,
    pub recurring_bills: Vec<RecurringBill>,
    pub net_worth: Vec<NetWorthSnapshot>,
}

fn seed_category(id: &str, name: &str, color: &str) -> FinanceCategory {
    FinanceCategory {
        id: id.to_string(),
        name: name.to_string(),
        color: Some(color.to_string()),
    }
}

impl FinanceData {
    /// Default document materialized on first load of an empty slot.
    pub fn default_data(currency: impl Into<String>) -> Self {
        Self {
            version: SCHEMA_VERSION,
            currency: currency.into(),
            categories: vec![
                seed_category("cat_groceries", "Lebensmittel", "#22c55e"),
                seed_category("cat_car", "Auto", "#f97316"),
                seed_category("cat_sport", "Sport", "#3b82f6"),
                seed_category("cat_dog", "Hund", "#a855f7"),
                seed_category("cat_rent", "Miete", "#64748b"),
                seed_category("cat_subscriptions", "Abos", "#0ea5e9"),
            ],
            expenses: Vec::new(),
            incomes: Vec::new(),
            recurring_bills: Vec::new(),
            net_worth: Vec::new(),
        }
    }

    // ── Upserts: replace-or-append by id, then restore natural order ────

    pub fn upsert_category(&mut self, category: FinanceCategory) {
        put_by_id(&mut self.categories, category, |c| &c.id);
        self.categories
            .sort_by_cached_key(|c| c.name.to_lowercase());
    }

    pub fn upsert_expense(&mut self, expense: Expense) {
        put_by_id(&mut self.expenses, expense, |e| &e.id);
        self.expenses.sort_by(|a, b| b.date.cmp(&a.date));
    }

    pub fn upsert_income(&mut self, income: Income) {
        put_by_id(&mut self.incomes, income, |i| &i.id);
        self.incomes.sort_by(|a, b| b.date.cmp(&a.date));
    }

    pub fn upsert_recurring_bill(&mut self, bill: RecurringBill) {
        put_by_id(&mut self.recurring_bills, bill, |b| &b.id);
        self.recurring_bills
            .sort_by_cached_key(|b| b.name.to_lowercase());
    }

    /// Upsert keyed by id, but month uniqueness wins: any other snapshot
    /// carrying the same month is evicted first.
    pub fn upsert_net_worth_snapshot(&mut self, snapshot: NetWorthSnapshot) {
        self.net_worth
            .retain(|s| s.id != snapshot.id && s.month != snapshot.month);
        self.net_worth.push(snapshot);
        self.net_worth.sort_by_key(|s| s.month);
    }

    // ── Deletes ─────────────────────────────────────────────────────────

    /// Fails while any expense or recurring bill references the category.
    pub fn delete_category(&mut self, category_id: &str) -> Result<()> {
        let in_use = self.expenses.iter().any(|e| e.category_id == category_id)
            || self
                .recurring_bills
                .iter()
                .any(|b| b.category_id == category_id);
        if in_use {
            return Err(FinanceError::category_in_use(category_id));
        }
        self.categories.retain(|c| c.id != category_id);
        Ok(())
    }

    pub fn delete_expense(&mut self, expense_id: &str) {
        self.expenses.retain(|e| e.id != expense_id);
    }

    pub fn delete_income(&mut self, income_id: &str) {
        self.incomes.retain(|i| i.id != income_id);
    }

    pub fn delete_recurring_bill(&mut self, bill_id: &str) {
        self.recurring_bills.retain(|b| b.id != bill_id);
    }

    pub fn delete_net_worth_snapshot(&mut self, snapshot_id: &str) {
        self.net_worth.retain(|s| s.id != snapshot_id);
    }

    // ── Month-keyed helpers ─────────────────────────────────────────────

    /// Get-or-create the snapshot for `month`, keyed by month rather than
    /// by id.
    pub fn snapshot_for_month_mut(&mut self, month: YearMonth) -> &mut NetWorthSnapshot {
        if !self.net_worth.iter().any(|s| s.month == month) {
            self.net_worth.push(NetWorthSnapshot::for_month(month));
            self.net_worth.sort_by_key(|s| s.month);
        }
        self.net_worth
            .iter_mut()
            .find(|s| s.month == month)
            .expect("snapshot inserted above")
    }

    /// The income record at a `(name, month)` matrix coordinate, if any.
    pub fn income_for_cell(&self, name: &str, month: YearMonth) -> Option<&Income> {
        let name = name.trim();
        self.incomes
            .iter()
            .find(|i| i.name.trim() == name && YearMonth::from_date(i.date) == month)
    }

    /// Write an amount at a matrix coordinate: an occupied cell is updated
    /// in place, an empty one becomes a new record dated the first of the
    /// month.
    pub fn set_income_cell(&mut self, name: &str, month: YearMonth, amount: Money) {
        let income = match self.income_for_cell(name, month) {
            Some(existing) => {
                let mut updated = existing.clone();
                updated.amount = amount;
                updated
            }
            None => Income {
                id: uid("inc"),
                date: month.first_day(),
                name: name.trim().to_string(),
                amount,
                notes: None,
            },
        };
        self.upsert_income(income);
    }

    /// Clearing a matrix cell deletes the record behind it.
    pub fn clear_income_cell(&mut self, name: &str, month: YearMonth) {
        if let Some(id) = self.income_for_cell(name, month).map(|i| i.id.clone()) {
            self.delete_income(&id);
        }
    }

    /// Sum of all expense amounts dated within `month`. The document is
    /// single-currency, so amounts add up directly.
    pub fn expenses_total_for_month(&self, month: YearMonth) -> Decimal {
        self.expenses
            .iter()
            .filter(|e| YearMonth::from_date(e.date) == month)
            .map(|e| e.amount.amount)
            .sum()
    }
}

fn put_by_id<T>(items: &mut Vec<T>, item: T, id_of: impl Fn(&T) -> &str) {
    match items.iter().position(|x| id_of(x) == id_of(&item)) {
        Some(idx) => items[idx] = item,
        None => items.push(item),
    }
}
