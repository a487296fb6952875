//! Load-boundary normalization of persisted documents.
//!
//! Two legacy shapes exist in the wild: net-worth snapshots carrying a flat
//! `lines` list (V1) instead of `groups`, and recurring bills carrying a
//! single flat `amount` instead of `amountHistory`. Both are upgraded here,
//! once, when a raw blob is parsed; the legacy shapes never travel past this
//! module. A document whose `version` is unrecognized is discarded entirely
//! (the caller substitutes the default document) rather than partially
//! trusted.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use super::model::{
    AmountChange, Expense, FinanceCategory, FinanceData, Income, Money, NetWorthGroup,
    NetWorthLine, NetWorthSnapshot, RecurringBill, YearMonth, DEFAULT_CURRENCY, NET_WORTH_GROUPS,
    SCHEMA_VERSION,
};

/// Net-worth snapshot as found on disk: current (grouped) or legacy flat.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RawNetWorthSnapshot {
    Current(NetWorthSnapshot),
    #[serde(rename_all = "camelCase")]
    LegacyFlat {
        id: String,
        month: YearMonth,
        lines: Vec<NetWorthLine>,
        #[serde(default)]
        notes: Option<String>,
    },
}

/// Recurring bill as found on disk; legacy documents may lack
/// `amountHistory`/`startMonth` and carry a flat `amount` instead.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRecurringBill {
    id: String,
    name: String,
    #[serde(default)]
    category_id: String,
    #[serde(default = "default_due_day")]
    due_day: u8,
    #[serde(default, deserialize_with = "lenient_year_month")]
    start_month: Option<YearMonth>,
    #[serde(default)]
    amount: Option<Money>,
    #[serde(default)]
    amount_history: Option<Vec<AmountChange>>,
    #[serde(default = "default_active")]
    active: bool,
    #[serde(default)]
    notes: Option<String>,
}

/// A malformed month in a legacy bill must not poison the whole document;
/// it reads as absent and `normalize_bill` substitutes the current month.
fn lenient_year_month<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<YearMonth>, D::Error> {
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw
        .as_ref()
        .and_then(Value::as_str)
        .and_then(|s| s.parse().ok()))
}

fn default_due_day() -> u8 {
    1
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFinanceData {
    version: u32,
    #[serde(default = "default_currency")]
    currency: String,
    #[serde(default)]
    categories: Vec<FinanceCategory>,
    #[serde(default)]
    expenses: Vec<Expense>,
    #[serde(default)]
    incomes: Vec<Income>,
    #[serde(default)]
    recurring_bills: Vec<RawRecurringBill>,
    #[serde(default)]
    net_worth: Vec<RawNetWorthSnapshot>,
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

/// Upgrade a V1 flat snapshot by wrapping its lines into the `liquid` group;
/// current snapshots pass through unchanged.
pub fn normalize_snapshot(raw: RawNetWorthSnapshot) -> NetWorthSnapshot {
    match raw {
        RawNetWorthSnapshot::Current(snapshot) => snapshot,
        RawNetWorthSnapshot::LegacyFlat {
            id,
            month,
            lines,
            notes,
        } => {
            let mut groups: Vec<NetWorthGroup> = NET_WORTH_GROUPS
                .iter()
                .map(|(group_id, name)| NetWorthGroup::empty(group_id, name))
                .collect();
            groups[0].lines = lines;
            NetWorthSnapshot {
                id,
                month,
                groups,
                notes,
            }
        }
    }
}

/// Upgrade a legacy flat-amount bill into a one-entry history seeded at its
/// start month. A bill without a start month falls back to the current
/// month, matching the shape the UI would have produced at upgrade time.
pub fn normalize_bill(raw: RawRecurringBill) -> RecurringBill {
    let start_month = raw.start_month.unwrap_or_else(YearMonth::current);
    let amount_history = match raw.amount_history {
        Some(history) if !history.is_empty() => history,
        _ => vec![AmountChange {
            effective_month: start_month,
            amount: raw.amount.unwrap_or_else(|| Money::zero(DEFAULT_CURRENCY)),
        }],
    };

    RecurringBill {
        id: raw.id,
        name: raw.name,
        category_id: raw.category_id,
        due_day: raw.due_day,
        start_month,
        amount_history,
        active: raw.active,
        notes: raw.notes,
    }
}

fn normalize(raw: RawFinanceData) -> FinanceData {
    FinanceData {
        version: SCHEMA_VERSION,
        currency: raw.currency,
        categories: raw.categories,
        expenses: raw.expenses,
        incomes: raw.incomes,
        recurring_bills: raw.recurring_bills.into_iter().map(normalize_bill).collect(),
        net_worth: raw.net_worth.into_iter().map(normalize_snapshot).collect(),
    }
}

/// Parse and normalize a persisted JSON value. `None` when the value is not
/// a recognizable version-1 document; the caller substitutes the default.
pub fn parse_document_value(value: Value) -> Option<FinanceData> {
    if value.get("version").and_then(Value::as_u64) != Some(u64::from(SCHEMA_VERSION)) {
        return None;
    }
    serde_json::from_value::<RawFinanceData>(value)
        .ok()
        .map(normalize)
}

/// Parse and normalize a persisted JSON blob.
pub fn parse_document(raw: &str) -> Option<FinanceData> {
    let value: Value = serde_json::from_str(raw).ok()?;
    parse_document_value(value)
}
