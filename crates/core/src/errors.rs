//! Error types for the core finance domain.

use thiserror::Error;

/// Result type alias for finance store operations.
pub type Result<T> = std::result::Result<T, FinanceError>;

/// Errors surfaced by the finance document and stores.
///
/// Persistence failures are absorbed by the storage layer and never reach
/// this enum; the referential-integrity violation on category deletion is
/// the one failure callers are expected to display.
#[derive(Debug, Error)]
pub enum FinanceError {
    /// Category is still referenced by an expense or a recurring bill.
    #[error("category {id} is in use; reassign items before deleting")]
    CategoryInUse { id: String },
}

impl FinanceError {
    /// Create a category-in-use error
    pub fn category_in_use(id: impl Into<String>) -> Self {
        Self::CategoryInUse { id: id.into() }
    }
}
