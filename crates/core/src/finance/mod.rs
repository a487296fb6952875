//! Finance document model, schema normalization and stores.

mod migration;
mod model;
mod store;

pub use migration::{parse_document, parse_document_value};
pub use model::*;
pub use store::{FinanceStore, LocalFinanceStore, FINANCE_DATA_KEY};
