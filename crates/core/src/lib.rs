//! Core domain for the haushalt personal-finance tracker: the versioned
//! finance document, schema normalization, the slot-based persistence
//! adapter and the local store built on top of it.

pub mod errors;
pub mod finance;
pub mod ids;
pub mod storage;

pub use errors::{FinanceError, Result};
