//! flow-data crate
//!
//! CSV ingestion and record types for per-account transaction exports:
//! dataset loading and cleaning, token/decimals registry, and CSV export
//! of derived tables.

pub mod dataset;
pub mod export;
pub mod tokens;
pub mod types;

pub use dataset::AccountDataset;
pub use tokens::{TokenInfo, TokenRegistry};
pub use types::{Transfer, TransferRow};
