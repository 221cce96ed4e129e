//! flow-analysis crate
//!
//! In-memory analyses over cleaned transfer data: sender→receiver hierarchy
//! decomposition, per-address statistics, global network metrics, and
//! counterparty classification.

pub mod counterparty;
pub mod hierarchy;
pub mod network;
pub mod stats;
