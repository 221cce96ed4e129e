//! Record types for transaction CSV exports.

use serde::{Deserialize, Serialize};

/// One raw row of a per-account transfer export, as written by the spider.
///
/// Headers follow the exporter's camelCase convention. Numeric-looking
/// fields are kept as text: `value` is a base-unit integer that can exceed
/// u128, and `decimals` (present only in annotated datasets) may carry a
/// Solidity type suffix such as `"18 uint256"`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransferRow {
    /// Transfer timestamp in unix seconds.
    #[serde(rename = "timeStamp")]
    pub time_stamp: u64,
    /// Transaction hash (hex text).
    #[serde(default)]
    pub hash: String,
    /// Sender address (may be empty).
    #[serde(default)]
    pub from: String,
    /// Receiver address (may be empty).
    #[serde(default)]
    pub to: String,
    /// Transferred value in token base units (decimal integer text).
    #[serde(default)]
    pub value: String,
    /// Token contract address; empty for native-coin transfers.
    #[serde(rename = "contractAddress", default)]
    pub contract_address: String,
    /// Token ticker symbol; empty for native-coin transfers.
    #[serde(rename = "tokenSymbol", default)]
    pub token_symbol: String,
    /// Raw decimals text from an annotated dataset, if present.
    #[serde(default)]
    pub decimals: Option<String>,
}

/// A cleaned transfer record ready for analysis.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Transfer {
    /// Transfer timestamp in unix seconds.
    pub timestamp: u64,
    /// Transaction hash.
    pub hash: String,
    /// Sender address.
    pub from: String,
    /// Receiver address.
    pub to: String,
    /// Raw value in token base units (decimal integer text).
    pub value: String,
    /// Token contract address, `None` for native-coin transfers.
    pub contract_address: Option<String>,
    /// Token ticker symbol.
    pub token_symbol: String,
    /// Token decimals resolved through the registry.
    pub decimals: u32,
    /// Normalized amount: value / 10^decimals. `None` when decimals is 0
    /// (unknown token), in which case the row is dropped during cleaning.
    pub amount: Option<f64>,
}
