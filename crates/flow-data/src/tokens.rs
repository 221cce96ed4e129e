//! Token contract registry: symbol lookup and base-unit decimals.
//!
//! The registry is built in two passes over raw exports: first the
//! distinct (contract, symbol) pairs are extracted, then the decimals
//! column, which arrives as text like `"18 uint256"`, is parsed down to an
//! integer. The registry round-trips
//! through a flat CSV so later stages can reuse it without rescanning.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::types::TransferRow;

/// Decimals assumed for rows without a contract address. Those rows are
/// direct native-coin transfers, which carry 18 decimals.
pub const NATIVE_DECIMALS: u32 = 18;

/// Symbol and decimals for one token contract.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    /// Token ticker symbol.
    pub symbol: String,
    /// Base-unit decimals.
    pub decimals: u32,
}

/// One registry row as persisted to CSV.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct RegistryRow {
    #[serde(rename = "contractAddress")]
    contract_address: String,
    #[serde(rename = "tokenSymbol")]
    token_symbol: String,
    decimals: u32,
}

/// Contract address → token info lookup table.
#[derive(Clone, Debug, Default)]
pub struct TokenRegistry {
    entries: HashMap<String, TokenInfo>,
}

impl TokenRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a contract. Later inserts for the same contract win.
    pub fn insert(&mut self, contract: impl Into<String>, info: TokenInfo) {
        self.entries.insert(contract.into(), info);
    }

    pub fn get(&self, contract: &str) -> Option<&TokenInfo> {
        self.entries.get(contract)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Decimals for a contract address as used during annotation:
    /// an empty contract is a native transfer (18), a registered contract
    /// uses its registry value, and an unknown contract yields 0 so the
    /// cleaning pass drops its rows.
    pub fn decimals_for(&self, contract: &str) -> u32 {
        if contract.trim().is_empty() {
            return NATIVE_DECIMALS;
        }
        self.entries
            .get(contract)
            .map(|info| info.decimals)
            .unwrap_or(0)
    }

    /// Write the registry as `contractAddress,tokenSymbol,decimals`,
    /// sorted by contract for reproducible output.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)
            .wrap_err_with(|| format!("failed to create registry {}", path.display()))?;

        let mut contracts: Vec<&String> = self.entries.keys().collect();
        contracts.sort();

        for contract in contracts {
            let info = &self.entries[contract];
            writer.serialize(RegistryRow {
                contract_address: contract.clone(),
                token_symbol: info.symbol.clone(),
                decimals: info.decimals,
            })?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Load a registry previously written by [`TokenRegistry::write_csv`].
    pub fn read_csv(path: &Path) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path)
            .wrap_err_with(|| format!("failed to open registry {}", path.display()))?;

        let mut registry = Self::new();
        for row in reader.deserialize::<RegistryRow>() {
            let row = row.wrap_err("malformed registry row")?;
            registry.insert(
                row.contract_address,
                TokenInfo {
                    symbol: row.token_symbol,
                    decimals: row.decimals,
                },
            );
        }
        Ok(registry)
    }
}

/// Extract the distinct (contract, symbol) pairs from raw export rows,
/// in first-appearance order. Rows missing either field are skipped.
pub fn extract_token_mappings(rows: &[TransferRow]) -> Vec<(String, String)> {
    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut mappings = Vec::new();

    for row in rows {
        let contract = row.contract_address.trim();
        let symbol = row.token_symbol.trim();
        if contract.is_empty() || symbol.is_empty() {
            continue;
        }
        let pair = (contract.to_string(), symbol.to_string());
        if seen.insert(pair.clone()) {
            mappings.push(pair);
        }
    }

    mappings
}

/// Parse a decimals cell into an integer.
///
/// The source column holds values like `"18 uint256"`; everything before
/// the first `uint` is taken and parsed. Empty, missing, or unparseable
/// input yields 0, which downstream cleaning treats as "unknown token".
pub fn parse_decimals(raw: &str) -> u32 {
    let head = raw.split("uint").next().unwrap_or("").trim();
    head.parse::<u32>().unwrap_or(0)
}

/// Normalize a base-unit value text into a token amount.
///
/// Returns `None` when decimals is 0 (unknown token) or the value does not
/// parse as a number; such rows are dropped during cleaning.
pub fn normalized_amount(value: &str, decimals: u32) -> Option<f64> {
    if decimals == 0 {
        return None;
    }
    let raw: f64 = value.trim().parse().ok()?;
    Some(raw / 10f64.powi(decimals as i32))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(contract: &str, symbol: &str) -> TransferRow {
        TransferRow {
            time_stamp: 1_700_000_000,
            hash: "0xaa".to_string(),
            from: "0x01".to_string(),
            to: "0x02".to_string(),
            value: "1000".to_string(),
            contract_address: contract.to_string(),
            token_symbol: symbol.to_string(),
            decimals: None,
        }
    }

    #[test]
    fn parse_decimals_with_uint_suffix() {
        assert_eq!(parse_decimals("18 uint256"), 18);
        assert_eq!(parse_decimals("6uint8"), 6);
        assert_eq!(parse_decimals("18"), 18);
    }

    #[test]
    fn parse_decimals_fallbacks() {
        assert_eq!(parse_decimals(""), 0);
        assert_eq!(parse_decimals("   "), 0);
        assert_eq!(parse_decimals("garbage"), 0);
        assert_eq!(parse_decimals("uint256"), 0);
    }

    #[test]
    fn mappings_dedup_preserve_first_appearance() {
        let rows = vec![
            row("0xc1", "USDT"),
            row("0xc2", "DAI"),
            row("0xc1", "USDT"),
            row("", "GHOST"),
            row("0xc3", ""),
        ];

        let mappings = extract_token_mappings(&rows);
        assert_eq!(
            mappings,
            vec![
                ("0xc1".to_string(), "USDT".to_string()),
                ("0xc2".to_string(), "DAI".to_string()),
            ]
        );
    }

    #[test]
    fn decimals_for_native_unknown_and_registered() {
        let mut registry = TokenRegistry::new();
        registry.insert(
            "0xc1",
            TokenInfo {
                symbol: "USDT".to_string(),
                decimals: 6,
            },
        );

        assert_eq!(registry.decimals_for(""), NATIVE_DECIMALS);
        assert_eq!(registry.decimals_for("0xc1"), 6);
        assert_eq!(registry.decimals_for("0xdead"), 0);
    }

    #[test]
    fn normalized_amount_cases() {
        assert_eq!(normalized_amount("1000000", 6), Some(1.0));
        assert_eq!(normalized_amount("1500000000000000000", 18), Some(1.5));
        assert_eq!(normalized_amount("1000", 0), None);
        assert_eq!(normalized_amount("not-a-number", 6), None);
    }

    #[test]
    fn registry_csv_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("registry.csv");

        let mut registry = TokenRegistry::new();
        registry.insert(
            "0xc1",
            TokenInfo {
                symbol: "USDT".to_string(),
                decimals: 6,
            },
        );
        registry.insert(
            "0xc2",
            TokenInfo {
                symbol: "DAI".to_string(),
                decimals: 18,
            },
        );

        registry.write_csv(&path).expect("write");
        let loaded = TokenRegistry::read_csv(&path).expect("read");

        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.decimals_for("0xc1"), 6);
        assert_eq!(loaded.get("0xc2").map(|i| i.symbol.as_str()), Some("DAI"));
    }
}
