//! Shared test helpers and utilities.
//!
//! Provides fixture addresses and builders for on-disk per-account CSV
//! exports in the upstream column layout.

#![allow(dead_code)]

use std::io::Write;
use std::path::{Path, PathBuf};

use flow_data::tokens::{TokenInfo, TokenRegistry};

/// Tracked accounts (each gets its own export file in fixtures).
pub const ALICE: &str = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
pub const BOB: &str = "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";
pub const CAROL: &str = "0xcccccccccccccccccccccccccccccccccccccccc";
pub const ROOT: &str = "0x1111111111111111111111111111111111111111";

/// An address that never has its own export file.
pub const OUTSIDER: &str = "0xdddddddddddddddddddddddddddddddddddddddd";

/// A token contract registered in [`sample_registry`] with 6 decimals.
pub const USDT_CONTRACT: &str = "0xc1c1c1c1c1c1c1c1c1c1c1c1c1c1c1c1c1c1c1c1";

/// One raw export line in the on-disk column order
/// `timeStamp,hash,from,to,value,contractAddress,tokenSymbol`.
pub fn export_line(
    timestamp: u64,
    hash: &str,
    from: &str,
    to: &str,
    value: &str,
    contract: &str,
    symbol: &str,
) -> String {
    format!("{timestamp},{hash},{from},{to},{value},{contract},{symbol}")
}

/// A native-coin transfer line (empty contract, 18 decimals implied).
pub fn native_line(timestamp: u64, hash: &str, from: &str, to: &str, value: &str) -> String {
    export_line(timestamp, hash, from, to, value, "", "")
}

/// Write one account's export file (`<account>.csv`) under `dir`.
pub fn write_export(dir: &Path, account: &str, lines: &[String]) -> PathBuf {
    let path = dir.join(format!("{account}.csv"));
    let mut file = std::fs::File::create(&path).expect("create export file");
    writeln!(file, "timeStamp,hash,from,to,value,contractAddress,tokenSymbol")
        .expect("write header");
    for line in lines {
        writeln!(file, "{line}").expect("write row");
    }
    path
}

/// A registry knowing one token: [`USDT_CONTRACT`] with 6 decimals.
pub fn sample_registry() -> TokenRegistry {
    let mut registry = TokenRegistry::new();
    registry.insert(
        USDT_CONTRACT,
        TokenInfo {
            symbol: "USDT".to_string(),
            decimals: 6,
        },
    );
    registry
}
