//! Loading a directory of per-account transfer exports.
//!
//! Each `<address>.csv` file holds the transfer history of one tracked
//! account; the set of file stems doubles as the key-account set used by
//! the hierarchy and counterparty analyses. Files are read tolerantly:
//! invalid UTF-8 is replaced lossily, malformed rows are skipped with a
//! debug log, and a file that cannot be parsed at all is skipped with a
//! warning rather than failing the whole run.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::io::Cursor;
use std::path::{Path, PathBuf};

use eyre::{eyre, Context, Result};
use tracing::{debug, warn};

use crate::tokens::{normalized_amount, parse_decimals, TokenRegistry};
use crate::types::{Transfer, TransferRow};

/// All tracked accounts' cleaned transfers, keyed by account address.
#[derive(Clone, Debug, Default)]
pub struct AccountDataset {
    accounts: BTreeMap<String, Vec<Transfer>>,
    key_accounts: BTreeSet<String>,
}

impl AccountDataset {
    /// Load every `*.csv` under `dir`. The optional registry resolves
    /// decimals for datasets that were not annotated on disk.
    pub fn load(dir: &Path, registry: Option<&TokenRegistry>) -> Result<Self> {
        let mut dataset = Self::default();

        for path in list_csv_files(dir)? {
            let account = match account_of(&path) {
                Some(account) => account,
                None => continue,
            };
            dataset.key_accounts.insert(account.clone());

            match read_rows(&path) {
                Ok(rows) => {
                    let transfers = clean_rows(&rows, registry);
                    debug!(
                        file = %path.display(),
                        raw = rows.len(),
                        kept = transfers.len(),
                        "loaded account export"
                    );
                    dataset.accounts.insert(account, transfers);
                }
                Err(error) => {
                    warn!(file = %path.display(), %error, "skipping unreadable export");
                    dataset.accounts.insert(account, Vec::new());
                }
            }
        }

        if dataset.key_accounts.is_empty() {
            return Err(eyre!("no CSV exports found in {}", dir.display()));
        }
        Ok(dataset)
    }

    /// Tracked account addresses (one per input file).
    pub fn key_accounts(&self) -> &BTreeSet<String> {
        &self.key_accounts
    }

    /// Cleaned transfers for one account, empty when the file was unreadable.
    pub fn transfers_for(&self, account: &str) -> &[Transfer] {
        self.accounts
            .get(account)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Iterate (account, transfers) in address order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &[Transfer])> {
        self.accounts
            .iter()
            .map(|(account, transfers)| (account, transfers.as_slice()))
    }

    /// Every cleaned transfer across all accounts, in account order.
    pub fn all_transfers(&self) -> impl Iterator<Item = &Transfer> {
        self.accounts.values().flatten()
    }

    /// (sender, receiver) pairs for graph construction. Empty CSV fields
    /// become `None` so the graph builder can drop incomplete pairs.
    pub fn edge_pairs(&self) -> Vec<(Option<String>, Option<String>)> {
        self.all_transfers()
            .map(|t| (non_empty(&t.from), non_empty(&t.to)))
            .collect()
    }

    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Sorted `*.csv` paths under `dir`.
pub fn list_csv_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .wrap_err_with(|| format!("failed to read data directory {}", dir.display()))?;

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().map(|ext| ext == "csv").unwrap_or(false))
        .collect();
    paths.sort();
    Ok(paths)
}

/// The account address an export file tracks: its file stem.
pub fn account_of(path: &Path) -> Option<String> {
    path.file_stem().map(|stem| stem.to_string_lossy().to_string())
}

/// Read raw rows from one export. Invalid UTF-8 is replaced lossily;
/// rows that fail to deserialize are skipped with a debug log.
pub fn read_rows(path: &Path) -> Result<Vec<TransferRow>> {
    let bytes = std::fs::read(path)
        .wrap_err_with(|| format!("failed to read {}", path.display()))?;
    let text = String::from_utf8_lossy(&bytes).into_owned();

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(Cursor::new(text));

    let mut rows = Vec::new();
    for (line_number, row) in reader.deserialize::<TransferRow>().enumerate() {
        match row {
            Ok(row) => rows.push(row),
            Err(error) => {
                debug!(file = %path.display(), line_number, %error, "skipping malformed row");
            }
        }
    }
    Ok(rows)
}

/// Clean raw rows into [`Transfer`]s.
///
/// Decimals come from the row's own `decimals` column when present
/// (annotated dataset), otherwise from the registry; rows whose decimals
/// resolve to 0 are dropped, as are exact duplicates.
pub fn clean_rows(rows: &[TransferRow], registry: Option<&TokenRegistry>) -> Vec<Transfer> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut transfers = Vec::new();

    for row in rows {
        let decimals = resolve_decimals(row, registry);
        if decimals == 0 {
            continue;
        }
        let amount = normalized_amount(&row.value, decimals);

        let dedup_key = format!(
            "{}|{}|{}|{}|{}|{}",
            row.time_stamp, row.hash, row.from, row.to, row.value, row.contract_address
        );
        if !seen.insert(dedup_key) {
            continue;
        }

        transfers.push(Transfer {
            timestamp: row.time_stamp,
            hash: row.hash.clone(),
            from: row.from.trim().to_string(),
            to: row.to.trim().to_string(),
            value: row.value.clone(),
            contract_address: non_empty(&row.contract_address),
            token_symbol: row.token_symbol.clone(),
            decimals,
            amount,
        });
    }

    transfers
}

fn resolve_decimals(row: &TransferRow, registry: Option<&TokenRegistry>) -> u32 {
    if let Some(raw) = row.decimals.as_deref() {
        let parsed = parse_decimals(raw);
        if parsed > 0 {
            return parsed;
        }
    }
    match registry {
        Some(registry) => registry.decimals_for(&row.contract_address),
        // Without a registry only native transfers are normalizable.
        None if row.contract_address.trim().is_empty() => crate::tokens::NATIVE_DECIMALS,
        None => 0,
    }
}

/// Rewrite one export with its `decimals` column filled from the registry,
/// preserving every other field. Used by the `annotate` pipeline stage.
pub fn annotate_file(src: &Path, dst: &Path, registry: &TokenRegistry) -> Result<usize> {
    let rows = read_rows(src)?;
    let mut writer = csv::Writer::from_path(dst)
        .wrap_err_with(|| format!("failed to create {}", dst.display()))?;

    let mut written = 0usize;
    for row in rows {
        let decimals = registry.decimals_for(&row.contract_address);
        let mut annotated = row;
        annotated.decimals = Some(decimals.to_string());
        writer.serialize(annotated)?;
        written += 1;
    }
    writer.flush()?;
    Ok(written)
}
