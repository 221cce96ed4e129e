//! Per-address statistics over cleaned transfers.
//!
//! For each tracked account: lifecycle span, transfer frequency, in/out
//! degree, and normalized-amount balance/volume aggregates. An account with
//! no usable transfers yields a zeroed row rather than an error.

use chrono::{DateTime, Duration};
use flow_data::{AccountDataset, Transfer};
use serde::Serialize;

/// Statistics row for one tracked account.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AddressStats {
    /// Account address (the export's file stem).
    pub address: String,
    /// Unix seconds of the first observed transfer.
    pub first_seen: Option<u64>,
    /// Unix seconds of the last observed transfer.
    pub last_seen: Option<u64>,
    /// Whole days between first and last transfer.
    pub lifecycle_days: i64,
    /// Total transfers in the export.
    pub total_txns: usize,
    /// Transfers per lifecycle day; 0 when the lifecycle is under a day.
    pub avg_daily_txns: f64,
    /// Transfers where this account is the sender.
    pub out_degree: usize,
    /// Transfers where this account is the receiver.
    pub in_degree: usize,
    /// in_degree − out_degree.
    pub degree_diff: i64,
    /// Sum of normalized amounts received.
    pub total_income: f64,
    /// Sum of normalized amounts sent.
    pub total_expense: f64,
    /// total_income − total_expense.
    pub final_balance: f64,
    /// total_income + total_expense.
    pub total_volume: f64,
    /// total_volume / total_txns; 0 when there are no transfers.
    pub avg_txn_amount: f64,
}

/// Compute statistics for one account over its cleaned transfers.
pub fn compute_address_stats(address: &str, transfers: &[Transfer]) -> AddressStats {
    if transfers.is_empty() {
        return AddressStats {
            address: address.to_string(),
            first_seen: None,
            last_seen: None,
            lifecycle_days: 0,
            total_txns: 0,
            avg_daily_txns: 0.0,
            out_degree: 0,
            in_degree: 0,
            degree_diff: 0,
            total_income: 0.0,
            total_expense: 0.0,
            final_balance: 0.0,
            total_volume: 0.0,
            avg_txn_amount: 0.0,
        };
    }

    let first_seen = transfers.iter().map(|t| t.timestamp).min();
    let last_seen = transfers.iter().map(|t| t.timestamp).max();
    let lifecycle_days = match (first_seen, last_seen) {
        (Some(first), Some(last)) => Duration::seconds((last - first) as i64).num_days(),
        _ => 0,
    };

    let total_txns = transfers.len();
    let avg_daily_txns = if lifecycle_days > 0 {
        total_txns as f64 / lifecycle_days as f64
    } else {
        0.0
    };

    let out_degree = transfers.iter().filter(|t| t.from == address).count();
    let in_degree = transfers.iter().filter(|t| t.to == address).count();

    let total_income: f64 = transfers
        .iter()
        .filter(|t| t.to == address)
        .filter_map(|t| t.amount)
        .sum();
    let total_expense: f64 = transfers
        .iter()
        .filter(|t| t.from == address)
        .filter_map(|t| t.amount)
        .sum();

    let total_volume = total_income + total_expense;
    let avg_txn_amount = if total_txns > 0 {
        total_volume / total_txns as f64
    } else {
        0.0
    };

    AddressStats {
        address: address.to_string(),
        first_seen,
        last_seen,
        lifecycle_days,
        total_txns,
        avg_daily_txns,
        out_degree,
        in_degree,
        degree_diff: in_degree as i64 - out_degree as i64,
        total_income,
        total_expense,
        final_balance: total_income - total_expense,
        total_volume,
        avg_txn_amount,
    }
}

/// Statistics for every tracked account, in address order.
pub fn compute_dataset_stats(dataset: &AccountDataset) -> Vec<AddressStats> {
    dataset
        .iter()
        .map(|(account, transfers)| compute_address_stats(account, transfers))
        .collect()
}

/// Format a unix-seconds timestamp for table display.
pub fn format_timestamp(timestamp: Option<u64>) -> String {
    match timestamp.and_then(|ts| DateTime::from_timestamp(ts as i64, 0)) {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => "N/A".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transfer(from: &str, to: &str, timestamp: u64, amount: f64) -> Transfer {
        Transfer {
            timestamp,
            hash: format!("0x{timestamp:x}"),
            from: from.to_string(),
            to: to.to_string(),
            value: String::new(),
            contract_address: None,
            token_symbol: "ETH".to_string(),
            decimals: 18,
            amount: Some(amount),
        }
    }

    const DAY: u64 = 86_400;

    #[test]
    fn lifecycle_degrees_and_balance() {
        let account = "0xaaa";
        let transfers = vec![
            transfer("0xbbb", account, 1_700_000_000, 5.0),
            transfer(account, "0xccc", 1_700_000_000 + 2 * DAY, 2.0),
            transfer("0xddd", account, 1_700_000_000 + 4 * DAY, 1.0),
        ];

        let stats = compute_address_stats(account, &transfers);
        assert_eq!(stats.first_seen, Some(1_700_000_000));
        assert_eq!(stats.last_seen, Some(1_700_000_000 + 4 * DAY));
        assert_eq!(stats.lifecycle_days, 4);
        assert_eq!(stats.total_txns, 3);
        assert!((stats.avg_daily_txns - 0.75).abs() < 1e-12);
        assert_eq!(stats.in_degree, 2);
        assert_eq!(stats.out_degree, 1);
        assert_eq!(stats.degree_diff, 1);
        assert!((stats.total_income - 6.0).abs() < 1e-12);
        assert!((stats.total_expense - 2.0).abs() < 1e-12);
        assert!((stats.final_balance - 4.0).abs() < 1e-12);
        assert!((stats.total_volume - 8.0).abs() < 1e-12);
        assert!((stats.avg_txn_amount - 8.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn same_day_lifecycle_has_zero_frequency() {
        let account = "0xaaa";
        let transfers = vec![
            transfer(account, "0xbbb", 1_700_000_000, 1.0),
            transfer(account, "0xbbb", 1_700_000_100, 1.0),
        ];

        let stats = compute_address_stats(account, &transfers);
        assert_eq!(stats.lifecycle_days, 0);
        assert_eq!(stats.avg_daily_txns, 0.0);
    }

    #[test]
    fn empty_account_is_zeroed_not_error() {
        let stats = compute_address_stats("0xaaa", &[]);
        assert_eq!(stats.total_txns, 0);
        assert_eq!(stats.first_seen, None);
        assert_eq!(stats.final_balance, 0.0);
        assert_eq!(stats.avg_txn_amount, 0.0);
    }

    #[test]
    fn formats_timestamps_for_display() {
        assert_eq!(format_timestamp(None), "N/A");
        assert_eq!(
            format_timestamp(Some(1_700_000_000)),
            "2023-11-14 22:13:20"
        );
    }
}
