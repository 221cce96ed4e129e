//! Counterparty classification for tracked accounts.
//!
//! Every transfer a tracked account participates in contributes its other
//! side as a counterparty. A counterparty that is itself tracked counts as
//! `internal`; anything else is `external`. Addresses are lowercased at
//! this boundary, and only here: the hierarchy module treats addresses as
//! case-sensitive. A counterparty must look like a 20-byte hex address to
//! be counted.

use std::collections::{BTreeSet, HashMap};

use flow_data::{AccountDataset, Transfer};
use serde::Serialize;

/// Whether a counterparty is itself a tracked account.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CounterpartyType {
    Internal,
    External,
}

/// One counterparty's aggregated contact counts.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CounterpartyRow {
    #[serde(rename = "Counterparty")]
    pub counterparty: String,
    #[serde(rename = "InternalCount")]
    pub internal_count: usize,
    #[serde(rename = "ExternalCount")]
    pub external_count: usize,
    #[serde(rename = "TotalTransactions")]
    pub total: usize,
    #[serde(rename = "Type")]
    pub kind: CounterpartyType,
}

/// Shape check for a counterparty address: `0x` prefix, 42 chars.
pub fn is_wellformed_address(address: &str) -> bool {
    address.starts_with("0x") && address.len() == 42
}

/// Lowercased tracked-account set, the classification boundary's view of
/// the key accounts.
pub fn tracked_set(accounts: &BTreeSet<String>) -> BTreeSet<String> {
    accounts.iter().map(|a| a.to_lowercase()).collect()
}

#[derive(Default)]
struct Tally {
    internal: usize,
    external: usize,
}

fn accumulate(
    tallies: &mut HashMap<String, Tally>,
    account: &str,
    transfers: &[Transfer],
    tracked: &BTreeSet<String>,
) {
    for transfer in transfers {
        let from = transfer.from.to_lowercase();
        let to = transfer.to.to_lowercase();

        if from != account && to != account {
            continue;
        }
        let counterparty = if from == account { to } else { from };
        if !is_wellformed_address(&counterparty) {
            continue;
        }

        let tally = tallies.entry(counterparty.clone()).or_default();
        if tracked.contains(&counterparty) {
            tally.internal += 1;
        } else {
            tally.external += 1;
        }
    }
}

fn into_rows(tallies: HashMap<String, Tally>) -> Vec<CounterpartyRow> {
    let mut rows: Vec<CounterpartyRow> = tallies
        .into_iter()
        .map(|(counterparty, tally)| CounterpartyRow {
            counterparty,
            internal_count: tally.internal,
            external_count: tally.external,
            total: tally.internal + tally.external,
            kind: if tally.internal > 0 {
                CounterpartyType::Internal
            } else {
                CounterpartyType::External
            },
        })
        .collect();

    // Busiest first; address tiebreak keeps exports reproducible.
    rows.sort_by(|a, b| {
        b.total
            .cmp(&a.total)
            .then_with(|| a.counterparty.cmp(&b.counterparty))
    });
    rows
}

/// Classify the counterparties of a single tracked account.
pub fn classify_for_account(
    account: &str,
    transfers: &[Transfer],
    tracked: &BTreeSet<String>,
) -> Vec<CounterpartyRow> {
    let account = account.to_lowercase();
    let mut tallies = HashMap::new();
    accumulate(&mut tallies, &account, transfers, tracked);
    into_rows(tallies)
}

/// Classify counterparties across every tracked account's export.
pub fn classify_dataset(dataset: &AccountDataset) -> Vec<CounterpartyRow> {
    let tracked = tracked_set(dataset.key_accounts());
    let mut tallies = HashMap::new();
    for (account, transfers) in dataset.iter() {
        accumulate(&mut tallies, &account.to_lowercase(), transfers, &tracked);
    }
    into_rows(tallies)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRACKED_A: &str = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    const TRACKED_B: &str = "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";
    const OUTSIDER: &str = "0xcccccccccccccccccccccccccccccccccccccccc";

    fn transfer(from: &str, to: &str) -> Transfer {
        Transfer {
            timestamp: 1_700_000_000,
            hash: "0x1".to_string(),
            from: from.to_string(),
            to: to.to_string(),
            value: String::new(),
            contract_address: None,
            token_symbol: "ETH".to_string(),
            decimals: 18,
            amount: Some(1.0),
        }
    }

    fn tracked() -> BTreeSet<String> {
        [TRACKED_A, TRACKED_B]
            .iter()
            .map(|a| a.to_string())
            .collect()
    }

    #[test]
    fn internal_and_external_counterparties_split() {
        let transfers = vec![
            transfer(TRACKED_A, TRACKED_B),
            transfer(TRACKED_A, OUTSIDER),
            transfer(OUTSIDER, TRACKED_A),
        ];

        let rows = classify_for_account(TRACKED_A, &transfers, &tracked());
        assert_eq!(rows.len(), 2);

        // Outsider has two contacts and sorts first.
        assert_eq!(rows[0].counterparty, OUTSIDER);
        assert_eq!(rows[0].kind, CounterpartyType::External);
        assert_eq!(rows[0].total, 2);

        assert_eq!(rows[1].counterparty, TRACKED_B);
        assert_eq!(rows[1].kind, CounterpartyType::Internal);
        assert_eq!(rows[1].internal_count, 1);
    }

    #[test]
    fn addresses_are_lowercased_at_this_boundary() {
        let upper = TRACKED_B.to_uppercase().replace("0X", "0x");
        let transfers = vec![transfer(TRACKED_A, &upper)];

        let rows = classify_for_account(TRACKED_A, &transfers, &tracked());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].counterparty, TRACKED_B);
        assert_eq!(rows[0].kind, CounterpartyType::Internal);
    }

    #[test]
    fn malformed_counterparties_are_skipped() {
        let transfers = vec![
            transfer(TRACKED_A, "not-an-address"),
            transfer(TRACKED_A, "0xshort"),
            transfer(TRACKED_A, ""),
        ];

        let rows = classify_for_account(TRACKED_A, &transfers, &tracked());
        assert!(rows.is_empty());
    }

    #[test]
    fn unrelated_transfers_are_ignored() {
        let transfers = vec![transfer(OUTSIDER, TRACKED_B)];
        let rows = classify_for_account(TRACKED_A, &transfers, &tracked());
        assert!(rows.is_empty());
    }

    #[test]
    fn tracked_counterparty_stays_internal_despite_external_contacts() {
        // B is contacted by A (internal tally); one internal contact is
        // enough to label the counterparty internal.
        let transfers = vec![transfer(TRACKED_A, TRACKED_B), transfer(TRACKED_B, TRACKED_A)];
        let rows = classify_for_account(TRACKED_A, &transfers, &tracked());

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].kind, CounterpartyType::Internal);
        assert_eq!(rows[0].internal_count, 2);
        assert_eq!(rows[0].external_count, 0);
    }
}
