//! Block scanning, matching and recording.

pub mod engine;
pub mod recorder;
pub mod scanner;

use alloy::primitives::U256;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::adapter::Credit;
use crate::chain::ChainSlug;
use crate::store::ContributionSource;

pub use engine::{ChainRuntime, Engine};
pub use recorder::{Candidate, RecordOutcome, Recorder};
pub use scanner::{plan_range, IngestionReport, ScanOptions, ScanRange, Scanner, ScannerSettings};

/// Credits that pay a project wallet with a non-zero amount.
pub fn matching_credits(wallets: &HashMap<String, String>, credits: Vec<Credit>) -> Vec<Credit> {
    credits
        .into_iter()
        .filter(|c| !c.amount.is_zero() && wallets.contains_key(&c.to))
        .collect()
}

/// Fold matched credits into one candidate per `(tx_hash, wallet_id)`,
/// summing outputs that pay the same wallet. Order of first appearance is kept.
pub fn group_candidates(
    chain: ChainSlug,
    wallets: &HashMap<String, String>,
    credits: &[Credit],
    block_height: u64,
    block_time: DateTime<Utc>,
    source: ContributionSource,
) -> Vec<Candidate> {
    let mut index: HashMap<(String, String), usize> = HashMap::new();
    let mut candidates: Vec<Candidate> = Vec::new();

    for credit in credits {
        let Some(wallet_id) = wallets.get(&credit.to) else {
            continue;
        };
        let key = (credit.tx_hash.clone(), wallet_id.clone());
        match index.get(&key) {
            Some(&i) => {
                let total = candidates[i].amount.saturating_add(credit.amount);
                candidates[i].amount = total;
            }
            None => {
                index.insert(key, candidates.len());
                candidates.push(Candidate {
                    chain,
                    wallet_id: wallet_id.clone(),
                    tx_hash: credit.tx_hash.clone(),
                    amount: credit.amount,
                    block_height,
                    block_time,
                    note: None,
                    source,
                });
            }
        }
    }

    candidates
}

/// Sum of a candidate list, for logging.
pub(crate) fn total_amount(candidates: &[Candidate]) -> U256 {
    candidates
        .iter()
        .fold(U256::ZERO, |acc, c| acc.saturating_add(c.amount))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credit(tx: &str, to: &str, amount: u64) -> Credit {
        Credit {
            tx_hash: tx.to_string(),
            to: to.to_string(),
            amount: U256::from(amount),
        }
    }

    fn wallets() -> HashMap<String, String> {
        HashMap::from([
            ("bc1qa".to_string(), "W1".to_string()),
            ("bc1qb".to_string(), "W2".to_string()),
        ])
    }

    #[test]
    fn test_matching_drops_foreign_and_zero() {
        let matched = matching_credits(
            &wallets(),
            vec![
                credit("t1", "bc1qa", 5),
                credit("t1", "bc1qother", 7),
                credit("t2", "bc1qb", 0),
            ],
        );
        assert_eq!(matched, vec![credit("t1", "bc1qa", 5)]);
    }

    #[test]
    fn test_grouping_sums_per_wallet_and_splits_across_wallets() {
        let credits = vec![
            credit("t1", "bc1qa", 100),
            credit("t1", "bc1qb", 7),
            credit("t1", "bc1qa", 50),
            credit("t2", "bc1qa", 1),
        ];
        let candidates = group_candidates(
            ChainSlug::Btc,
            &wallets(),
            &credits,
            10,
            Utc::now(),
            ContributionSource::Scan,
        );

        let summary: Vec<(&str, &str, U256)> = candidates
            .iter()
            .map(|c| (c.tx_hash.as_str(), c.wallet_id.as_str(), c.amount))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("t1", "W1", U256::from(150u64)),
                ("t1", "W2", U256::from(7u64)),
                ("t2", "W1", U256::from(1u64)),
            ]
        );
        assert_eq!(total_amount(&candidates), U256::from(158u64));
    }
}
