use alloy::primitives::U256;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::amount::to_decimal;
use crate::chain::{ChainProfile, ChainSlug};
use crate::error::StoreError;
use crate::pricing::PricingPort;
use crate::store::{ContributionSource, InsertOutcome, NewContribution, Store};

/// A matched transfer waiting to be recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub chain: ChainSlug,
    pub wallet_id: String,
    pub tx_hash: String,
    pub amount: U256,
    pub block_height: u64,
    pub block_time: DateTime<Utc>,
    pub note: Option<String>,
    pub source: ContributionSource,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecordOutcome {
    Inserted { id: i64 },
    AlreadyRecorded,
    Rejected { reason: String },
}

/// Single write path for contributions. Check-then-insert, with a
/// uniqueness conflict on insert folded into `AlreadyRecorded`.
pub struct Recorder {
    store: Arc<dyn Store>,
    pricing: Arc<dyn PricingPort>,
}

impl Recorder {
    pub fn new(store: Arc<dyn Store>, pricing: Arc<dyn PricingPort>) -> Self {
        Self { store, pricing }
    }

    pub async fn record(&self, candidate: &Candidate) -> Result<RecordOutcome, StoreError> {
        let mut outcomes = self.record_all(std::slice::from_ref(candidate)).await?;
        Ok(outcomes.pop().unwrap_or(RecordOutcome::AlreadyRecorded))
    }

    /// Record candidates that belong together (one transaction's wallets).
    /// New rows are written in one atomic batch, so a store failure leaves
    /// none of them behind. Outcomes follow the input order.
    pub async fn record_all(
        &self,
        candidates: &[Candidate],
    ) -> Result<Vec<RecordOutcome>, StoreError> {
        let mut outcomes = Vec::with_capacity(candidates.len());
        let mut pending: Vec<(usize, NewContribution)> = Vec::new();

        for (i, candidate) in candidates.iter().enumerate() {
            if let Some(reason) = rejection(candidate) {
                tracing::warn!(
                    chain = %candidate.chain,
                    tx_hash = %candidate.tx_hash,
                    reason,
                    "Rejected contribution candidate"
                );
                outcomes.push(RecordOutcome::Rejected {
                    reason: reason.to_string(),
                });
                continue;
            }
            if self
                .store
                .contribution_exists(candidate.chain, &candidate.tx_hash, Some(&candidate.wallet_id))
                .await?
            {
                outcomes.push(RecordOutcome::AlreadyRecorded);
                continue;
            }

            let profile = ChainProfile::builtin(candidate.chain);
            let amount = match to_decimal(candidate.amount, profile.decimals) {
                Ok(amount) => amount,
                Err(e) => {
                    tracing::warn!(
                        chain = %candidate.chain,
                        tx_hash = %candidate.tx_hash,
                        error = %e,
                        "Rejected contribution candidate"
                    );
                    outcomes.push(RecordOutcome::Rejected {
                        reason: e.to_string(),
                    });
                    continue;
                }
            };
            pending.push((
                i,
                NewContribution {
                    chain: candidate.chain,
                    wallet_id: candidate.wallet_id.clone(),
                    tx_hash: candidate.tx_hash.clone(),
                    amount,
                    block_height: candidate.block_height,
                    block_time: candidate.block_time,
                    note: candidate.note.clone(),
                    source: candidate.source,
                },
            ));
            // Overwritten below if the batch insert wins; a conflict keeps it.
            outcomes.push(RecordOutcome::AlreadyRecorded);
        }

        if pending.is_empty() {
            return Ok(outcomes);
        }

        let rows: Vec<NewContribution> = pending.iter().map(|(_, row)| row.clone()).collect();
        let inserted = self.store.insert_contributions(&rows).await?;

        for ((i, row), result) in pending.into_iter().zip(inserted) {
            match result {
                InsertOutcome::Inserted(id) => {
                    tracing::info!(
                        chain = %row.chain,
                        tx_hash = %row.tx_hash,
                        wallet_id = %row.wallet_id,
                        amount = %row.amount,
                        source = row.source.as_str(),
                        id,
                        "Contribution recorded"
                    );
                    let symbol = ChainProfile::builtin(row.chain).symbol;
                    self.attach_usd(id, row.chain, symbol, &row.amount).await;
                    outcomes[i] = RecordOutcome::Inserted { id };
                }
                InsertOutcome::Conflict => {
                    tracing::debug!(
                        chain = %row.chain,
                        tx_hash = %row.tx_hash,
                        "Concurrent writer recorded the contribution first"
                    );
                }
            }
        }

        Ok(outcomes)
    }

    /// Valuation is best effort and never changes the record outcome.
    async fn attach_usd(&self, id: i64, chain: ChainSlug, symbol: &str, amount: &BigDecimal) {
        let Some(price) = self.pricing.usd_price(symbol).await else {
            return;
        };
        let usd = (amount * price).round(2);
        if let Err(e) = self.store.attach_usd(id, &usd).await {
            tracing::warn!(chain = %chain, id, error = %e, "Failed to attach USD amount");
        }
    }
}

fn rejection(candidate: &Candidate) -> Option<&'static str> {
    if candidate.amount.is_zero() {
        Some("zero amount")
    } else if candidate.tx_hash.trim().is_empty() {
        Some("empty transaction hash")
    } else if candidate.wallet_id.trim().is_empty() {
        Some("empty wallet id")
    } else {
        None
    }
}
