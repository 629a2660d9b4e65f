//! On-demand verification of a single user-submitted transaction.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::adapter::{ConfirmedTx, TxLookup};
use crate::chain::{canonical_tx_hash, ChainSlug};
use crate::error::ChainError;
use crate::ingest::{group_candidates, matching_credits, ChainRuntime, RecordOutcome, Recorder};
use crate::store::{ContributionSource, Store};
use crate::wallets::WalletDirectory;

/// Terminal result of a claim. Every variant maps to a stable code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    Inserted { ids: Vec<i64> },
    Duplicate,
    TxNotFound,
    TxPending,
    NotProjectWallet,
    InvalidPayload(String),
    RpcUnavailable(String),
    StoreError(String),
}

impl ClaimOutcome {
    pub fn code(&self) -> &'static str {
        match self {
            ClaimOutcome::Inserted { .. } => "inserted",
            ClaimOutcome::Duplicate => "duplicate",
            ClaimOutcome::TxNotFound => "tx_not_found",
            ClaimOutcome::TxPending => "tx_pending",
            ClaimOutcome::NotProjectWallet => "not_project_wallet",
            ClaimOutcome::InvalidPayload(_) => "invalid_payload",
            ClaimOutcome::RpcUnavailable(_) => "rpc_unavailable",
            ClaimOutcome::StoreError(_) => "store_error",
        }
    }

    /// Message safe to show to the submitter; provider and database details
    /// stay in the logs.
    pub fn message(&self) -> String {
        match self {
            ClaimOutcome::Inserted { .. } => "Contribution recorded. Thank you!".to_string(),
            ClaimOutcome::Duplicate => "This transaction has already been recorded.".to_string(),
            ClaimOutcome::TxNotFound => "Transaction not found on this chain.".to_string(),
            ClaimOutcome::TxPending => {
                "Transaction is not confirmed yet. Please try again in a few minutes.".to_string()
            }
            ClaimOutcome::NotProjectWallet => {
                "Transaction did not send funds to a project wallet.".to_string()
            }
            ClaimOutcome::InvalidPayload(reason) => format!("Invalid request: {}", reason),
            ClaimOutcome::RpcUnavailable(_) => {
                "Chain providers are unavailable right now. Please try again later.".to_string()
            }
            ClaimOutcome::StoreError(_) => {
                "Could not save the contribution right now. Please try again later.".to_string()
            }
        }
    }
}

/// JSON shape returned to claim callers.
#[derive(Debug, Clone, Serialize)]
pub struct ClaimResponse {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ids: Vec<i64>,
}

pub struct ClaimVerifier {
    chains: Arc<BTreeMap<ChainSlug, ChainRuntime>>,
    store: Arc<dyn Store>,
    recorder: Arc<Recorder>,
    max_note_len: usize,
}

impl ClaimVerifier {
    pub fn new(
        chains: Arc<BTreeMap<ChainSlug, ChainRuntime>>,
        store: Arc<dyn Store>,
        recorder: Arc<Recorder>,
        max_note_len: usize,
    ) -> Self {
        Self {
            chains,
            store,
            recorder,
            max_note_len,
        }
    }

    /// Validate, dedupe, fetch, confirm, match, persist.
    pub async fn verify_and_record(
        &self,
        chain: &str,
        tx: &str,
        note: Option<&str>,
    ) -> ClaimOutcome {
        let outcome = self.verify(chain, tx, note).await;
        tracing::info!(chain, tx, code = outcome.code(), "Claim processed");
        outcome
    }

    pub async fn respond(&self, chain: &str, tx: &str, note: Option<&str>) -> ClaimResponse {
        let outcome = self.verify_and_record(chain, tx, note).await;
        let slug = chain.parse::<ChainSlug>().ok();
        ClaimResponse {
            code: outcome.code(),
            message: outcome.message(),
            chain: slug.map(|s| s.to_string()),
            tx_hash: slug.and_then(|s| canonical_tx_hash(s, tx).ok()),
            ids: match outcome {
                ClaimOutcome::Inserted { ids } => ids,
                _ => Vec::new(),
            },
        }
    }

    async fn verify(&self, chain: &str, tx: &str, note: Option<&str>) -> ClaimOutcome {
        // Validate
        let slug = match chain.parse::<ChainSlug>() {
            Ok(slug) => slug,
            Err(e) => return ClaimOutcome::InvalidPayload(e.to_string()),
        };
        let Some(runtime) = self.chains.get(&slug) else {
            return ClaimOutcome::InvalidPayload(format!("chain '{}' is not enabled", slug));
        };
        let tx_hash = match canonical_tx_hash(slug, tx) {
            Ok(hash) => hash,
            Err(e) => return ClaimOutcome::InvalidPayload(e.to_string()),
        };
        let note = note.map(str::trim).filter(|n| !n.is_empty());
        if let Some(n) = note {
            if n.chars().count() > self.max_note_len {
                return ClaimOutcome::InvalidPayload(format!(
                    "note is longer than {} characters",
                    self.max_note_len
                ));
            }
        }

        // Dedupe. A recorded transaction always answers `Duplicate`, but it is
        // still looked up so wallets missing from the ledger get their rows.
        let recorded = match self.store.contribution_exists(slug, &tx_hash, None).await {
            Ok(recorded) => recorded,
            Err(e) => return ClaimOutcome::StoreError(e.to_string()),
        };

        let outcome = self.verify_on_chain(slug, runtime, &tx_hash, note).await;
        if !recorded {
            return outcome;
        }
        match outcome {
            ClaimOutcome::Inserted { ids } => {
                self.duplicate(slug, &tx_hash, note).await;
                ClaimOutcome::Inserted { ids }
            }
            ClaimOutcome::StoreError(e) => ClaimOutcome::StoreError(e),
            ClaimOutcome::Duplicate => ClaimOutcome::Duplicate,
            _ => self.duplicate(slug, &tx_hash, note).await,
        }
    }

    /// Fetch, confirm, match and persist.
    async fn verify_on_chain(
        &self,
        slug: ChainSlug,
        runtime: &ChainRuntime,
        tx_hash: &str,
        note: Option<&str>,
    ) -> ClaimOutcome {
        // Fetch + Confirm
        let confirmed = match runtime.adapter.transaction(tx_hash).await {
            Ok(TxLookup::NotFound) => return ClaimOutcome::TxNotFound,
            Ok(TxLookup::Pending) => return ClaimOutcome::TxPending,
            Ok(TxLookup::Confirmed(confirmed)) => confirmed,
            Err(e) => return unavailable(slug, tx_hash, e),
        };
        if let Err(outcome) = self.check_depth(runtime, &confirmed).await {
            return outcome;
        }

        // Match
        let directory = match WalletDirectory::load(self.store.as_ref()).await {
            Ok(directory) => directory,
            Err(e) => return ClaimOutcome::StoreError(e.to_string()),
        };
        let wallets = directory.for_chain(slug);
        let matched = matching_credits(&wallets, confirmed.credits);
        if matched.is_empty() {
            return ClaimOutcome::NotProjectWallet;
        }
        let kept = match runtime.adapter.retain_successful(matched).await {
            Ok(kept) => kept,
            Err(e) => return unavailable(slug, tx_hash, e),
        };
        let mut candidates = group_candidates(
            slug,
            &wallets,
            &kept,
            confirmed.height,
            confirmed.time,
            ContributionSource::Claim,
        );
        if candidates.is_empty() {
            return ClaimOutcome::NotProjectWallet;
        }

        // Persist, all wallets of the transaction or none.
        for candidate in &mut candidates {
            candidate.note = note.map(str::to_string);
        }
        let outcomes = match self.recorder.record_all(&candidates).await {
            Ok(outcomes) => outcomes,
            Err(e) => return ClaimOutcome::StoreError(e.to_string()),
        };

        let mut ids = Vec::new();
        let mut already = false;
        let mut rejected = None;
        for outcome in outcomes {
            match outcome {
                RecordOutcome::Inserted { id } => ids.push(id),
                RecordOutcome::AlreadyRecorded => already = true,
                RecordOutcome::Rejected { reason } => rejected = Some(reason),
            }
        }

        if !ids.is_empty() {
            ClaimOutcome::Inserted { ids }
        } else if already {
            self.duplicate(slug, tx_hash, note).await
        } else {
            ClaimOutcome::InvalidPayload(rejected.unwrap_or_else(|| "nothing to record".to_string()))
        }
    }

    /// Confirmed only once the containing block is at or below the safe tip.
    async fn check_depth(
        &self,
        runtime: &ChainRuntime,
        confirmed: &ConfirmedTx,
    ) -> Result<(), ClaimOutcome> {
        if runtime.profile.min_confirmations == 0 {
            return Ok(());
        }
        let tip = runtime
            .adapter
            .tip()
            .await
            .map_err(|e| unavailable(runtime.profile.slug, &confirmed.tx_hash, e))?;
        match runtime.profile.safe_tip(tip) {
            Some(safe) if confirmed.height <= safe => Ok(()),
            _ => Err(ClaimOutcome::TxPending),
        }
    }

    /// Attach a note to an existing record if it has none.
    async fn duplicate(&self, slug: ChainSlug, tx_hash: &str, note: Option<&str>) -> ClaimOutcome {
        if let Some(note) = note {
            match self.store.attach_note(slug, tx_hash, note).await {
                Ok(true) => tracing::info!(chain = %slug, tx_hash, "Note attached to existing contribution"),
                Ok(false) => {}
                Err(e) => tracing::warn!(chain = %slug, tx_hash, error = %e, "Failed to attach note"),
            }
        }
        ClaimOutcome::Duplicate
    }
}

fn unavailable(slug: ChainSlug, tx_hash: &str, error: ChainError) -> ClaimOutcome {
    if error.is_transient() {
        tracing::warn!(chain = %slug, tx_hash, error = %error, "Claim lookup failed: providers unavailable");
    } else {
        tracing::error!(chain = %slug, tx_hash, error = %error, "Claim lookup failed");
    }
    ClaimOutcome::RpcUnavailable(error.to_string())
}
