use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::{group_candidates, matching_credits, total_amount, Candidate, RecordOutcome, Recorder};
use crate::adapter::{ChainAdapter, ChainBlock};
use crate::amount::normalize;
use crate::chain::{ChainProfile, ChainSlug};
use crate::error::{ChainError, ScanError};
use crate::store::{ContributionSource, Store};
use crate::wallets::WalletDirectory;

/// Caller overrides for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ScanOptions {
    /// Start at this height regardless of the cursor.
    pub start_override: Option<u64>,
    /// Start roughly this many hours behind the tip.
    pub since_hours: Option<u64>,
    /// Cap on blocks for this run; defaults to the chain profile's cap.
    pub max_blocks: Option<u64>,
}

/// Inclusive block range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScanRange {
    pub start: u64,
    pub end: u64,
}

impl ScanRange {
    pub fn block_count(&self) -> u64 {
        self.end - self.start + 1
    }
}

/// Pick the range for one run, or `None` when there is nothing final to scan.
///
/// Start priority: explicit override, time window, cursor minus overlap,
/// first-run lookback. The end never passes `tip - min_confirmations` and the
/// range never exceeds the per-run cap. The overlap is clamped to half the cap
/// so a run always makes forward progress.
pub fn plan_range(
    profile: &ChainProfile,
    tip: u64,
    cursor: Option<u64>,
    options: &ScanOptions,
) -> Option<ScanRange> {
    let safe_tip = profile.safe_tip(tip)?;
    let max_blocks = options
        .max_blocks
        .unwrap_or(profile.max_blocks_per_run)
        .max(1);

    let start = if let Some(start) = options.start_override {
        start
    } else if let Some(hours) = options.since_hours {
        tip.saturating_sub(profile.blocks_for_hours(hours))
    } else if let Some(cursor) = cursor {
        let overlap = profile.overlap_blocks.min(max_blocks / 2);
        cursor.saturating_add(1).saturating_sub(overlap)
    } else {
        safe_tip
            .saturating_add(1)
            .saturating_sub(profile.initial_lookback_blocks.max(1))
    };

    if start > safe_tip {
        return None;
    }
    let end = safe_tip.min(start.saturating_add(max_blocks - 1));
    Some(ScanRange { start, end })
}

#[derive(Debug, Clone)]
pub struct ScannerSettings {
    /// Blocks committed (recorded + cursor advanced) together.
    pub batch_blocks: u64,
    /// Block fetches in flight at once.
    pub fetch_concurrency: usize,
    /// Wall-clock budget per run.
    pub run_budget: Option<Duration>,
}

impl Default for ScannerSettings {
    fn default() -> Self {
        Self {
            batch_blocks: 25,
            fetch_concurrency: 4,
            run_budget: Some(Duration::from_secs(300)),
        }
    }
}

/// Outcome of one ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestionReport {
    pub chain: String,
    pub tip: Option<u64>,
    pub scanned_range: Option<ScanRange>,
    pub blocks_scanned: u64,
    pub matched: u64,
    pub inserted: u64,
    pub already_recorded: u64,
    pub rejected: u64,
    /// Stored cursor after the run.
    pub cursor: Option<u64>,
    /// Why the run stopped before the end of its range.
    pub aborted: Option<String>,
}

enum Stop {
    Cancelled,
    Budget,
    Chain(ChainError),
}

impl Stop {
    fn describe(&self) -> String {
        match self {
            Stop::Cancelled => "cancelled".to_string(),
            Stop::Budget => "time budget exhausted".to_string(),
            Stop::Chain(e) => e.to_string(),
        }
    }
}

/// Incremental scanner for one chain.
pub struct Scanner {
    profile: ChainProfile,
    adapter: Arc<dyn ChainAdapter>,
    store: Arc<dyn Store>,
    recorder: Arc<Recorder>,
    settings: ScannerSettings,
}

impl Scanner {
    pub fn new(
        profile: ChainProfile,
        adapter: Arc<dyn ChainAdapter>,
        store: Arc<dyn Store>,
        recorder: Arc<Recorder>,
        settings: ScannerSettings,
    ) -> Self {
        Self {
            profile,
            adapter,
            store,
            recorder,
            settings,
        }
    }

    pub fn chain(&self) -> ChainSlug {
        self.profile.slug
    }

    /// One run: plan a range, then fetch, match, record and advance the cursor
    /// batch by batch. A chain failure, cancellation or budget expiry stops
    /// the run after the last committed batch and is reported in `aborted`.
    pub async fn run(
        &self,
        options: &ScanOptions,
        cancel: &CancellationToken,
    ) -> Result<IngestionReport, ScanError> {
        let chain = self.profile.slug;
        let deadline = self
            .settings
            .run_budget
            .map(|budget| tokio::time::Instant::now() + budget);
        let mut report = IngestionReport {
            chain: chain.to_string(),
            ..Default::default()
        };

        let directory = WalletDirectory::load(self.store.as_ref()).await?;
        let wallets = directory.for_chain(chain);
        if wallets.is_empty() {
            tracing::info!(chain = %chain, "No active wallets, skipping scan");
            report.cursor = self.store.cursor(chain).await?;
            return Ok(report);
        }

        let tip = self.adapter.tip().await?;
        let cursor = self.store.cursor(chain).await?;
        report.tip = Some(tip);
        report.cursor = cursor;

        let Some(range) = plan_range(&self.profile, tip, cursor, options) else {
            tracing::info!(chain = %chain, tip, cursor = ?cursor, "Nothing final to scan");
            return Ok(report);
        };
        report.scanned_range = Some(range);

        tracing::info!(
            chain = %chain,
            from = range.start,
            to = range.end,
            tip,
            wallets = wallets.len(),
            "Scanning block range"
        );

        let batch_blocks = self.settings.batch_blocks.max(1);
        let mut batch_start = range.start;
        while batch_start <= range.end {
            let batch_end = range.end.min(batch_start.saturating_add(batch_blocks - 1));

            let blocks = match self.fetch_batch(batch_start, batch_end, cancel, deadline).await {
                Ok(blocks) => blocks,
                Err(stop) => {
                    self.log_stop(&stop, batch_start);
                    report.aborted = Some(stop.describe());
                    return Ok(report);
                }
            };

            let candidates = match self.match_batch(&wallets, blocks).await {
                Ok(candidates) => candidates,
                Err(e) => {
                    self.log_stop(&Stop::Chain(e.clone()), batch_start);
                    report.aborted = Some(e.to_string());
                    return Ok(report);
                }
            };

            report.matched += candidates.len() as u64;
            if !candidates.is_empty() {
                tracing::info!(
                    chain = %chain,
                    from = batch_start,
                    to = batch_end,
                    count = candidates.len(),
                    total = %normalize(total_amount(&candidates), self.profile.decimals),
                    "Recording matched transfers"
                );
            }
            for candidate in &candidates {
                match self.recorder.record(candidate).await? {
                    RecordOutcome::Inserted { .. } => report.inserted += 1,
                    RecordOutcome::AlreadyRecorded => report.already_recorded += 1,
                    RecordOutcome::Rejected { .. } => report.rejected += 1,
                }
            }

            report.cursor = Some(self.store.advance_cursor(chain, batch_end).await?);
            report.blocks_scanned += batch_end - batch_start + 1;
            batch_start = batch_end + 1;
        }

        tracing::info!(
            chain = %chain,
            blocks = report.blocks_scanned,
            matched = report.matched,
            inserted = report.inserted,
            already_recorded = report.already_recorded,
            "Scan complete"
        );
        Ok(report)
    }

    /// Fetch `[start, end]` in order with bounded concurrency.
    async fn fetch_batch(
        &self,
        start: u64,
        end: u64,
        cancel: &CancellationToken,
        deadline: Option<tokio::time::Instant>,
    ) -> Result<Vec<ChainBlock>, Stop> {
        if cancel.is_cancelled() {
            return Err(Stop::Cancelled);
        }
        if deadline.is_some_and(|d| tokio::time::Instant::now() >= d) {
            return Err(Stop::Budget);
        }

        let adapter = &self.adapter;
        let fetch = stream::iter(start..=end)
            .map(|height| async move { adapter.block(height).await })
            .buffered(self.settings.fetch_concurrency.max(1))
            .collect::<Vec<_>>();

        let budget = async {
            match deadline {
                Some(d) => tokio::time::sleep_until(d).await,
                None => std::future::pending::<()>().await,
            }
        };

        let results = tokio::select! {
            results = fetch => results,
            _ = cancel.cancelled() => return Err(Stop::Cancelled),
            _ = budget => return Err(Stop::Budget),
        };

        results
            .into_iter()
            .collect::<Result<Vec<_>, _>>()
            .map_err(Stop::Chain)
    }

    async fn match_batch(
        &self,
        wallets: &std::collections::HashMap<String, String>,
        blocks: Vec<ChainBlock>,
    ) -> Result<Vec<Candidate>, ChainError> {
        let mut candidates = Vec::new();
        for block in blocks {
            let matched = matching_credits(wallets, block.credits);
            if matched.is_empty() {
                continue;
            }
            let kept = self.adapter.retain_successful(matched).await?;
            candidates.extend(group_candidates(
                self.profile.slug,
                wallets,
                &kept,
                block.height,
                block.time,
                ContributionSource::Scan,
            ));
        }
        Ok(candidates)
    }

    fn log_stop(&self, stop: &Stop, at: u64) {
        match stop {
            Stop::Chain(e) => tracing::error!(
                chain = %self.profile.slug,
                block = at,
                transient = e.is_transient(),
                error = %e,
                "Scan aborted, cursor kept at last committed batch"
            ),
            other => tracing::warn!(
                chain = %self.profile.slug,
                block = at,
                reason = %other.describe(),
                "Scan stopped early"
            ),
        }
    }
}
