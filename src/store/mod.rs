//! Persistence seams: wallets, scan cursors and the contribution ledger.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::chain::ChainSlug;
use crate::error::StoreError;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// A project-owned address as stored. `chain` is kept as written so rows with
/// unknown or aliased chain names can be reported rather than rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WalletRow {
    pub wallet_id: String,
    pub chain: String,
    pub address: String,
    pub label: Option<String>,
    pub is_active: bool,
}

/// Which path discovered a contribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContributionSource {
    Scan,
    Claim,
}

impl ContributionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContributionSource::Scan => "scan",
            ContributionSource::Claim => "claim",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewContribution {
    pub chain: ChainSlug,
    pub wallet_id: String,
    pub tx_hash: String,
    /// Whole-coin decimal amount.
    pub amount: BigDecimal,
    pub block_height: u64,
    pub block_time: DateTime<Utc>,
    pub note: Option<String>,
    pub source: ContributionSource,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContributionRow {
    pub id: i64,
    pub chain: String,
    pub wallet_id: String,
    pub tx_hash: String,
    pub amount: BigDecimal,
    pub amount_usd: Option<BigDecimal>,
    pub block_height: i64,
    pub block_time: DateTime<Utc>,
    pub note: Option<String>,
    pub source: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(i64),
    /// The `(tx_hash, wallet_id)` key already exists.
    Conflict,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CursorRow {
    pub chain: String,
    pub last_scanned_height: u64,
    pub updated_at: DateTime<Utc>,
}

#[async_trait]
pub trait WalletSource: Send + Sync {
    async fn active_wallets(&self) -> Result<Vec<WalletRow>, StoreError>;

    async fn upsert_wallet(&self, wallet: &WalletRow) -> Result<(), StoreError>;
}

#[async_trait]
pub trait CursorStore: Send + Sync {
    async fn cursor(&self, chain: ChainSlug) -> Result<Option<u64>, StoreError>;

    /// Move the cursor forward to `height`; never moves it backwards.
    /// Returns the stored value after the update.
    async fn advance_cursor(&self, chain: ChainSlug, height: u64) -> Result<u64, StoreError>;

    /// Explicitly set the cursor, including backwards.
    async fn rewind_cursor(&self, chain: ChainSlug, height: u64) -> Result<(), StoreError>;

    async fn list_cursors(&self) -> Result<Vec<CursorRow>, StoreError>;
}

#[async_trait]
pub trait ContributionStore: Send + Sync {
    /// With `wallet_id = None`, true if any row exists for the transaction.
    async fn contribution_exists(
        &self,
        chain: ChainSlug,
        tx_hash: &str,
        wallet_id: Option<&str>,
    ) -> Result<bool, StoreError>;

    async fn insert_contribution(
        &self,
        contribution: &NewContribution,
    ) -> Result<InsertOutcome, StoreError>;

    /// Insert several rows atomically. Each row is either inserted or reported
    /// as a conflict; on error nothing is written.
    async fn insert_contributions(
        &self,
        contributions: &[NewContribution],
    ) -> Result<Vec<InsertOutcome>, StoreError>;

    /// Set `amount_usd` if it is still empty. Returns whether a row changed.
    async fn attach_usd(&self, id: i64, amount_usd: &BigDecimal) -> Result<bool, StoreError>;

    /// Set `note` on the transaction's rows that have none.
    async fn attach_note(
        &self,
        chain: ChainSlug,
        tx_hash: &str,
        note: &str,
    ) -> Result<bool, StoreError>;

    async fn contributions_for_tx(
        &self,
        chain: ChainSlug,
        tx_hash: &str,
    ) -> Result<Vec<ContributionRow>, StoreError>;
}

/// Everything the engine needs from one backing store.
pub trait Store: WalletSource + CursorStore + ContributionStore {}

impl<T: WalletSource + CursorStore + ContributionStore> Store for T {}
