//! Uniform view over every chain family.
//!
//! Adapters return raw credits (every value-bearing transfer in a block);
//! matching against project wallets happens in the scanner and claim paths.
//! Addresses and transaction hashes are already canonical when they leave an
//! adapter.

pub mod account;
pub mod evm;
pub mod utxo;
mod value;

use alloy::primitives::U256;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

use crate::chain::{canonical_address, canonical_tx_hash, ChainFamily, ChainProfile, ChainSlug};
use crate::error::ChainError;
use crate::rpc::RpcRouter;

pub use account::AccountAdapter;
pub use evm::EvmAdapter;
pub use utxo::{UtxoAdapter, UtxoDialect};

/// Value moved to one address by one transaction, in native units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credit {
    pub tx_hash: String,
    pub to: String,
    pub amount: U256,
}

impl Credit {
    /// Build a credit with canonical hash and address.
    pub fn new(slug: ChainSlug, tx_hash: &str, to: &str, amount: U256) -> Result<Self, ChainError> {
        let tx_hash =
            canonical_tx_hash(slug, tx_hash).map_err(|e| ChainError::malformed(slug, e.to_string()))?;
        Ok(Self {
            tx_hash,
            to: canonical_address(slug, to),
            amount,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainBlock {
    pub height: u64,
    pub time: DateTime<Utc>,
    pub credits: Vec<Credit>,
}

impl ChainBlock {
    pub fn empty(height: u64) -> Self {
        Self {
            height,
            time: DateTime::<Utc>::default(),
            credits: Vec::new(),
        }
    }
}

/// A transaction placed in a block/ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmedTx {
    pub tx_hash: String,
    pub height: u64,
    pub time: DateTime<Utc>,
    pub credits: Vec<Credit>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxLookup {
    NotFound,
    /// Known to the network but not yet in a finalized block.
    Pending,
    Confirmed(ConfirmedTx),
}

#[async_trait]
pub trait ChainAdapter: Send + Sync {
    fn slug(&self) -> ChainSlug;

    /// Latest height reported by the providers.
    async fn tip(&self) -> Result<u64, ChainError>;

    async fn block(&self, height: u64) -> Result<ChainBlock, ChainError>;

    /// Look up one transaction by canonical hash.
    async fn transaction(&self, tx_hash: &str) -> Result<TxLookup, ChainError>;

    /// Drop credits whose transaction did not succeed. Only called with
    /// credits that already matched a project wallet.
    async fn retain_successful(&self, credits: Vec<Credit>) -> Result<Vec<Credit>, ChainError> {
        Ok(credits)
    }

    /// Sanity check run once at startup.
    async fn probe(&self) -> Result<(), ChainError> {
        self.tip().await.map(|_| ())
    }
}

/// Per-chain knobs that only some families use.
#[derive(Debug, Clone)]
pub struct AdapterOptions {
    pub utxo_dialect: UtxoDialect,
    pub receipt_throttle: Duration,
}

impl Default for AdapterOptions {
    fn default() -> Self {
        Self {
            utxo_dialect: UtxoDialect::Esplora,
            receipt_throttle: Duration::from_millis(50),
        }
    }
}

/// Pick the adapter implementation for a chain's family.
pub fn build_adapter(
    profile: &ChainProfile,
    router: RpcRouter,
    options: &AdapterOptions,
) -> Arc<dyn ChainAdapter> {
    match profile.family {
        ChainFamily::Evm => Arc::new(EvmAdapter::new(profile.slug, router, options.receipt_throttle)),
        ChainFamily::Utxo => Arc::new(UtxoAdapter::new(
            profile.slug,
            router,
            options.utxo_dialect,
            profile.decimals,
        )),
        ChainFamily::Account(dialect) => Arc::new(AccountAdapter::new(
            profile.slug,
            dialect,
            router,
            profile.decimals,
        )),
    }
}
