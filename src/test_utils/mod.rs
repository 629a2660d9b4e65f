//! Scripted chain adapter and fixtures for engine-level tests.

use alloy::primitives::U256;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::adapter::{ChainAdapter, ChainBlock, ConfirmedTx, Credit, TxLookup};
use crate::chain::{ChainProfile, ChainSlug};
use crate::error::{ChainError, RpcError};
use crate::ingest::ChainRuntime;
use crate::store::WalletRow;

#[derive(Default)]
struct Script {
    tip: u64,
    blocks: HashMap<u64, ChainBlock>,
    txs: HashMap<String, TxLookup>,
    failing_heights: HashSet<u64>,
    reverted: HashSet<String>,
    unavailable: bool,
    block_delay: Option<Duration>,
}

/// In-memory chain whose blocks and transactions are set up by the test.
/// Heights without a scripted block come back empty.
pub struct ScriptedAdapter {
    slug: ChainSlug,
    script: Mutex<Script>,
    block_calls: AtomicU64,
}

impl ScriptedAdapter {
    #[must_use]
    pub fn new(slug: ChainSlug, tip: u64) -> Self {
        Self {
            slug,
            script: Mutex::new(Script {
                tip,
                ..Default::default()
            }),
            block_calls: AtomicU64::new(0),
        }
    }

    fn with_script<T>(&self, f: impl FnOnce(&mut Script) -> T) -> T {
        let mut script = self.script.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut script)
    }

    pub fn set_tip(&self, tip: u64) {
        self.with_script(|s| s.tip = tip);
    }

    /// Add a credit to the block at `height` and register the transaction
    /// as confirmed there.
    pub fn add_credit(&self, height: u64, tx_hash: &str, to: &str, amount: u64) {
        let credit = Credit {
            tx_hash: tx_hash.to_string(),
            to: to.to_string(),
            amount: U256::from(amount),
        };
        let time = block_time(height);
        self.with_script(|s| {
            let block = s.blocks.entry(height).or_insert_with(|| ChainBlock {
                height,
                time,
                credits: Vec::new(),
            });
            block.credits.push(credit.clone());

            let entry = s.txs.entry(tx_hash.to_string()).or_insert_with(|| {
                TxLookup::Confirmed(ConfirmedTx {
                    tx_hash: tx_hash.to_string(),
                    height,
                    time,
                    credits: Vec::new(),
                })
            });
            if let TxLookup::Confirmed(tx) = entry {
                tx.credits.push(credit);
            }
        });
    }

    pub fn set_tx(&self, tx_hash: &str, lookup: TxLookup) {
        self.with_script(|s| {
            s.txs.insert(tx_hash.to_string(), lookup);
        });
    }

    /// Fetching this height fails as if every provider were down.
    pub fn fail_height(&self, height: u64) {
        self.with_script(|s| {
            s.failing_heights.insert(height);
        });
    }

    pub fn clear_failures(&self) {
        self.with_script(|s| s.failing_heights.clear());
    }

    /// Credits of this transaction are dropped by `retain_successful`.
    pub fn revert(&self, tx_hash: &str) {
        self.with_script(|s| {
            s.reverted.insert(tx_hash.to_string());
        });
    }

    /// Every call fails while set.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.with_script(|s| s.unavailable = unavailable);
    }

    pub fn set_block_delay(&self, delay: Duration) {
        self.with_script(|s| s.block_delay = Some(delay));
    }

    pub fn block_calls(&self) -> u64 {
        self.block_calls.load(Ordering::Relaxed)
    }

    fn outage(&self) -> ChainError {
        ChainError::Rpc(RpcError::Unavailable {
            chain: self.slug,
            attempts: 1,
            last_error: "scripted outage".to_string(),
        })
    }
}

#[async_trait]
impl ChainAdapter for ScriptedAdapter {
    fn slug(&self) -> ChainSlug {
        self.slug
    }

    async fn tip(&self) -> Result<u64, ChainError> {
        let (unavailable, tip) = self.with_script(|s| (s.unavailable, s.tip));
        if unavailable {
            return Err(self.outage());
        }
        Ok(tip)
    }

    async fn block(&self, height: u64) -> Result<ChainBlock, ChainError> {
        self.block_calls.fetch_add(1, Ordering::Relaxed);
        let (delay, failing, block) = self.with_script(|s| {
            (
                s.block_delay,
                s.unavailable || s.failing_heights.contains(&height),
                s.blocks.get(&height).cloned(),
            )
        });
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if failing {
            return Err(self.outage());
        }
        Ok(block.unwrap_or_else(|| ChainBlock {
            height,
            time: block_time(height),
            credits: Vec::new(),
        }))
    }

    async fn transaction(&self, tx_hash: &str) -> Result<TxLookup, ChainError> {
        let (unavailable, lookup) =
            self.with_script(|s| (s.unavailable, s.txs.get(tx_hash).cloned()));
        if unavailable {
            return Err(self.outage());
        }
        Ok(lookup.unwrap_or(TxLookup::NotFound))
    }

    async fn retain_successful(&self, credits: Vec<Credit>) -> Result<Vec<Credit>, ChainError> {
        let reverted = self.with_script(|s| s.reverted.clone());
        Ok(credits
            .into_iter()
            .filter(|c| !reverted.contains(&c.tx_hash))
            .collect())
    }
}

/// Deterministic timestamp for a scripted height.
pub fn block_time(height: u64) -> DateTime<Utc> {
    let secs = 1_700_000_000 + i64::try_from(height).unwrap_or(0);
    Utc.timestamp_opt(secs, 0).single().unwrap_or_default()
}

pub fn runtime(adapter: Arc<ScriptedAdapter>) -> ChainRuntime {
    ChainRuntime {
        profile: ChainProfile::builtin(adapter.slug),
        adapter,
    }
}

pub fn wallet(wallet_id: &str, chain: &str, address: &str) -> WalletRow {
    WalletRow {
        wallet_id: wallet_id.to_string(),
        chain: chain.to_string(),
        address: address.to_string(),
        label: None,
        is_active: true,
    }
}
