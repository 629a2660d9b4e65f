use alloy::primitives::U256;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;

use super::value::{array_at, flex_u64, str_at, u64_at, unix_seconds};
use super::{ChainAdapter, ChainBlock, ConfirmedTx, Credit, TxLookup};
use crate::amount::parse_units;
use crate::chain::ChainSlug;
use crate::error::{ChainError, RpcError};
use crate::rpc::RpcRouter;

/// Esplora pages block transactions in chunks of this size.
const ESPLORA_PAGE: u64 = 25;

/// bitcoind error code for an unknown transaction.
const RPC_INVALID_ADDRESS_OR_KEY: i64 = -5;

/// API spoken by a UTXO chain's providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UtxoDialect {
    /// Esplora / mempool.space style REST.
    #[default]
    Esplora,
    /// bitcoind-compatible JSON-RPC.
    Bitcoind,
}

impl fmt::Display for UtxoDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UtxoDialect::Esplora => f.write_str("esplora"),
            UtxoDialect::Bitcoind => f.write_str("bitcoind"),
        }
    }
}

impl FromStr for UtxoDialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "esplora" => Ok(UtxoDialect::Esplora),
            "bitcoind" => Ok(UtxoDialect::Bitcoind),
            other => Err(format!("Unknown UTXO dialect '{}'", other)),
        }
    }
}

/// Output-level credits for bitcoin-like chains. Every output with an address
/// becomes a credit; several outputs to one wallet are summed by the caller.
pub struct UtxoAdapter {
    slug: ChainSlug,
    router: RpcRouter,
    dialect: UtxoDialect,
    decimals: u8,
}

impl UtxoAdapter {
    pub fn new(slug: ChainSlug, router: RpcRouter, dialect: UtxoDialect, decimals: u8) -> Self {
        Self {
            slug,
            router,
            dialect,
            decimals,
        }
    }

    // ========================================================================
    // Esplora
    // ========================================================================

    fn esplora_credits(&self, tx: &Value) -> Result<Vec<Credit>, ChainError> {
        let txid = str_at(self.slug, tx, "/txid")?;
        let mut credits = Vec::new();
        for out in array_at(tx, "/vout") {
            let Some(address) = out.get("scriptpubkey_address").and_then(Value::as_str) else {
                continue;
            };
            let sats = out.get("value").and_then(flex_u64).unwrap_or(0);
            if sats == 0 {
                continue;
            }
            credits.push(Credit::new(self.slug, txid, address, U256::from(sats))?);
        }
        Ok(credits)
    }

    async fn esplora_block(&self, height: u64) -> Result<ChainBlock, ChainError> {
        let hash = match self.router.get(&format!("block-height/{}", height)).await? {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            _ => return Err(ChainError::malformed(self.slug, "block-height response")),
        };
        let header = self.router.get(&format!("block/{}", hash)).await?;
        let time = unix_seconds(u64_at(self.slug, &header, "/timestamp")? as i64);
        let tx_count = u64_at(self.slug, &header, "/tx_count")?;

        let mut credits = Vec::new();
        let mut start = 0;
        while start < tx_count {
            let page = self
                .router
                .get(&format!("block/{}/txs/{}", hash, start))
                .await?;
            let txs = page.as_array().map(Vec::as_slice).unwrap_or(&[]);
            if txs.is_empty() {
                break;
            }
            for tx in txs {
                credits.extend(self.esplora_credits(tx)?);
            }
            start += ESPLORA_PAGE;
        }

        Ok(ChainBlock {
            height,
            time,
            credits,
        })
    }

    async fn esplora_transaction(&self, tx_hash: &str) -> Result<TxLookup, ChainError> {
        let tx = match self.router.get(&format!("tx/{}", tx_hash)).await {
            Ok(tx) => tx,
            Err(RpcError::NotFound) => return Ok(TxLookup::NotFound),
            Err(RpcError::Rpc { code: 400, .. }) => return Ok(TxLookup::NotFound),
            Err(e) => return Err(e.into()),
        };

        let confirmed = tx
            .pointer("/status/confirmed")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if !confirmed {
            return Ok(TxLookup::Pending);
        }

        Ok(TxLookup::Confirmed(ConfirmedTx {
            tx_hash: tx_hash.to_string(),
            height: u64_at(self.slug, &tx, "/status/block_height")?,
            time: unix_seconds(u64_at(self.slug, &tx, "/status/block_time")? as i64),
            credits: self.esplora_credits(&tx)?,
        }))
    }

    // ========================================================================
    // bitcoind
    // ========================================================================

    /// Outputs report whole coins as JSON floats. `serde_json` keeps number
    /// literals verbatim (`arbitrary_precision`), so the text is parsed as a
    /// decimal and never passes through `f64`.
    fn bitcoind_credits(&self, tx: &Value) -> Result<Vec<Credit>, ChainError> {
        let txid = str_at(self.slug, tx, "/txid")?;
        let mut credits = Vec::new();
        for out in array_at(tx, "/vout") {
            let address = out
                .pointer("/scriptPubKey/address")
                .and_then(Value::as_str)
                .or_else(|| {
                    out.pointer("/scriptPubKey/addresses/0")
                        .and_then(Value::as_str)
                });
            let Some(address) = address else {
                continue;
            };
            let literal = match out.get("value") {
                Some(Value::Number(n)) => n.to_string(),
                Some(Value::String(s)) => s.clone(),
                _ => continue,
            };
            let amount = parse_units(&literal, self.decimals)?;
            if amount.is_zero() {
                continue;
            }
            credits.push(Credit::new(self.slug, txid, address, amount)?);
        }
        Ok(credits)
    }

    async fn bitcoind_block(&self, height: u64) -> Result<ChainBlock, ChainError> {
        let hash = self.router.call("getblockhash", json!([height])).await?;
        let block = self.router.call("getblock", json!([hash, 2])).await?;
        let time = unix_seconds(u64_at(self.slug, &block, "/time")? as i64);

        let mut credits = Vec::new();
        for tx in array_at(&block, "/tx") {
            credits.extend(self.bitcoind_credits(tx)?);
        }

        Ok(ChainBlock {
            height,
            time,
            credits,
        })
    }

    async fn bitcoind_transaction(&self, tx_hash: &str) -> Result<TxLookup, ChainError> {
        let tx = match self
            .router
            .call("getrawtransaction", json!([tx_hash, true]))
            .await
        {
            Ok(tx) => tx,
            Err(RpcError::Rpc {
                code: RPC_INVALID_ADDRESS_OR_KEY,
                ..
            }) => return Ok(TxLookup::NotFound),
            Err(e) => return Err(e.into()),
        };

        let Some(block_hash) = tx.get("blockhash").and_then(Value::as_str) else {
            return Ok(TxLookup::Pending);
        };
        let header = self
            .router
            .call("getblockheader", json!([block_hash, true]))
            .await?;

        Ok(TxLookup::Confirmed(ConfirmedTx {
            tx_hash: tx_hash.to_string(),
            height: u64_at(self.slug, &header, "/height")?,
            time: unix_seconds(u64_at(self.slug, &header, "/time")? as i64),
            credits: self.bitcoind_credits(&tx)?,
        }))
    }
}

#[async_trait]
impl ChainAdapter for UtxoAdapter {
    fn slug(&self) -> ChainSlug {
        self.slug
    }

    async fn tip(&self) -> Result<u64, ChainError> {
        let value = match self.dialect {
            UtxoDialect::Esplora => self.router.get("blocks/tip/height").await?,
            UtxoDialect::Bitcoind => self.router.call("getblockcount", json!([])).await?,
        };
        flex_u64(&value).ok_or_else(|| ChainError::malformed(self.slug, "tip height"))
    }

    async fn block(&self, height: u64) -> Result<ChainBlock, ChainError> {
        match self.dialect {
            UtxoDialect::Esplora => self.esplora_block(height).await,
            UtxoDialect::Bitcoind => self.bitcoind_block(height).await,
        }
    }

    async fn transaction(&self, tx_hash: &str) -> Result<TxLookup, ChainError> {
        match self.dialect {
            UtxoDialect::Esplora => self.esplora_transaction(tx_hash).await,
            UtxoDialect::Bitcoind => self.bitcoind_transaction(tx_hash).await,
        }
    }
}
