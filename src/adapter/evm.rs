use alloy::consensus::Transaction as _;
use alloy::network::{
    AnyRpcBlock, AnyRpcTransaction, AnyTransactionReceipt, ReceiptResponse, TransactionResponse,
};
use alloy::primitives::U64;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::time::Duration;

use super::value::unix_seconds;
use super::{ChainAdapter, ChainBlock, ConfirmedTx, Credit, TxLookup};
use crate::chain::ChainSlug;
use crate::error::ChainError;
use crate::rpc::RpcRouter;

/// EIP-155 chain id each EVM slug must report.
pub fn expected_chain_id(slug: ChainSlug) -> Option<u64> {
    match slug {
        ChainSlug::Eth => Some(1),
        ChainSlug::Arb => Some(42_161),
        ChainSlug::Avax => Some(43_114),
        ChainSlug::Op => Some(10),
        ChainSlug::Pol => Some(137),
        ChainSlug::Bsc => Some(56),
        _ => None,
    }
}

/// Native-coin transfers on EVM chains via standard JSON-RPC.
///
/// Responses decode into alloy's network-agnostic RPC types, so L2
/// transaction types alloy does not know (deposits and the like) still
/// parse through the unknown envelope.
pub struct EvmAdapter {
    slug: ChainSlug,
    router: RpcRouter,
    receipt_throttle: Duration,
}

impl EvmAdapter {
    pub fn new(slug: ChainSlug, router: RpcRouter, receipt_throttle: Duration) -> Self {
        Self {
            slug,
            router,
            receipt_throttle,
        }
    }

    async fn request<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, ChainError> {
        let result = self.router.call(method, params).await?;
        serde_json::from_value(result)
            .map_err(|e| ChainError::malformed(self.slug, format!("{}: {}", method, e)))
    }

    pub async fn chain_id(&self) -> Result<u64, ChainError> {
        let id: U64 = self.request("eth_chainId", json!([])).await?;
        Ok(id.to::<u64>())
    }

    async fn block_by_number(&self, height: u64, full: bool) -> Result<AnyRpcBlock, ChainError> {
        let block: Option<AnyRpcBlock> = self
            .request("eth_getBlockByNumber", json!([format!("0x{:x}", height), full]))
            .await?;
        block.ok_or_else(|| ChainError::malformed(self.slug, format!("block {} not available", height)))
    }

    /// Credit for a transaction, if it moves value to an address.
    fn credit_of(&self, tx: &AnyRpcTransaction) -> Result<Option<Credit>, ChainError> {
        // Contract creation.
        let Some(to) = tx.to() else {
            return Ok(None);
        };
        let value = tx.value();
        if value.is_zero() {
            return Ok(None);
        }
        let hash = format!("{:#x}", tx.tx_hash());
        Credit::new(self.slug, &hash, &format!("{:#x}", to), value).map(Some)
    }

    async fn receipt_succeeded(&self, tx_hash: &str) -> Result<bool, ChainError> {
        let receipt: Option<AnyTransactionReceipt> = self
            .request("eth_getTransactionReceipt", json!([tx_hash]))
            .await?;
        match receipt {
            // Pre-Byzantium receipts carry a state root, which counts as success.
            Some(receipt) => Ok(receipt.status()),
            None => {
                tracing::warn!(chain = %self.slug, tx_hash, "No receipt for mined transaction");
                Ok(false)
            }
        }
    }
}

#[async_trait]
impl ChainAdapter for EvmAdapter {
    fn slug(&self) -> ChainSlug {
        self.slug
    }

    async fn tip(&self) -> Result<u64, ChainError> {
        let tip: U64 = self.request("eth_blockNumber", json!([])).await?;
        Ok(tip.to::<u64>())
    }

    async fn block(&self, height: u64) -> Result<ChainBlock, ChainError> {
        let block = self.block_by_number(height, true).await?;

        let time = unix_seconds(block.header.timestamp as i64);
        let mut credits = Vec::new();
        for tx in block.transactions.txns() {
            if let Some(credit) = self.credit_of(tx)? {
                credits.push(credit);
            }
        }

        Ok(ChainBlock {
            height,
            time,
            credits,
        })
    }

    async fn transaction(&self, tx_hash: &str) -> Result<TxLookup, ChainError> {
        let tx: Option<AnyRpcTransaction> = self
            .request("eth_getTransactionByHash", json!([tx_hash]))
            .await?;
        let Some(tx) = tx else {
            return Ok(TxLookup::NotFound);
        };
        let Some(height) = tx.block_number() else {
            return Ok(TxLookup::Pending);
        };

        let header = self.block_by_number(height, false).await?;
        let time = unix_seconds(header.header.timestamp as i64);

        Ok(TxLookup::Confirmed(ConfirmedTx {
            tx_hash: tx_hash.to_string(),
            height,
            time,
            credits: self.credit_of(&tx)?.into_iter().collect(),
        }))
    }

    /// Keeps credits whose receipt reports status `0x1`. Receipts are fetched
    /// one transaction at a time with a pause in between.
    async fn retain_successful(&self, credits: Vec<Credit>) -> Result<Vec<Credit>, ChainError> {
        let mut kept = Vec::with_capacity(credits.len());
        let mut checked: Vec<(String, bool)> = Vec::new();

        for (i, credit) in credits.into_iter().enumerate() {
            let ok = match checked.iter().find(|(h, _)| *h == credit.tx_hash) {
                Some((_, ok)) => *ok,
                None => {
                    if i > 0 {
                        tokio::time::sleep(self.receipt_throttle).await;
                    }
                    let ok = self.receipt_succeeded(&credit.tx_hash).await?;
                    checked.push((credit.tx_hash.clone(), ok));
                    ok
                }
            };
            if ok {
                kept.push(credit);
            } else {
                tracing::info!(
                    chain = %self.slug,
                    tx_hash = %credit.tx_hash,
                    "Dropping credit from failed transaction"
                );
            }
        }

        Ok(kept)
    }

    async fn probe(&self) -> Result<(), ChainError> {
        let reported = self.chain_id().await?;
        match expected_chain_id(self.slug) {
            Some(expected) if expected != reported => Err(ChainError::malformed(
                self.slug,
                format!("endpoint reports chain id {}, expected {}", reported, expected),
            )),
            _ => Ok(()),
        }
    }
}
