//! Solana JSON-RPC at `finalized` commitment; credits are positive lamport
//! balance deltas.

use alloy::primitives::U256;
use serde_json::{json, Value};

use super::AccountAdapter;
use crate::adapter::value::{array_at, flex_u64, unix_seconds};
use crate::adapter::{ChainBlock, ConfirmedTx, Credit, TxLookup};
use crate::error::{ChainError, RpcError};

/// Slot was skipped or is missing from long-term storage.
const SKIPPED_SLOT_CODES: [i64; 3] = [-32007, -32009, -32004];

pub(super) async fn tip(a: &AccountAdapter) -> Result<u64, ChainError> {
    let slot = a
        .router
        .call("getSlot", json!([{"commitment": "finalized"}]))
        .await?;
    flex_u64(&slot).ok_or_else(|| a.malformed("getSlot"))
}

pub(super) async fn block(a: &AccountAdapter, height: u64) -> Result<ChainBlock, ChainError> {
    let params = json!([height, {
        "encoding": "json",
        "transactionDetails": "full",
        "rewards": false,
        "commitment": "finalized",
        "maxSupportedTransactionVersion": 0
    }]);
    let block = match a.router.call("getBlock", params).await {
        Ok(block) => block,
        Err(RpcError::Rpc { code, .. }) if SKIPPED_SLOT_CODES.contains(&code) => {
            tracing::debug!(chain = %a.slug, slot = height, "Skipped slot");
            return Ok(ChainBlock::empty(height));
        }
        Err(e) => return Err(e.into()),
    };
    if block.is_null() {
        return Ok(ChainBlock::empty(height));
    }

    let time = block
        .get("blockTime")
        .and_then(Value::as_i64)
        .map(unix_seconds)
        .unwrap_or_default();

    let mut credits = Vec::new();
    for entry in array_at(&block, "/transactions") {
        credits.extend(balance_credits(a, entry)?);
    }

    Ok(ChainBlock {
        height,
        time,
        credits,
    })
}

pub(super) async fn transaction(a: &AccountAdapter, tx_hash: &str) -> Result<TxLookup, ChainError> {
    let params = json!([tx_hash, {
        "encoding": "json",
        "commitment": "finalized",
        "maxSupportedTransactionVersion": 0
    }]);
    let tx = a.router.call("getTransaction", params).await?;

    if tx.is_null() {
        // Not finalized yet, or unknown: ask the status cache which one.
        let statuses = a
            .router
            .call(
                "getSignatureStatuses",
                json!([[tx_hash], {"searchTransactionHistory": true}]),
            )
            .await?;
        return Ok(match statuses.pointer("/value/0") {
            Some(Value::Null) | None => TxLookup::NotFound,
            Some(_) => TxLookup::Pending,
        });
    }

    let height = tx
        .get("slot")
        .and_then(flex_u64)
        .ok_or_else(|| a.malformed("transaction without slot"))?;
    let time = tx
        .get("blockTime")
        .and_then(Value::as_i64)
        .map(unix_seconds)
        .unwrap_or_default();

    Ok(TxLookup::Confirmed(ConfirmedTx {
        tx_hash: tx_hash.to_string(),
        height,
        time,
        credits: balance_credits(a, &tx)?,
    }))
}

/// Accounts whose lamport balance grew in a successful transaction.
fn balance_credits(a: &AccountAdapter, entry: &Value) -> Result<Vec<Credit>, ChainError> {
    let meta = entry.get("meta").unwrap_or(&Value::Null);
    if meta.is_null() || !meta.get("err").map(Value::is_null).unwrap_or(true) {
        return Ok(Vec::new());
    }
    let Some(signature) = entry
        .pointer("/transaction/signatures/0")
        .and_then(Value::as_str)
    else {
        return Err(a.malformed("transaction without signature"));
    };

    // Static keys first, then address-table lookups in writable/readonly order.
    let keys: Vec<&str> = array_at(entry, "/transaction/message/accountKeys")
        .iter()
        .chain(array_at(meta, "/loadedAddresses/writable"))
        .chain(array_at(meta, "/loadedAddresses/readonly"))
        .filter_map(|k| k.as_str().or_else(|| k.get("pubkey").and_then(Value::as_str)))
        .collect();
    let pre = array_at(meta, "/preBalances");
    let post = array_at(meta, "/postBalances");

    let mut credits = Vec::new();
    for (i, key) in keys.iter().enumerate() {
        let (Some(before), Some(after)) = (
            pre.get(i).and_then(Value::as_u64),
            post.get(i).and_then(Value::as_u64),
        ) else {
            continue;
        };
        if after > before {
            credits.push(Credit::new(a.slug, signature, key, U256::from(after - before))?);
        }
    }
    Ok(credits)
}
