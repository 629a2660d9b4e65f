//! XRP Ledger JSON-RPC (`ledger`, `tx`).

use serde_json::{json, Value};

use super::AccountAdapter;
use crate::adapter::value::{array_at, flex_u64, native_amount, unix_seconds};
use crate::adapter::{ChainBlock, ConfirmedTx, Credit, TxLookup};
use crate::error::ChainError;

/// Seconds between the Unix epoch and the Ripple epoch (2000-01-01).
const RIPPLE_EPOCH_OFFSET: i64 = 946_684_800;

pub(super) async fn tip(a: &AccountAdapter) -> Result<u64, ChainError> {
    let result = a
        .router
        .call("ledger", json!([{"ledger_index": "validated"}]))
        .await?;
    result
        .get("ledger_index")
        .and_then(flex_u64)
        .or_else(|| result.pointer("/ledger/ledger_index").and_then(flex_u64))
        .ok_or_else(|| a.malformed("ledger_index"))
}

pub(super) async fn block(a: &AccountAdapter, height: u64) -> Result<ChainBlock, ChainError> {
    let result = a
        .router
        .call(
            "ledger",
            json!([{"ledger_index": height, "transactions": true, "expand": true}]),
        )
        .await?;
    if let Some(error) = result.get("error").and_then(Value::as_str) {
        return Err(a.malformed(format!("ledger {}: {}", height, error)));
    }

    let ledger = result
        .get("ledger")
        .ok_or_else(|| a.malformed("ledger body missing"))?;
    let time = ledger
        .get("close_time")
        .and_then(flex_u64)
        .map(|t| unix_seconds(t as i64 + RIPPLE_EPOCH_OFFSET))
        .unwrap_or_default();

    let mut credits = Vec::new();
    for entry in array_at(ledger, "/transactions") {
        if let Some(credit) = payment_credit(a, entry)? {
            credits.push(credit);
        }
    }

    Ok(ChainBlock {
        height,
        time,
        credits,
    })
}

pub(super) async fn transaction(a: &AccountAdapter, tx_hash: &str) -> Result<TxLookup, ChainError> {
    let result = a
        .router
        .call("tx", json!([{"transaction": tx_hash, "binary": false}]))
        .await?;
    if let Some(error) = result.get("error").and_then(Value::as_str) {
        return match error {
            "txnNotFound" => Ok(TxLookup::NotFound),
            other => Err(a.malformed(format!("tx: {}", other))),
        };
    }
    if !result.get("validated").and_then(Value::as_bool).unwrap_or(false) {
        return Ok(TxLookup::Pending);
    }

    let height = result
        .get("ledger_index")
        .and_then(flex_u64)
        .ok_or_else(|| a.malformed("validated tx without ledger_index"))?;
    let body = result.get("tx_json").unwrap_or(&result);
    let time = body
        .get("date")
        .or_else(|| result.get("date"))
        .and_then(flex_u64)
        .map(|t| unix_seconds(t as i64 + RIPPLE_EPOCH_OFFSET))
        .unwrap_or_default();

    Ok(TxLookup::Confirmed(ConfirmedTx {
        tx_hash: tx_hash.to_string(),
        height,
        time,
        credits: payment_credit(a, &result)?.into_iter().collect(),
    }))
}

/// Successful native XRP `Payment`, credited with `delivered_amount` so partial
/// payments are counted at what actually arrived.
fn payment_credit(a: &AccountAdapter, entry: &Value) -> Result<Option<Credit>, ChainError> {
    let body = entry.get("tx_json").unwrap_or(entry);
    let meta = entry
        .get("meta")
        .or_else(|| entry.get("metaData"))
        .unwrap_or(&Value::Null);

    if body.get("TransactionType").and_then(Value::as_str) != Some("Payment") {
        return Ok(None);
    }
    if meta.get("TransactionResult").and_then(Value::as_str) != Some("tesSUCCESS") {
        return Ok(None);
    }
    // Issued-currency amounts are objects; only drops strings are native XRP.
    let delivered = match meta.get("delivered_amount").or_else(|| body.get("Amount")) {
        Some(v @ Value::String(_)) => native_amount(a.slug, v)?,
        _ => return Ok(None),
    };
    if delivered.is_zero() {
        return Ok(None);
    }

    let (Some(hash), Some(to)) = (
        entry
            .get("hash")
            .or_else(|| body.get("hash"))
            .and_then(Value::as_str),
        body.get("Destination").and_then(Value::as_str),
    ) else {
        return Err(a.malformed("payment without hash or Destination"));
    };

    Credit::new(a.slug, hash, to, delivered).map(Some)
}
