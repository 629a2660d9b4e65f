//! TRON full-node HTTP API with base58 (`visible`) addresses.

use serde_json::{json, Value};

use super::AccountAdapter;
use crate::adapter::value::{array_at, native_amount, u64_at, unix_millis};
use crate::adapter::{ChainBlock, ConfirmedTx, Credit, TxLookup};
use crate::error::ChainError;

pub(super) async fn tip(a: &AccountAdapter) -> Result<u64, ChainError> {
    let block = a.router.post("wallet/getnowblock", json!({"visible": true})).await?;
    u64_at(a.slug, &block, "/block_header/raw_data/number")
}

pub(super) async fn block(a: &AccountAdapter, height: u64) -> Result<ChainBlock, ChainError> {
    let block = a
        .router
        .post("wallet/getblockbynum", json!({"num": height, "visible": true}))
        .await?;
    let Some(header) = block.pointer("/block_header/raw_data") else {
        return Err(a.malformed(format!("block {} not available", height)));
    };
    let time = header
        .get("timestamp")
        .and_then(Value::as_i64)
        .map(unix_millis)
        .unwrap_or_default();

    let mut credits = Vec::new();
    for tx in array_at(&block, "/transactions") {
        credits.extend(transfer_credits(a, tx)?);
    }

    Ok(ChainBlock {
        height,
        time,
        credits,
    })
}

pub(super) async fn transaction(a: &AccountAdapter, tx_hash: &str) -> Result<TxLookup, ChainError> {
    let tx = a
        .router
        .post("wallet/gettransactionbyid", json!({"value": tx_hash, "visible": true}))
        .await?;
    if is_empty_object(&tx) {
        return Ok(TxLookup::NotFound);
    }

    let info = a
        .router
        .post("wallet/gettransactioninfobyid", json!({"value": tx_hash}))
        .await?;
    if is_empty_object(&info) || info.get("blockNumber").is_none() {
        return Ok(TxLookup::Pending);
    }

    Ok(TxLookup::Confirmed(ConfirmedTx {
        tx_hash: tx_hash.to_string(),
        height: u64_at(a.slug, &info, "/blockNumber")?,
        time: info
            .get("blockTimeStamp")
            .and_then(Value::as_i64)
            .map(unix_millis)
            .unwrap_or_default(),
        credits: transfer_credits(a, &tx)?,
    }))
}

/// Native TRX `TransferContract` calls that executed with `SUCCESS`.
fn transfer_credits(a: &AccountAdapter, tx: &Value) -> Result<Vec<Credit>, ChainError> {
    let succeeded = array_at(tx, "/ret")
        .first()
        .and_then(|r| r.get("contractRet"))
        .and_then(Value::as_str)
        == Some("SUCCESS");
    if !succeeded {
        return Ok(Vec::new());
    }
    let Some(tx_id) = tx.get("txID").and_then(Value::as_str) else {
        return Err(a.malformed("transaction without txID"));
    };

    let mut credits = Vec::new();
    for contract in array_at(tx, "/raw_data/contract") {
        if contract.get("type").and_then(Value::as_str) != Some("TransferContract") {
            continue;
        }
        let Some(params) = contract.pointer("/parameter/value") else {
            continue;
        };
        let (Some(to), Some(amount)) = (
            params.get("to_address").and_then(Value::as_str),
            params.get("amount"),
        ) else {
            continue;
        };
        let amount = native_amount(a.slug, amount)?;
        if !amount.is_zero() {
            credits.push(Credit::new(a.slug, tx_id, to, amount)?);
        }
    }
    Ok(credits)
}

fn is_empty_object(value: &Value) -> bool {
    match value {
        Value::Object(map) => map.is_empty(),
        Value::Null => true,
        _ => false,
    }
}
