//! Substrate chains through a Subscan-compatible indexer API.

use serde_json::{json, Value};

use super::AccountAdapter;
use crate::adapter::value::{array_at, flex_u64, str_at, unix_seconds};
use crate::adapter::{ChainBlock, ConfirmedTx, Credit, TxLookup};
use crate::amount::parse_units;
use crate::error::ChainError;

const PAGE_ROWS: usize = 100;

/// Unwraps the `{code, message, data}` envelope.
async fn request(a: &AccountAdapter, path: &str, body: Value) -> Result<Value, ChainError> {
    let response = a.router.post(path, body).await?;
    match response.get("code").and_then(Value::as_i64) {
        Some(0) => Ok(response.get("data").cloned().unwrap_or(Value::Null)),
        Some(code) => Err(a.malformed(format!(
            "{} returned code {}: {}",
            path,
            code,
            response
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("")
        ))),
        None => Err(a.malformed(format!("{} returned no code", path))),
    }
}

pub(super) async fn tip(a: &AccountAdapter) -> Result<u64, ChainError> {
    let data = request(a, "api/scan/metadata", json!({})).await?;
    data.get("finalized_blockNum")
        .and_then(flex_u64)
        .or_else(|| data.get("blockNum").and_then(flex_u64))
        .ok_or_else(|| a.malformed("metadata without blockNum"))
}

pub(super) async fn block(a: &AccountAdapter, height: u64) -> Result<ChainBlock, ChainError> {
    let mut block = ChainBlock::empty(height);
    let mut page = 0;
    loop {
        let data = request(
            a,
            "api/v2/scan/transfers",
            json!({
                "block_range": format!("{}-{}", height, height),
                "row": PAGE_ROWS,
                "page": page,
            }),
        )
        .await?;
        let transfers = array_at(&data, "/transfers");
        for transfer in transfers {
            if let Some(ts) = transfer.get("block_timestamp").and_then(Value::as_i64) {
                block.time = unix_seconds(ts);
            }
            let hash = str_at(a.slug, transfer, "/hash")?;
            if let Some(credit) = transfer_credit(a, transfer, hash)? {
                block.credits.push(credit);
            }
        }
        if transfers.len() < PAGE_ROWS {
            break;
        }
        page += 1;
    }
    Ok(block)
}

pub(super) async fn transaction(a: &AccountAdapter, tx_hash: &str) -> Result<TxLookup, ChainError> {
    let data = request(a, "api/scan/extrinsic", json!({"hash": tx_hash})).await?;
    if data.is_null() {
        return Ok(TxLookup::NotFound);
    }
    if data.get("finalized").and_then(Value::as_bool) == Some(false)
        || data.get("pending").and_then(Value::as_bool) == Some(true)
    {
        return Ok(TxLookup::Pending);
    }

    let height = data
        .get("block_num")
        .and_then(flex_u64)
        .ok_or_else(|| a.malformed("extrinsic without block_num"))?;
    let time = data
        .get("block_timestamp")
        .and_then(Value::as_i64)
        .map(unix_seconds)
        .unwrap_or_default();

    let mut credits = Vec::new();
    if data.get("success").and_then(Value::as_bool).unwrap_or(false) {
        let transfers = data
            .get("transfers")
            .and_then(Value::as_array)
            .cloned()
            .or_else(|| data.get("transfer").filter(|t| !t.is_null()).map(|t| vec![t.clone()]))
            .unwrap_or_default();
        for transfer in &transfers {
            if let Some(credit) = transfer_credit(a, transfer, tx_hash)? {
                credits.push(credit);
            }
        }
    }

    Ok(TxLookup::Confirmed(ConfirmedTx {
        tx_hash: tx_hash.to_string(),
        height,
        time,
        credits,
    }))
}

/// Native-token transfer, amount reported in whole-coin decimal units.
fn transfer_credit(
    a: &AccountAdapter,
    transfer: &Value,
    hash: &str,
) -> Result<Option<Credit>, ChainError> {
    if transfer.get("success").and_then(Value::as_bool) == Some(false) {
        return Ok(None);
    }
    let symbol = transfer
        .get("asset_symbol")
        .and_then(Value::as_str)
        .unwrap_or("");
    if !symbol.is_empty() && !symbol.eq_ignore_ascii_case("DOT") {
        return Ok(None);
    }

    let to = str_at(a.slug, transfer, "/to")?;
    let raw = match transfer.get("amount") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => return Err(a.malformed("transfer without amount")),
    };
    let amount = parse_units(&raw, a.decimals)?;
    if amount.is_zero() {
        return Ok(None);
    }
    Credit::new(a.slug, hash, to, amount).map(Some)
}
