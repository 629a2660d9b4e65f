//! Cosmos SDK LCD (REST gateway); `MsgSend`/`MsgMultiSend` in the staking denom.

use serde_json::Value;

use super::AccountAdapter;
use crate::adapter::value::{array_at, flex_u64, rfc3339, str_at, u64_at};
use crate::adapter::{ChainBlock, ConfirmedTx, Credit, TxLookup};
use crate::amount::parse_native;
use crate::error::{ChainError, RpcError};

const STAKING_DENOM: &str = "uatom";
const PAGE_LIMIT: usize = 100;

const MSG_SEND: &str = "/cosmos.bank.v1beta1.MsgSend";
const MSG_MULTI_SEND: &str = "/cosmos.bank.v1beta1.MsgMultiSend";

pub(super) async fn tip(a: &AccountAdapter) -> Result<u64, ChainError> {
    let latest = a
        .router
        .get("cosmos/base/tendermint/v1beta1/blocks/latest")
        .await?;
    u64_at(a.slug, &latest, "/block/header/height")
        .or_else(|_| u64_at(a.slug, &latest, "/sdk_block/header/height"))
}

pub(super) async fn block(a: &AccountAdapter, height: u64) -> Result<ChainBlock, ChainError> {
    let mut block = ChainBlock::empty(height);
    let mut offset = 0;
    loop {
        let page = a
            .router
            .get(&format!(
                "cosmos/tx/v1beta1/txs?query=tx.height%3D{}&pagination.limit={}&pagination.offset={}",
                height, PAGE_LIMIT, offset
            ))
            .await?;
        let responses = array_at(&page, "/tx_responses");
        for response in responses {
            if let Some(ts) = response.get("timestamp").and_then(Value::as_str) {
                block.time = rfc3339(ts);
            }
            block.credits.extend(send_credits(a, response)?);
        }
        if responses.len() < PAGE_LIMIT {
            break;
        }
        offset += PAGE_LIMIT;
    }
    Ok(block)
}

/// The LCD only knows committed transactions; there is no pending state.
pub(super) async fn transaction(a: &AccountAdapter, tx_hash: &str) -> Result<TxLookup, ChainError> {
    let found = match a.router.get(&format!("cosmos/tx/v1beta1/txs/{}", tx_hash)).await {
        Ok(found) => found,
        Err(RpcError::NotFound) => return Ok(TxLookup::NotFound),
        Err(RpcError::Rpc { message, .. }) if message.to_ascii_lowercase().contains("not found") => {
            return Ok(TxLookup::NotFound)
        }
        Err(e) => return Err(e.into()),
    };
    let response = found
        .get("tx_response")
        .ok_or_else(|| a.malformed("missing tx_response"))?;

    Ok(TxLookup::Confirmed(ConfirmedTx {
        tx_hash: tx_hash.to_string(),
        height: u64_at(a.slug, response, "/height")?,
        time: rfc3339(str_at(a.slug, response, "/timestamp")?),
        credits: send_credits(a, response)?,
    }))
}

/// Bank sends of the staking denom inside a transaction that executed with code 0.
fn send_credits(a: &AccountAdapter, response: &Value) -> Result<Vec<Credit>, ChainError> {
    if response.get("code").and_then(flex_u64).unwrap_or(0) != 0 {
        return Ok(Vec::new());
    }
    let hash = str_at(a.slug, response, "/txhash")?;

    let mut credits = Vec::new();
    for message in array_at(response, "/tx/body/messages") {
        let outputs: Vec<(&str, &[Value])> = match message.get("@type").and_then(Value::as_str) {
            Some(MSG_SEND) => message
                .get("to_address")
                .and_then(Value::as_str)
                .map(|to| vec![(to, array_at(message, "/amount"))])
                .unwrap_or_default(),
            Some(MSG_MULTI_SEND) => array_at(message, "/outputs")
                .iter()
                .filter_map(|o| {
                    o.get("address")
                        .and_then(Value::as_str)
                        .map(|to| (to, array_at(o, "/coins")))
                })
                .collect(),
            _ => continue,
        };

        for (to, coins) in outputs {
            for coin in coins {
                if coin.get("denom").and_then(Value::as_str) != Some(STAKING_DENOM) {
                    continue;
                }
                let amount = parse_native(str_at(a.slug, coin, "/amount")?)?;
                if !amount.is_zero() {
                    credits.push(Credit::new(a.slug, hash, to, amount)?);
                }
            }
        }
    }
    Ok(credits)
}
