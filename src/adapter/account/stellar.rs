//! Stellar Horizon REST.

use serde_json::Value;

use super::AccountAdapter;
use crate::adapter::value::{array_at, rfc3339, str_at, u64_at};
use crate::adapter::{ChainBlock, ConfirmedTx, Credit, TxLookup};
use crate::amount::parse_units;
use crate::error::{ChainError, RpcError};

const PAGE_LIMIT: usize = 200;

pub(super) async fn tip(a: &AccountAdapter) -> Result<u64, ChainError> {
    let page = a.router.get("ledgers?order=desc&limit=1").await?;
    u64_at(a.slug, &page, "/_embedded/records/0/sequence")
}

pub(super) async fn block(a: &AccountAdapter, height: u64) -> Result<ChainBlock, ChainError> {
    let ledger = a.router.get(&format!("ledgers/{}", height)).await?;
    let time = rfc3339(str_at(a.slug, &ledger, "/closed_at")?);

    let mut credits = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        let path = match &cursor {
            Some(c) => format!("ledgers/{}/payments?limit={}&cursor={}", height, PAGE_LIMIT, c),
            None => format!("ledgers/{}/payments?limit={}", height, PAGE_LIMIT),
        };
        let page = a.router.get(&path).await?;
        let records = array_at(&page, "/_embedded/records");
        for record in records {
            if let Some(credit) = payment_credit(a, record)? {
                credits.push(credit);
            }
        }
        if records.len() < PAGE_LIMIT {
            break;
        }
        cursor = records
            .last()
            .and_then(|r| r.get("paging_token"))
            .and_then(Value::as_str)
            .map(str::to_string);
        if cursor.is_none() {
            break;
        }
    }

    Ok(ChainBlock {
        height,
        time,
        credits,
    })
}

/// Horizon only serves transactions that closed in a ledger, so there is no
/// pending state to report.
pub(super) async fn transaction(a: &AccountAdapter, tx_hash: &str) -> Result<TxLookup, ChainError> {
    let tx = match a.router.get(&format!("transactions/{}", tx_hash)).await {
        Ok(tx) => tx,
        Err(RpcError::NotFound) => return Ok(TxLookup::NotFound),
        Err(e) => return Err(e.into()),
    };

    let height = u64_at(a.slug, &tx, "/ledger")?;
    let time = rfc3339(str_at(a.slug, &tx, "/created_at")?);

    let mut credits = Vec::new();
    if tx.get("successful").and_then(Value::as_bool).unwrap_or(false) {
        let payments = a
            .router
            .get(&format!("transactions/{}/payments?limit={}", tx_hash, PAGE_LIMIT))
            .await?;
        for record in array_at(&payments, "/_embedded/records") {
            if let Some(credit) = payment_credit(a, record)? {
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

/// Native-asset `payment` and `create_account` operations.
fn payment_credit(a: &AccountAdapter, record: &Value) -> Result<Option<Credit>, ChainError> {
    if record.get("transaction_successful").and_then(Value::as_bool) == Some(false) {
        return Ok(None);
    }
    let (to, amount) = match record.get("type").and_then(Value::as_str) {
        Some("payment")
            if record.get("asset_type").and_then(Value::as_str) == Some("native") =>
        {
            (str_at(a.slug, record, "/to")?, str_at(a.slug, record, "/amount")?)
        }
        Some("create_account") => (
            str_at(a.slug, record, "/account")?,
            str_at(a.slug, record, "/starting_balance")?,
        ),
        _ => return Ok(None),
    };

    let amount = parse_units(amount, a.decimals)?;
    if amount.is_zero() {
        return Ok(None);
    }
    let hash = str_at(a.slug, record, "/transaction_hash")?;
    Credit::new(a.slug, hash, to, amount).map(Some)
}
