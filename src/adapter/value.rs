//! Small accessors for loosely typed provider payloads.

use alloy::primitives::U256;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::amount::parse_native;
use crate::chain::ChainSlug;
use crate::error::ChainError;

/// Integer from a JSON number, a decimal string or a `0x` hex string.
pub(crate) fn flex_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => {
            let s = s.trim();
            match s.strip_prefix("0x") {
                Some(hex) => u64::from_str_radix(hex, 16).ok(),
                None => s.parse().ok(),
            }
        }
        _ => None,
    }
}

pub(crate) fn u64_at(chain: ChainSlug, value: &Value, pointer: &str) -> Result<u64, ChainError> {
    value
        .pointer(pointer)
        .and_then(flex_u64)
        .ok_or_else(|| ChainError::malformed(chain, format!("missing integer at {}", pointer)))
}

pub(crate) fn str_at<'a>(
    chain: ChainSlug,
    value: &'a Value,
    pointer: &str,
) -> Result<&'a str, ChainError> {
    value
        .pointer(pointer)
        .and_then(Value::as_str)
        .ok_or_else(|| ChainError::malformed(chain, format!("missing string at {}", pointer)))
}

pub(crate) fn array_at<'a>(value: &'a Value, pointer: &str) -> &'a [Value] {
    value
        .pointer(pointer)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Native amount from a JSON number or string (decimal or hex).
pub(crate) fn native_amount(chain: ChainSlug, value: &Value) -> Result<U256, ChainError> {
    let raw = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return Err(ChainError::malformed(chain, "amount is not a number")),
    };
    Ok(parse_native(&raw)?)
}

pub(crate) fn unix_seconds(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}

pub(crate) fn unix_millis(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}

pub(crate) fn rfc3339(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_default()
}
