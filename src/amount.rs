//! Native integer units <-> decimal amounts.
//!
//! All conversions work on decimal digit strings of the native integer, never
//! on floats, so a value read from a chain is stored exactly.

use alloy::primitives::U256;
use bigdecimal::BigDecimal;
use std::str::FromStr;

use crate::error::AmountError;

/// Render `native / 10^exponent` as a canonical decimal string: no exponent
/// notation, no trailing fractional zeros, no trailing dot.
pub fn normalize(native: U256, exponent: u8) -> String {
    let digits = native.to_string();
    let e = exponent as usize;
    if e == 0 {
        return digits;
    }

    let (whole, frac) = if digits.len() > e {
        let split = digits.len() - e;
        (digits[..split].to_string(), digits[split..].to_string())
    } else {
        ("0".to_string(), format!("{}{}", "0".repeat(e - digits.len()), digits))
    };

    let frac = frac.trim_end_matches('0');
    if frac.is_empty() {
        whole
    } else {
        format!("{}.{}", whole, frac)
    }
}

/// Same value as [`normalize`], as a `BigDecimal` for NUMERIC columns.
pub fn to_decimal(native: U256, exponent: u8) -> Result<BigDecimal, AmountError> {
    let rendered = normalize(native, exponent);
    BigDecimal::from_str(&rendered).map_err(|_| AmountError::NotDecimal(rendered))
}

/// Parse a provider-reported decimal amount back into native units.
///
/// Accepts plain and exponent notation (`"1.5"`, `"1e-8"`), rejects negative
/// values and values with more precision than the chain's exponent.
pub fn parse_units(value: &str, exponent: u8) -> Result<U256, AmountError> {
    let trimmed = value.trim();
    let parsed =
        BigDecimal::from_str(trimmed).map_err(|_| AmountError::NotDecimal(trimmed.to_string()))?;
    if parsed < BigDecimal::from(0) {
        return Err(AmountError::Negative(trimmed.to_string()));
    }

    let scaled = parsed * BigDecimal::from(10u64.pow(u32::from(exponent.min(19))));
    let scaled = if exponent > 19 {
        scaled * BigDecimal::from(10u64.pow(u32::from(exponent - 19)))
    } else {
        scaled
    };

    if !scaled.is_integer() {
        return Err(AmountError::TooPrecise {
            value: trimmed.to_string(),
            exponent,
        });
    }

    let (integer, _) = scaled.with_scale(0).into_bigint_and_exponent();
    U256::from_str(&integer.to_string()).map_err(|_| AmountError::Overflow(trimmed.to_string()))
}

/// Parse a non-negative native integer as reported by providers, in decimal or
/// `0x` hex.
pub fn parse_native(value: &str) -> Result<U256, AmountError> {
    let trimmed = value.trim();
    let parsed = match trimmed.strip_prefix("0x") {
        Some(hex) if hex.is_empty() => Ok(U256::ZERO),
        Some(hex) => U256::from_str_radix(hex, 16),
        None => U256::from_str_radix(trimmed, 10),
    };
    parsed.map_err(|_| AmountError::NotDecimal(trimmed.to_string()))
}
