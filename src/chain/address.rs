use alloy::primitives::Address;
use std::str::FromStr;

use super::{ChainFamily, ChainProfile, ChainSlug};

const BECH32_PREFIXES: &[&str] = &["bc1", "tb1", "ltc1", "tltc1"];

/// Canonical form used for matching chain data against the wallet directory.
///
/// Hex and bech32 encodings are case-insensitive and are lower-cased; Stellar
/// strkeys are upper-cased; base58 and SS58 encodings are case-sensitive and
/// only trimmed.
pub fn canonical_address(slug: ChainSlug, raw: &str) -> String {
    let trimmed = raw.trim();
    match ChainProfile::builtin(slug).family {
        ChainFamily::Evm => {
            let lower = trimmed.to_ascii_lowercase();
            if lower.starts_with("0x") {
                lower
            } else {
                format!("0x{}", lower)
            }
        }
        ChainFamily::Utxo => {
            let lower = trimmed.to_ascii_lowercase();
            if BECH32_PREFIXES.iter().any(|p| lower.starts_with(p)) {
                lower
            } else {
                trimmed.to_string()
            }
        }
        ChainFamily::Account(_) => match slug {
            ChainSlug::Atom => trimmed.to_ascii_lowercase(),
            ChainSlug::Xlm => trimmed.to_ascii_uppercase(),
            _ => trimmed.to_string(),
        },
    }
}

/// Shape check applied to operator-supplied wallet addresses.
pub fn is_plausible_address(slug: ChainSlug, raw: &str) -> bool {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.chars().any(char::is_whitespace) {
        return false;
    }
    match slug {
        ChainSlug::Eth
        | ChainSlug::Arb
        | ChainSlug::Avax
        | ChainSlug::Op
        | ChainSlug::Pol
        | ChainSlug::Bsc => Address::from_str(trimmed).is_ok(),
        ChainSlug::Sol => bs58::decode(trimmed)
            .into_vec()
            .map(|bytes| bytes.len() == 32)
            .unwrap_or(false),
        ChainSlug::Trx => trimmed.starts_with('T') && bs58::decode(trimmed).into_vec().is_ok(),
        ChainSlug::Xrp => trimmed.starts_with('r'),
        ChainSlug::Xlm => trimmed.len() == 56 && trimmed.to_ascii_uppercase().starts_with('G'),
        ChainSlug::Atom => trimmed.to_ascii_lowercase().starts_with("cosmos1"),
        ChainSlug::Btc | ChainSlug::Ltc | ChainSlug::Doge | ChainSlug::Dot => {
            trimmed.chars().all(|c| c.is_ascii_alphanumeric())
        }
    }
}
