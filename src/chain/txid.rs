use super::ChainSlug;

/// Why a user-supplied transaction identifier was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TxIdError {
    #[error("transaction id is empty")]
    Empty,
    #[error("expected 64 hex characters, got '{0}'")]
    NotHex64(String),
    #[error("expected a base58 signature of 43-88 characters, got '{0}'")]
    NotBase58Signature(String),
}

/// Validate and canonicalize a transaction identifier for `slug`.
///
/// Both the claim path and every adapter route hashes through here, so a
/// transaction found by the scanner and the same transaction pasted by a user
/// land on the same contribution key.
pub fn canonical_tx_hash(slug: ChainSlug, raw: &str) -> Result<String, TxIdError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(TxIdError::Empty);
    }

    if slug == ChainSlug::Sol {
        let len_ok = (43..=88).contains(&trimmed.len());
        let decoded = bs58::decode(trimmed).into_vec();
        return match decoded {
            Ok(bytes) if len_ok && bytes.len() == 64 => Ok(trimmed.to_string()),
            _ => Err(TxIdError::NotBase58Signature(trimmed.to_string())),
        };
    }

    let body = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    if body.len() != 64 || hex::decode(body).is_err() {
        return Err(TxIdError::NotHex64(trimmed.to_string()));
    }

    let canonical = match slug {
        ChainSlug::Eth
        | ChainSlug::Arb
        | ChainSlug::Avax
        | ChainSlug::Op
        | ChainSlug::Pol
        | ChainSlug::Bsc
        | ChainSlug::Dot => format!("0x{}", body.to_ascii_lowercase()),
        ChainSlug::Xrp | ChainSlug::Atom => body.to_ascii_uppercase(),
        ChainSlug::Btc
        | ChainSlug::Ltc
        | ChainSlug::Doge
        | ChainSlug::Xlm
        | ChainSlug::Trx
        | ChainSlug::Sol => body.to_ascii_lowercase(),
    };
    Ok(canonical)
}
