use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Canonical identifier for every supported chain. Persisted rows always use
/// the `as_str` form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ChainSlug {
    Eth,
    Arb,
    Avax,
    Op,
    Pol,
    Bsc,
    Btc,
    Ltc,
    Doge,
    Xrp,
    Xlm,
    Sol,
    Trx,
    Dot,
    Atom,
}

/// Vendor and historical spellings folded onto the canonical slug.
const ALIASES: &[(&str, ChainSlug)] = &[
    ("ethereum", ChainSlug::Eth),
    ("mainnet", ChainSlug::Eth),
    ("arbitrum", ChainSlug::Arb),
    ("arbitrum-one", ChainSlug::Arb),
    ("avalanche", ChainSlug::Avax),
    ("avax-c", ChainSlug::Avax),
    ("optimism", ChainSlug::Op),
    ("polygon", ChainSlug::Pol),
    ("matic", ChainSlug::Pol),
    ("bnb", ChainSlug::Bsc),
    ("binance", ChainSlug::Bsc),
    ("bsc-mainnet", ChainSlug::Bsc),
    ("bitcoin", ChainSlug::Btc),
    ("litecoin", ChainSlug::Ltc),
    ("dogecoin", ChainSlug::Doge),
    ("ripple", ChainSlug::Xrp),
    ("stellar", ChainSlug::Xlm),
    ("solana", ChainSlug::Sol),
    ("tron", ChainSlug::Trx),
    ("polkadot", ChainSlug::Dot),
    ("cosmos", ChainSlug::Atom),
    ("cosmoshub", ChainSlug::Atom),
];

impl ChainSlug {
    pub const ALL: [ChainSlug; 15] = [
        ChainSlug::Eth,
        ChainSlug::Arb,
        ChainSlug::Avax,
        ChainSlug::Op,
        ChainSlug::Pol,
        ChainSlug::Bsc,
        ChainSlug::Btc,
        ChainSlug::Ltc,
        ChainSlug::Doge,
        ChainSlug::Xrp,
        ChainSlug::Xlm,
        ChainSlug::Sol,
        ChainSlug::Trx,
        ChainSlug::Dot,
        ChainSlug::Atom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChainSlug::Eth => "eth",
            ChainSlug::Arb => "arb",
            ChainSlug::Avax => "avax",
            ChainSlug::Op => "op",
            ChainSlug::Pol => "pol",
            ChainSlug::Bsc => "bsc",
            ChainSlug::Btc => "btc",
            ChainSlug::Ltc => "ltc",
            ChainSlug::Doge => "doge",
            ChainSlug::Xrp => "xrp",
            ChainSlug::Xlm => "xlm",
            ChainSlug::Sol => "sol",
            ChainSlug::Trx => "trx",
            ChainSlug::Dot => "dot",
            ChainSlug::Atom => "atom",
        }
    }
}

impl fmt::Display for ChainSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when neither the canonical table nor the alias table knows a name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown chain '{0}'")]
pub struct UnknownChain(pub String);

impl FromStr for ChainSlug {
    type Err = UnknownChain;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        if let Some(slug) = ChainSlug::ALL.iter().find(|c| c.as_str() == needle) {
            return Ok(*slug);
        }
        ALIASES
            .iter()
            .find(|(alias, _)| *alias == needle)
            .map(|(_, slug)| *slug)
            .ok_or_else(|| UnknownChain(s.to_string()))
    }
}

impl TryFrom<String> for ChainSlug {
    type Error = UnknownChain;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ChainSlug> for String {
    fn from(slug: ChainSlug) -> Self {
        slug.as_str().to_string()
    }
}
