//! Chain catalogue: canonical slugs, per-chain profiles and identifier rules.

pub mod address;
pub mod profile;
pub mod slug;
pub mod txid;

pub use address::{canonical_address, is_plausible_address};
pub use profile::{AccountDialect, ChainFamily, ChainProfile};
pub use slug::{ChainSlug, UnknownChain};
pub use txid::{canonical_tx_hash, TxIdError};
