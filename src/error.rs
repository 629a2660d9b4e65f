use thiserror::Error;

use crate::chain::ChainSlug;

/// Failures surfaced by the RPC fallback router.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RpcError {
    /// Every endpoint and auth variant failed at the transport level, after all backoff passes.
    #[error("{chain}: no healthy endpoint after {attempts} attempts (last error: {last_error})")]
    Unavailable {
        chain: ChainSlug,
        attempts: u32,
        last_error: String,
    },
    /// A provider answered with a JSON-RPC error object.
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },
    /// A REST provider answered 404 for the requested resource.
    #[error("resource not found")]
    NotFound,
    /// The response could not be interpreted.
    #[error("malformed response: {0}")]
    Decode(String),
    #[error("invalid endpoint '{0}'")]
    InvalidEndpoint(String),
}

/// Failures raised by chain adapters.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChainError {
    #[error(transparent)]
    Rpc(#[from] RpcError),
    #[error("{chain}: unexpected payload: {detail}")]
    Malformed { chain: ChainSlug, detail: String },
    #[error(transparent)]
    Amount(#[from] AmountError),
}

impl ChainError {
    pub fn malformed(chain: ChainSlug, detail: impl Into<String>) -> Self {
        ChainError::Malformed {
            chain,
            detail: detail.into(),
        }
    }

    /// True when the failure is an infrastructure problem rather than a bad payload.
    pub fn is_transient(&self) -> bool {
        matches!(self, ChainError::Rpc(RpcError::Unavailable { .. }))
    }
}

/// Failures raised by the persistent store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("database connection error: {0}")]
    Connection(String),
    #[error("database query error: {0}")]
    Query(String),
    #[error("migration error: {0}")]
    Migration(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Connection(err.to_string())
            }
            sqlx::Error::Migrate(e) => StoreError::Migration(e.to_string()),
            other => StoreError::Query(other.to_string()),
        }
    }
}

/// Failures converting between native integers and decimal strings.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AmountError {
    #[error("'{0}' is not a decimal amount")]
    NotDecimal(String),
    #[error("negative amount '{0}'")]
    Negative(String),
    #[error("'{value}' has more than {exponent} fractional digits")]
    TooPrecise { value: String, exponent: u8 },
    #[error("'{0}' does not fit in 256 bits")]
    Overflow(String),
}

/// Failures that abort a scanner run.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("chain '{0}' is not configured")]
    NotConfigured(ChainSlug),
    #[error("a scan for {0} is already in flight")]
    AlreadyRunning(ChainSlug),
    #[error(transparent)]
    Chain(#[from] ChainError),
    #[error(transparent)]
    Store(#[from] StoreError),
}
