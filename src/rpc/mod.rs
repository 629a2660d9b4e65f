//! Endpoint pool with ordered credential strategies and bounded retry.

pub mod auth;
pub mod router;

pub use auth::{AuthStrategy, API_KEY_PLACEHOLDER};
pub use router::{RouterConfig, RpcRequest, RpcRouter};
