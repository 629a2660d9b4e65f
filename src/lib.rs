//! Multi-chain contribution indexer and claim verifier for project-owned
//! donation addresses.

pub mod adapter;
pub mod amount;
pub mod api;
pub mod chain;
pub mod claim;
pub mod config;
pub mod error;
pub mod ingest;
pub mod pricing;
pub mod rpc;
pub mod store;
pub mod wallets;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
