//! Chains with their own native transaction models, one dialect each.

mod cosmos;
mod solana;
mod stellar;
mod substrate;
mod tron;
mod xrpl;

use async_trait::async_trait;

use super::{ChainAdapter, ChainBlock, TxLookup};
use crate::chain::{AccountDialect, ChainSlug};
use crate::error::ChainError;
use crate::rpc::RpcRouter;

pub struct AccountAdapter {
    slug: ChainSlug,
    dialect: AccountDialect,
    router: RpcRouter,
    decimals: u8,
}

impl AccountAdapter {
    pub fn new(slug: ChainSlug, dialect: AccountDialect, router: RpcRouter, decimals: u8) -> Self {
        Self {
            slug,
            dialect,
            router,
            decimals,
        }
    }

    pub fn dialect(&self) -> AccountDialect {
        self.dialect
    }

    fn malformed(&self, detail: impl Into<String>) -> ChainError {
        ChainError::malformed(self.slug, detail)
    }
}

#[async_trait]
impl ChainAdapter for AccountAdapter {
    fn slug(&self) -> ChainSlug {
        self.slug
    }

    async fn tip(&self) -> Result<u64, ChainError> {
        match self.dialect {
            AccountDialect::Xrpl => xrpl::tip(self).await,
            AccountDialect::Stellar => stellar::tip(self).await,
            AccountDialect::Solana => solana::tip(self).await,
            AccountDialect::Tron => tron::tip(self).await,
            AccountDialect::Substrate => substrate::tip(self).await,
            AccountDialect::Cosmos => cosmos::tip(self).await,
        }
    }

    async fn block(&self, height: u64) -> Result<ChainBlock, ChainError> {
        match self.dialect {
            AccountDialect::Xrpl => xrpl::block(self, height).await,
            AccountDialect::Stellar => stellar::block(self, height).await,
            AccountDialect::Solana => solana::block(self, height).await,
            AccountDialect::Tron => tron::block(self, height).await,
            AccountDialect::Substrate => substrate::block(self, height).await,
            AccountDialect::Cosmos => cosmos::block(self, height).await,
        }
    }

    async fn transaction(&self, tx_hash: &str) -> Result<TxLookup, ChainError> {
        match self.dialect {
            AccountDialect::Xrpl => xrpl::transaction(self, tx_hash).await,
            AccountDialect::Stellar => stellar::transaction(self, tx_hash).await,
            AccountDialect::Solana => solana::transaction(self, tx_hash).await,
            AccountDialect::Tron => tron::transaction(self, tx_hash).await,
            AccountDialect::Substrate => substrate::transaction(self, tx_hash).await,
            AccountDialect::Cosmos => cosmos::transaction(self, tx_hash).await,
        }
    }
}
