//! USD valuation port used after a contribution is recorded.

pub mod cache;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use std::collections::HashMap;

pub use cache::{CacheStats, CachedPricing, TtlCache};

#[async_trait]
pub trait PricingPort: Send + Sync {
    /// Current USD price for one whole unit of `symbol`, if known.
    async fn usd_price(&self, symbol: &str) -> Option<BigDecimal>;
}

/// Fixed prices, typically from the `[pricing]` config section.
#[derive(Debug, Clone, Default)]
pub struct StaticPricing {
    prices: HashMap<String, BigDecimal>,
}

impl StaticPricing {
    pub fn new(prices: HashMap<String, BigDecimal>) -> Self {
        Self {
            prices: prices
                .into_iter()
                .map(|(symbol, price)| (symbol.to_ascii_uppercase(), price))
                .collect(),
        }
    }
}

#[async_trait]
impl PricingPort for StaticPricing {
    async fn usd_price(&self, symbol: &str) -> Option<BigDecimal> {
        self.prices.get(&symbol.to_ascii_uppercase()).cloned()
    }
}

/// Port that never knows a price; valuation is left to the external job.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPricing;

#[async_trait]
impl PricingPort for NoPricing {
    async fn usd_price(&self, _symbol: &str) -> Option<BigDecimal> {
        None
    }
}
