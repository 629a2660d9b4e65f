use std::time::Duration;

use super::ChainSlug;

/// How a chain's adapter talks to its providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainFamily {
    Evm,
    Utxo,
    Account(AccountDialect),
}

/// Protocol spoken by chains whose transfers are neither EVM calls nor UTXO outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountDialect {
    Xrpl,
    Stellar,
    Solana,
    Tron,
    Substrate,
    Cosmos,
}

/// Per-chain tuning for the generic scan/claim engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainProfile {
    pub slug: ChainSlug,
    pub family: ChainFamily,
    /// Ticker used when asking the pricing port for a USD rate.
    pub symbol: &'static str,
    /// Decimal exponent between the native integer unit and one whole coin.
    pub decimals: u8,
    pub avg_block_interval: Duration,
    pub min_confirmations: u64,
    pub overlap_blocks: u64,
    pub max_blocks_per_run: u64,
    /// Window behind the safe tip scanned on a chain's very first run.
    pub initial_lookback_blocks: u64,
}

impl ChainProfile {
    /// Built-in defaults; operators override the tunables per chain in config.
    pub fn builtin(slug: ChainSlug) -> Self {
        use AccountDialect::*;
        use ChainFamily::*;

        // (family, symbol, decimals, block ms, confirmations, overlap, max per run)
        let (family, symbol, decimals, block_ms, confirmations, overlap, max_blocks) = match slug {
            ChainSlug::Eth => (Evm, "ETH", 18, 12_000, 12, 50, 200),
            ChainSlug::Arb => (Evm, "ETH", 18, 250, 12, 120, 1_200),
            ChainSlug::Avax => (Evm, "AVAX", 18, 2_000, 12, 100, 300),
            ChainSlug::Op => (Evm, "ETH", 18, 2_000, 12, 100, 300),
            ChainSlug::Pol => (Evm, "POL", 18, 2_000, 64, 100, 300),
            ChainSlug::Bsc => (Evm, "BNB", 18, 3_000, 15, 100, 300),
            ChainSlug::Btc => (Utxo, "BTC", 8, 600_000, 2, 3, 6),
            ChainSlug::Ltc => (Utxo, "LTC", 8, 150_000, 4, 6, 24),
            ChainSlug::Doge => (Utxo, "DOGE", 8, 60_000, 10, 10, 60),
            ChainSlug::Xrp => (Account(Xrpl), "XRP", 6, 4_000, 0, 50, 300),
            ChainSlug::Xlm => (Account(Stellar), "XLM", 7, 5_000, 0, 50, 300),
            ChainSlug::Sol => (Account(Solana), "SOL", 9, 400, 0, 50, 300),
            ChainSlug::Trx => (Account(Tron), "TRX", 6, 3_000, 19, 50, 300),
            ChainSlug::Dot => (Account(Substrate), "DOT", 10, 6_000, 0, 50, 300),
            ChainSlug::Atom => (Account(Cosmos), "ATOM", 6, 6_000, 1, 50, 300),
        };

        Self {
            slug,
            family,
            symbol,
            decimals,
            avg_block_interval: Duration::from_millis(block_ms),
            min_confirmations: confirmations,
            overlap_blocks: overlap,
            max_blocks_per_run: max_blocks,
            initial_lookback_blocks: max_blocks,
        }
    }

    /// Approximate number of blocks produced in `hours`, rounded up.
    pub fn blocks_for_hours(&self, hours: u64) -> u64 {
        let interval_ms = self.avg_block_interval.as_millis().max(1);
        let window_ms = u128::from(hours) * 3_600_000;
        let blocks = window_ms.div_ceil(interval_ms);
        u64::try_from(blocks).unwrap_or(u64::MAX)
    }

    /// Highest height considered final given a reported tip.
    pub fn safe_tip(&self, tip: u64) -> Option<u64> {
        tip.checked_sub(self.min_confirmations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponent_table() {
        assert_eq!(ChainProfile::builtin(ChainSlug::Eth).decimals, 18);
        assert_eq!(ChainProfile::builtin(ChainSlug::Bsc).decimals, 18);
        assert_eq!(ChainProfile::builtin(ChainSlug::Btc).decimals, 8);
        assert_eq!(ChainProfile::builtin(ChainSlug::Doge).decimals, 8);
        assert_eq!(ChainProfile::builtin(ChainSlug::Xrp).decimals, 6);
        assert_eq!(ChainProfile::builtin(ChainSlug::Xlm).decimals, 7);
        assert_eq!(ChainProfile::builtin(ChainSlug::Sol).decimals, 9);
        assert_eq!(ChainProfile::builtin(ChainSlug::Trx).decimals, 6);
        assert_eq!(ChainProfile::builtin(ChainSlug::Dot).decimals, 10);
        assert_eq!(ChainProfile::builtin(ChainSlug::Atom).decimals, 6);
    }

    #[test]
    fn test_families() {
        assert_eq!(ChainProfile::builtin(ChainSlug::Arb).family, ChainFamily::Evm);
        assert_eq!(ChainProfile::builtin(ChainSlug::Ltc).family, ChainFamily::Utxo);
        assert_eq!(
            ChainProfile::builtin(ChainSlug::Sol).family,
            ChainFamily::Account(AccountDialect::Solana)
        );
    }

    #[test]
    fn test_blocks_for_hours() {
        let eth = ChainProfile::builtin(ChainSlug::Eth);
        assert_eq!(eth.blocks_for_hours(1), 300);
        let btc = ChainProfile::builtin(ChainSlug::Btc);
        assert_eq!(btc.blocks_for_hours(24), 144);
        assert_eq!(btc.blocks_for_hours(0), 0);
    }

    #[test]
    fn test_safe_tip() {
        let eth = ChainProfile::builtin(ChainSlug::Eth);
        assert_eq!(eth.safe_tip(100), Some(88));
        assert_eq!(eth.safe_tip(5), None);
        let sol = ChainProfile::builtin(ChainSlug::Sol);
        assert_eq!(sol.safe_tip(42), Some(42));
    }
}
