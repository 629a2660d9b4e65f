use bigdecimal::BigDecimal;
use secrecy::SecretString;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::time::Duration;

use crate::adapter::{AdapterOptions, UtxoDialect};
use crate::chain::{ChainProfile, ChainSlug};
use crate::ingest::ScannerSettings;
use crate::rpc::{AuthStrategy, RouterConfig};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub scanner: ScannerConfig,
    #[serde(default)]
    pub claims: ClaimsConfig,
    #[serde(default)]
    pub pricing: PricingConfig,
    pub chains: Vec<ChainConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

fn default_true() -> bool {
    true
}

// ============================================================
// Chain Config
// ============================================================

#[derive(Debug, Deserialize, Clone)]
pub struct ChainConfig {
    /// Canonical slug or alias (`bitcoin`, `matic`, ...).
    pub chain: String,
    pub endpoints: Vec<String>,
    /// Name of the environment variable holding the provider credential.
    pub api_key_env: Option<String>,
    /// Auth strategy override, e.g. `["header:TRON-PRO-API-KEY", "anonymous"]`.
    pub auth: Option<Vec<String>>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_extra_passes")]
    pub extra_passes: u32,
    pub min_confirmations: Option<u64>,
    pub overlap_blocks: Option<u64>,
    pub max_blocks_per_run: Option<u64>,
    pub initial_lookback_blocks: Option<u64>,
    #[serde(default)]
    pub utxo_dialect: UtxoDialect,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_timeout_secs() -> u64 {
    15
}

fn default_extra_passes() -> u32 {
    2
}

impl ChainConfig {
    pub fn slug(&self) -> eyre::Result<ChainSlug> {
        self.chain
            .parse()
            .map_err(|e| eyre::eyre!("Invalid chain '{}': {}", self.chain, e))
    }

    /// Built-in profile with this table's overrides applied.
    pub fn profile(&self) -> eyre::Result<ChainProfile> {
        let mut profile = ChainProfile::builtin(self.slug()?);
        if let Some(v) = self.min_confirmations {
            profile.min_confirmations = v;
        }
        if let Some(v) = self.overlap_blocks {
            profile.overlap_blocks = v;
        }
        if let Some(v) = self.max_blocks_per_run {
            profile.max_blocks_per_run = v;
        }
        if let Some(v) = self.initial_lookback_blocks {
            profile.initial_lookback_blocks = v;
        }
        Ok(profile)
    }

    /// Empty means the router's default order.
    pub fn auth_strategies(&self) -> eyre::Result<Vec<AuthStrategy>> {
        self.auth
            .iter()
            .flatten()
            .map(|raw| raw.parse::<AuthStrategy>().map_err(|e| eyre::eyre!(e)))
            .collect()
    }

    /// Credential read from the configured environment variable, if set.
    pub fn credential(&self) -> Option<SecretString> {
        let var = self.api_key_env.as_ref()?;
        match std::env::var(var) {
            Ok(value) if !value.trim().is_empty() => Some(SecretString::from(value.trim().to_string())),
            _ => {
                tracing::warn!(chain = %self.chain, env = %var, "Credential variable not set, using anonymous access");
                None
            }
        }
    }

    pub fn router_config(&self) -> RouterConfig {
        RouterConfig {
            timeout: Duration::from_secs(self.timeout_secs),
            extra_passes: self.extra_passes,
            ..RouterConfig::default()
        }
    }
}

// ============================================================
// Scanner / Claims / Pricing Config
// ============================================================

#[derive(Debug, Deserialize, Clone)]
pub struct ScannerConfig {
    #[serde(default = "default_batch_blocks")]
    pub batch_blocks: u64,
    #[serde(default = "default_fetch_concurrency")]
    pub fetch_concurrency: usize,
    /// Wall-clock budget per run; 0 disables the budget.
    #[serde(default = "default_run_budget_secs")]
    pub run_budget_secs: u64,
    #[serde(default = "default_receipt_throttle_ms")]
    pub receipt_throttle_ms: u64,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            batch_blocks: default_batch_blocks(),
            fetch_concurrency: default_fetch_concurrency(),
            run_budget_secs: default_run_budget_secs(),
            receipt_throttle_ms: default_receipt_throttle_ms(),
        }
    }
}

fn default_batch_blocks() -> u64 {
    25
}

fn default_fetch_concurrency() -> usize {
    4
}

fn default_run_budget_secs() -> u64 {
    300
}

fn default_receipt_throttle_ms() -> u64 {
    50
}

impl ScannerConfig {
    pub fn settings(&self) -> ScannerSettings {
        ScannerSettings {
            batch_blocks: self.batch_blocks,
            fetch_concurrency: self.fetch_concurrency,
            run_budget: (self.run_budget_secs > 0).then(|| Duration::from_secs(self.run_budget_secs)),
        }
    }

    pub fn adapter_options(&self, utxo_dialect: UtxoDialect) -> AdapterOptions {
        AdapterOptions {
            utxo_dialect,
            receipt_throttle: Duration::from_millis(self.receipt_throttle_ms),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ClaimsConfig {
    #[serde(default = "default_max_note_len")]
    pub max_note_len: usize,
}

impl Default for ClaimsConfig {
    fn default() -> Self {
        Self {
            max_note_len: default_max_note_len(),
        }
    }
}

fn default_max_note_len() -> usize {
    280
}

#[derive(Debug, Deserialize, Clone)]
pub struct PricingConfig {
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
    /// Symbol -> USD price as a decimal string.
    #[serde(default)]
    pub static_usd: HashMap<String, String>,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: default_cache_ttl_secs(),
            cache_capacity: default_cache_capacity(),
            static_usd: HashMap::new(),
        }
    }
}

fn default_cache_ttl_secs() -> u64 {
    300
}

fn default_cache_capacity() -> usize {
    256
}

impl PricingConfig {
    pub fn static_prices(&self) -> eyre::Result<HashMap<String, BigDecimal>> {
        self.static_usd
            .iter()
            .map(|(symbol, raw)| {
                BigDecimal::from_str(raw.trim())
                    .map(|price| (symbol.clone(), price))
                    .map_err(|e| eyre::eyre!("Invalid USD price '{}' for {}: {}", raw, symbol, e))
            })
            .collect()
    }
}

// ============================================================
// API Config
// ============================================================

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_api_port")]
    pub port: u16,
    #[serde(default = "default_api_host")]
    pub host: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: default_api_port(),
            host: default_api_host(),
        }
    }
}

fn default_api_port() -> u16 {
    3000
}

fn default_api_host() -> String {
    "0.0.0.0".to_string()
}

impl Config {
    /// Read, parse and validate. `DATABASE_URL` overrides `[database].url`.
    pub fn load(path: &str) -> eyre::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| eyre::eyre!("Failed to read config file '{}': {}", path, e))?;
        let mut config = Self::parse(&content)
            .map_err(|e| eyre::eyre!("Failed to parse config file '{}': {}", path, e))?;
        if let Ok(url) = std::env::var("DATABASE_URL") {
            if !url.is_empty() {
                config.database.url = url;
            }
        }
        config.validate()?;
        Ok(config)
    }

    pub fn parse(content: &str) -> eyre::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Enabled chain tables only.
    pub fn enabled_chains(&self) -> impl Iterator<Item = &ChainConfig> {
        self.chains.iter().filter(|c| c.enabled)
    }

    pub fn validate(&self) -> eyre::Result<()> {
        if self.enabled_chains().next().is_none() {
            return Err(eyre::eyre!("At least one chain must be configured"));
        }

        let mut seen = HashSet::new();
        for chain in &self.chains {
            let slug = chain.slug()?;
            if !seen.insert(slug) {
                return Err(eyre::eyre!("Chain '{}' is configured more than once", slug));
            }
            if chain.endpoints.is_empty() {
                return Err(eyre::eyre!("Chain '{}' must have at least one endpoint", slug));
            }
            for endpoint in &chain.endpoints {
                if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
                    return Err(eyre::eyre!(
                        "Invalid endpoint '{}' for chain '{}'",
                        endpoint,
                        slug
                    ));
                }
            }
            chain
                .auth_strategies()
                .map_err(|e| eyre::eyre!("Chain '{}': {}", slug, e))?;
            if chain.timeout_secs == 0 {
                return Err(eyre::eyre!("Chain '{}': timeout_secs must be positive", slug));
            }
            if chain.max_blocks_per_run == Some(0) {
                return Err(eyre::eyre!("Chain '{}': max_blocks_per_run must be positive", slug));
            }
        }

        if self.scanner.batch_blocks == 0 || self.scanner.fetch_concurrency == 0 {
            return Err(eyre::eyre!(
                "scanner.batch_blocks and scanner.fetch_concurrency must be positive"
            ));
        }
        self.pricing.static_prices()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = r#"
[database]
url = "postgres://localhost/test"
max_connections = 5

[[chains]]
chain = "bitcoin"
endpoints = ["https://blockstream.info/api", "https://mempool.space/api/"]

[[chains]]
chain = "trx"
endpoints = ["https://api.trongrid.io"]
api_key_env = "TRON_API_KEY"
auth = ["header:TRON-PRO-API-KEY", "anonymous"]
min_confirmations = 20
"#;

    #[test]
    fn test_parse_config() {
        let config = Config::parse(BASE).unwrap();
        config.validate().unwrap();

        assert_eq!(config.chains.len(), 2);
        assert_eq!(config.chains[0].slug().unwrap(), ChainSlug::Btc);
        assert_eq!(config.chains[0].timeout_secs, 15); // default
        assert_eq!(config.chains[0].utxo_dialect, UtxoDialect::Esplora); // default
        assert_eq!(config.scanner.batch_blocks, 25); // default
        assert_eq!(config.claims.max_note_len, 280); // default
        assert!(config.api.enabled);

        let trx = &config.chains[1];
        assert_eq!(trx.profile().unwrap().min_confirmations, 20);
        assert_eq!(
            trx.auth_strategies().unwrap(),
            vec![
                AuthStrategy::Header("TRON-PRO-API-KEY".to_string()),
                AuthStrategy::Anonymous
            ]
        );
    }

    #[test]
    fn test_validate_empty_chains() {
        let config = Config::parse("chains = []\n[database]\nurl = \"postgres://x\"\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_duplicate_alias() {
        let toml_str = format!(
            "{}\n[[chains]]\nchain = \"btc\"\nendpoints = [\"https://other\"]\n",
            BASE
        );
        let config = Config::parse(&toml_str).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_bad_endpoint_and_auth() {
        let mut config = Config::parse(BASE).unwrap();
        config.chains[0].endpoints = vec!["ws://node".to_string()];
        assert!(config.validate().is_err());

        let mut config = Config::parse(BASE).unwrap();
        config.chains[1].auth = Some(vec!["cookie".to_string()]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_static_prices() {
        let mut config = Config::parse(BASE).unwrap();
        config.pricing.static_usd.insert("BTC".to_string(), "65000.5".to_string());
        let prices = config.pricing.static_prices().unwrap();
        assert_eq!(prices["BTC"], BigDecimal::from_str("65000.5").unwrap());

        config.pricing.static_usd.insert("ETH".to_string(), "lots".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_run_budget_zero_disables() {
        let scanner = ScannerConfig {
            run_budget_secs: 0,
            ..ScannerConfig::default()
        };
        assert_eq!(scanner.settings().run_budget, None);
    }
}
