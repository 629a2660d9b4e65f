use clap::{Parser, Subcommand};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use donation_indexer::api::{self, AppState};
use donation_indexer::chain::{ChainSlug, UnknownChain};
use donation_indexer::config::Config;
use donation_indexer::ingest::{Engine, ScanOptions};
use donation_indexer::pricing::{CachedPricing, PricingPort, StaticPricing};
use donation_indexer::store::{PgStore, Store};
use donation_indexer::wallets::{read_wallet_csv, seed_wallets};

#[derive(Debug, Parser)]
#[command(
    name = "donation-indexer",
    version,
    about = "Multi-chain contribution indexer and claim verifier"
)]
struct Args {
    /// TOML configuration file.
    #[arg(long, env = "CONFIG_PATH", default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, PartialEq, Eq, Subcommand)]
#[command(rename_all = "kebab-case")]
enum Command {
    /// Run the trigger API until Ctrl+C (default).
    Serve,
    /// Scan one chain, or every enabled chain with `all`.
    Ingest { target: IngestTarget },
    /// Verify one transaction and record it if it paid a project wallet.
    Claim {
        chain: String,
        tx: String,
        /// Optional note; remaining words are joined with spaces.
        #[arg(trailing_var_arg = true)]
        note: Vec<String>,
    },
    /// Upsert wallets from a CSV file.
    SeedWallets { path: String },
    /// Set a chain's cursor, including backwards.
    Rewind { chain: ChainSlug, height: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IngestTarget {
    All,
    Chain(ChainSlug),
}

impl FromStr for IngestTarget {
    type Err = UnknownChain;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("all") {
            Ok(IngestTarget::All)
        } else {
            s.parse().map(IngestTarget::Chain)
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}

/// Cancel `token` on Ctrl+C.
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received");
            token.cancel();
        }
    });
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    init_logging();

    let args = Args::parse();
    let command = args.command.unwrap_or(Command::Serve);

    let config = Config::load(&args.config)?;
    tracing::info!(
        chains = config.enabled_chains().count(),
        "Configuration loaded from {}",
        args.config
    );

    let pg = PgStore::connect(&config.database.url, config.database.max_connections)
        .await
        .map_err(|e| eyre::eyre!("Failed to connect to database: {}", e))?;
    tracing::info!("Connected to PostgreSQL");

    pg.migrate()
        .await
        .map_err(|e| eyre::eyre!("Failed to run migrations: {}", e))?;
    tracing::info!("Database migrations complete");

    let store: Arc<dyn Store> = Arc::new(pg);

    match &command {
        Command::SeedWallets { path } => {
            let rows = read_wallet_csv(path)?;
            seed_wallets(store.as_ref(), &rows).await?;
            return Ok(());
        }
        Command::Rewind { chain, height } => {
            store.rewind_cursor(*chain, *height).await?;
            tracing::info!(chain = %chain, height, "Cursor rewound");
            return Ok(());
        }
        _ => {}
    }

    let prices = StaticPricing::new(config.pricing.static_prices()?);
    let pricing: Arc<dyn PricingPort> = Arc::new(CachedPricing::new(
        Arc::new(prices),
        Duration::from_secs(config.pricing.cache_ttl_secs),
        config.pricing.cache_capacity,
    ));
    let engine = Arc::new(Engine::from_config(&config, store, pricing)?);

    let shutdown = CancellationToken::new();
    cancel_on_ctrl_c(shutdown.clone());

    match command {
        Command::Serve => serve(&config, engine, shutdown).await,
        Command::Ingest { target } => ingest(&engine, target, &shutdown).await,
        Command::Claim { chain, tx, note } => {
            let note = (!note.is_empty()).then(|| note.join(" "));
            let response = engine.claims().respond(&chain, &tx, note.as_deref()).await;
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }
        Command::SeedWallets { .. } | Command::Rewind { .. } => Ok(()),
    }
}

async fn serve(config: &Config, engine: Arc<Engine>, shutdown: CancellationToken) -> eyre::Result<()> {
    if !config.api.enabled {
        return Err(eyre::eyre!("[api] is disabled; nothing to serve"));
    }
    engine.probe_all().await;

    let state = Arc::new(AppState {
        engine,
        shutdown: shutdown.clone(),
    });
    let host = config.api.host.clone();
    let port = config.api.port;
    let handle = tokio::spawn(async move {
        if let Err(e) = api::serve(state, &host, port).await {
            tracing::error!(error = %e, "API server failed");
        }
    });

    tracing::info!("Trigger API started. Press Ctrl+C to stop.");
    shutdown.cancelled().await;
    join_api(handle).await;

    tracing::info!("Donation indexer stopped gracefully");
    Ok(())
}

/// Wait for the API task; a panic is logged rather than dropped.
async fn join_api(handle: JoinHandle<()>) -> bool {
    match handle.await {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(error = %e, "API task ended abnormally");
            false
        }
    }
}

async fn ingest(
    engine: &Engine,
    target: IngestTarget,
    shutdown: &CancellationToken,
) -> eyre::Result<()> {
    let options = ScanOptions::default();
    let results = match target {
        IngestTarget::Chain(chain) => {
            vec![(chain, engine.run_ingestion(chain, &options, shutdown).await)]
        }
        IngestTarget::All => engine.run_all(&options, shutdown).await,
    };

    let mut failed = 0;
    for (chain, result) in results {
        match result {
            Ok(report) => println!("{}", serde_json::to_string_pretty(&report)?),
            Err(e) => {
                failed += 1;
                tracing::error!(chain = %chain, error = %e, "Ingestion failed");
            }
        }
    }
    if failed > 0 {
        return Err(eyre::eyre!("{} chain(s) failed to ingest", failed));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(raw: &[&str]) -> Result<Args, clap::Error> {
        Args::try_parse_from(std::iter::once("donation-indexer").chain(raw.iter().copied()))
    }

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse(&[]).unwrap().command, None);
        assert_eq!(parse(&["serve"]).unwrap().command, Some(Command::Serve));
        assert_eq!(
            parse(&["ingest", "bitcoin"]).unwrap().command,
            Some(Command::Ingest {
                target: IngestTarget::Chain(ChainSlug::Btc)
            })
        );
        assert_eq!(
            parse(&["ingest", "all"]).unwrap().command,
            Some(Command::Ingest {
                target: IngestTarget::All
            })
        );
        assert_eq!(
            parse(&["claim", "eth", "0xabc", "thanks", "team"]).unwrap().command,
            Some(Command::Claim {
                chain: "eth".to_string(),
                tx: "0xabc".to_string(),
                note: vec!["thanks".to_string(), "team".to_string()],
            })
        );
        assert_eq!(
            parse(&["rewind", "sol", "250000000"]).unwrap().command,
            Some(Command::Rewind {
                chain: ChainSlug::Sol,
                height: 250_000_000
            })
        );
        assert_eq!(
            parse(&["--config", "prod.toml", "seed-wallets", "wallets.csv"])
                .unwrap()
                .config,
            "prod.toml"
        );
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(parse(&["ingest", "dogechain-classic"]).is_err());
        assert!(parse(&["rewind", "btc", "-1"]).is_err());
        assert!(parse(&["frobnicate"]).is_err());
    }

    #[tokio::test]
    async fn test_join_api_reports_panics() {
        assert!(join_api(tokio::spawn(async {})).await);
        assert!(!join_api(tokio::spawn(async { panic!("listener crashed") })).await);
    }
}
