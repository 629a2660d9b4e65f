use futures::future::join_all;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use super::{IngestionReport, Recorder, ScanOptions, Scanner, ScannerSettings};
use crate::adapter::{build_adapter, ChainAdapter};
use crate::chain::{ChainProfile, ChainSlug};
use crate::claim::ClaimVerifier;
use crate::config::Config;
use crate::error::ScanError;
use crate::pricing::PricingPort;
use crate::rpc::RpcRouter;
use crate::store::Store;

/// Everything needed to talk to one enabled chain.
#[derive(Clone)]
pub struct ChainRuntime {
    pub profile: ChainProfile,
    pub adapter: Arc<dyn ChainAdapter>,
}

/// Owns the configured chains and serializes scans per chain.
pub struct Engine {
    chains: Arc<BTreeMap<ChainSlug, ChainRuntime>>,
    store: Arc<dyn Store>,
    recorder: Arc<Recorder>,
    settings: ScannerSettings,
    locks: HashMap<ChainSlug, Arc<Mutex<()>>>,
    claims: ClaimVerifier,
}

impl Engine {
    pub fn new(
        runtimes: Vec<ChainRuntime>,
        store: Arc<dyn Store>,
        pricing: Arc<dyn PricingPort>,
        settings: ScannerSettings,
        max_note_len: usize,
    ) -> Self {
        let chains: BTreeMap<ChainSlug, ChainRuntime> = runtimes
            .into_iter()
            .map(|runtime| (runtime.profile.slug, runtime))
            .collect();
        let chains = Arc::new(chains);
        let locks = chains
            .keys()
            .map(|slug| (*slug, Arc::new(Mutex::new(()))))
            .collect();
        let recorder = Arc::new(Recorder::new(store.clone(), pricing));
        let claims = ClaimVerifier::new(chains.clone(), store.clone(), recorder.clone(), max_note_len);

        Self {
            chains,
            store,
            recorder,
            settings,
            locks,
            claims,
        }
    }

    /// Build routers and adapters for every enabled chain in `config`.
    pub fn from_config(
        config: &Config,
        store: Arc<dyn Store>,
        pricing: Arc<dyn PricingPort>,
    ) -> eyre::Result<Self> {
        let mut runtimes = Vec::new();
        for chain in config.enabled_chains() {
            let profile = chain.profile()?;
            let router = RpcRouter::new(
                profile.slug,
                chain.endpoints.clone(),
                chain.credential(),
                chain.auth_strategies()?,
                chain.router_config(),
            )
            .map_err(|e| eyre::eyre!("Failed to build router for {}: {}", profile.slug, e))?;
            let options = config.scanner.adapter_options(chain.utxo_dialect);
            let adapter = build_adapter(&profile, router, &options);

            tracing::info!(
                chain = %profile.slug,
                endpoints = chain.endpoints.len(),
                confirmations = profile.min_confirmations,
                "Chain configured"
            );
            runtimes.push(ChainRuntime { profile, adapter });
        }

        Ok(Self::new(
            runtimes,
            store,
            pricing,
            config.scanner.settings(),
            config.claims.max_note_len,
        ))
    }

    pub fn chains(&self) -> Vec<ChainSlug> {
        self.chains.keys().copied().collect()
    }

    pub fn runtime(&self, chain: ChainSlug) -> Option<&ChainRuntime> {
        self.chains.get(&chain)
    }

    pub fn claims(&self) -> &ClaimVerifier {
        &self.claims
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// True while a scan for `chain` holds its lock.
    pub fn is_running(&self, chain: ChainSlug) -> bool {
        self.locks
            .get(&chain)
            .is_some_and(|lock| lock.try_lock().is_err())
    }

    /// Run one scan for `chain`. A second call while one is in flight is
    /// rejected rather than queued.
    pub async fn run_ingestion(
        &self,
        chain: ChainSlug,
        options: &ScanOptions,
        cancel: &CancellationToken,
    ) -> Result<IngestionReport, ScanError> {
        let runtime = self
            .chains
            .get(&chain)
            .ok_or(ScanError::NotConfigured(chain))?;
        let lock = self
            .locks
            .get(&chain)
            .ok_or(ScanError::NotConfigured(chain))?;
        let _guard = lock
            .clone()
            .try_lock_owned()
            .map_err(|_| ScanError::AlreadyRunning(chain))?;

        let scanner = Scanner::new(
            runtime.profile.clone(),
            runtime.adapter.clone(),
            self.store.clone(),
            self.recorder.clone(),
            self.settings.clone(),
        );
        scanner.run(options, cancel).await
    }

    /// Scan every configured chain concurrently.
    pub async fn run_all(
        &self,
        options: &ScanOptions,
        cancel: &CancellationToken,
    ) -> Vec<(ChainSlug, Result<IngestionReport, ScanError>)> {
        let runs = self
            .chains
            .keys()
            .map(|&chain| async move { (chain, self.run_ingestion(chain, options, cancel).await) });
        join_all(runs).await
    }

    /// Startup sanity check; failures are logged, not fatal.
    pub async fn probe_all(&self) {
        for (slug, runtime) in self.chains.iter() {
            match runtime.adapter.probe().await {
                Ok(()) => tracing::info!(chain = %slug, "Provider probe ok"),
                Err(e) => tracing::warn!(chain = %slug, error = %e, "Provider probe failed"),
            }
        }
    }
}
