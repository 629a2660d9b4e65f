use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

use super::{
    ContributionRow, ContributionStore, CursorRow, CursorStore, InsertOutcome, NewContribution,
    WalletRow, WalletSource,
};
use crate::chain::ChainSlug;
use crate::error::StoreError;

#[derive(Default)]
struct Inner {
    wallets: BTreeMap<String, WalletRow>,
    contributions: Vec<ContributionRow>,
    cursors: HashMap<ChainSlug, CursorRow>,
    rejected_wallet: Option<String>,
}

impl Inner {
    fn validate(&self, new: &NewContribution) -> Result<(), StoreError> {
        match &self.rejected_wallet {
            Some(wallet) if *wallet == new.wallet_id => Err(StoreError::Query(format!(
                "insert for wallet {} rejected",
                wallet
            ))),
            _ => Ok(()),
        }
    }

    fn insert(&mut self, new: &NewContribution) -> InsertOutcome {
        if self
            .contributions
            .iter()
            .any(|c| c.tx_hash == new.tx_hash && c.wallet_id == new.wallet_id)
        {
            return InsertOutcome::Conflict;
        }

        let id = self.contributions.len() as i64 + 1;
        self.contributions.push(ContributionRow {
            id,
            chain: new.chain.to_string(),
            wallet_id: new.wallet_id.clone(),
            tx_hash: new.tx_hash.clone(),
            amount: new.amount.clone(),
            amount_usd: None,
            block_height: new.block_height as i64,
            block_time: new.block_time,
            note: new.note.clone(),
            source: new.source.as_str().to_string(),
        });
        InsertOutcome::Inserted(id)
    }
}

/// In-process store with the same uniqueness and monotonicity rules as
/// [`super::PgStore`]. Used for dry runs and tests.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    failing: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn with_wallets(wallets: Vec<WalletRow>) -> Self {
        let store = Self::new();
        {
            let mut inner = store.inner.lock().await;
            for wallet in wallets {
                inner.wallets.insert(wallet.wallet_id.clone(), wallet);
            }
        }
        store
    }

    /// Make every subsequent call fail with a connection error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Relaxed);
    }

    /// Make inserts for `wallet_id` fail, as a constraint or disk error would.
    pub async fn reject_inserts_for(&self, wallet_id: Option<&str>) {
        self.inner.lock().await.rejected_wallet = wallet_id.map(str::to_string);
    }

    pub async fn contributions(&self) -> Vec<ContributionRow> {
        self.inner.lock().await.contributions.clone()
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::Relaxed) {
            return Err(StoreError::Connection("store unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl WalletSource for MemoryStore {
    async fn active_wallets(&self) -> Result<Vec<WalletRow>, StoreError> {
        self.check()?;
        let inner = self.inner.lock().await;
        Ok(inner.wallets.values().filter(|w| w.is_active).cloned().collect())
    }

    async fn upsert_wallet(&self, wallet: &WalletRow) -> Result<(), StoreError> {
        self.check()?;
        let mut inner = self.inner.lock().await;
        let clash = inner.wallets.values().any(|w| {
            w.wallet_id != wallet.wallet_id && w.chain == wallet.chain && w.address == wallet.address
        });
        if clash {
            return Err(StoreError::Query(format!(
                "address {} already registered on {}",
                wallet.address, wallet.chain
            )));
        }
        inner.wallets.insert(wallet.wallet_id.clone(), wallet.clone());
        Ok(())
    }
}

#[async_trait]
impl CursorStore for MemoryStore {
    async fn cursor(&self, chain: ChainSlug) -> Result<Option<u64>, StoreError> {
        self.check()?;
        let inner = self.inner.lock().await;
        Ok(inner.cursors.get(&chain).map(|c| c.last_scanned_height))
    }

    async fn advance_cursor(&self, chain: ChainSlug, height: u64) -> Result<u64, StoreError> {
        self.check()?;
        let mut inner = self.inner.lock().await;
        let row = inner.cursors.entry(chain).or_insert_with(|| CursorRow {
            chain: chain.to_string(),
            last_scanned_height: height,
            updated_at: Utc::now(),
        });
        row.last_scanned_height = row.last_scanned_height.max(height);
        row.updated_at = Utc::now();
        Ok(row.last_scanned_height)
    }

    async fn rewind_cursor(&self, chain: ChainSlug, height: u64) -> Result<(), StoreError> {
        self.check()?;
        let mut inner = self.inner.lock().await;
        inner.cursors.insert(
            chain,
            CursorRow {
                chain: chain.to_string(),
                last_scanned_height: height,
                updated_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn list_cursors(&self) -> Result<Vec<CursorRow>, StoreError> {
        self.check()?;
        let inner = self.inner.lock().await;
        let mut rows: Vec<CursorRow> = inner.cursors.values().cloned().collect();
        rows.sort_by(|a, b| a.chain.cmp(&b.chain));
        Ok(rows)
    }
}

#[async_trait]
impl ContributionStore for MemoryStore {
    async fn contribution_exists(
        &self,
        chain: ChainSlug,
        tx_hash: &str,
        wallet_id: Option<&str>,
    ) -> Result<bool, StoreError> {
        self.check()?;
        let inner = self.inner.lock().await;
        Ok(inner.contributions.iter().any(|c| {
            c.chain == chain.as_str()
                && c.tx_hash == tx_hash
                && wallet_id.map_or(true, |w| c.wallet_id == w)
        }))
    }

    async fn insert_contribution(
        &self,
        new: &NewContribution,
    ) -> Result<InsertOutcome, StoreError> {
        self.check()?;
        let mut inner = self.inner.lock().await;
        inner.validate(new)?;
        Ok(inner.insert(new))
    }

    async fn insert_contributions(
        &self,
        rows: &[NewContribution],
    ) -> Result<Vec<InsertOutcome>, StoreError> {
        self.check()?;
        let mut inner = self.inner.lock().await;
        for row in rows {
            inner.validate(row)?;
        }
        Ok(rows.iter().map(|row| inner.insert(row)).collect())
    }

    async fn attach_usd(&self, id: i64, amount_usd: &BigDecimal) -> Result<bool, StoreError> {
        self.check()?;
        let mut inner = self.inner.lock().await;
        match inner
            .contributions
            .iter_mut()
            .find(|c| c.id == id && c.amount_usd.is_none())
        {
            Some(row) => {
                row.amount_usd = Some(amount_usd.clone());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn attach_note(
        &self,
        chain: ChainSlug,
        tx_hash: &str,
        note: &str,
    ) -> Result<bool, StoreError> {
        self.check()?;
        let mut inner = self.inner.lock().await;
        let mut changed = false;
        for row in inner
            .contributions
            .iter_mut()
            .filter(|c| c.chain == chain.as_str() && c.tx_hash == tx_hash && c.note.is_none())
        {
            row.note = Some(note.to_string());
            changed = true;
        }
        Ok(changed)
    }

    async fn contributions_for_tx(
        &self,
        chain: ChainSlug,
        tx_hash: &str,
    ) -> Result<Vec<ContributionRow>, StoreError> {
        self.check()?;
        let inner = self.inner.lock().await;
        Ok(inner
            .contributions
            .iter()
            .filter(|c| c.chain == chain.as_str() && c.tx_hash == tx_hash)
            .cloned()
            .collect())
    }
}
