use std::collections::HashMap;
use std::io::Read;

use crate::chain::{canonical_address, is_plausible_address, ChainSlug};
use crate::error::StoreError;
use crate::store::{WalletRow, WalletSource};

/// Canonical chain -> canonical address -> wallet id, for active wallets only.
#[derive(Debug, Clone, Default)]
pub struct WalletDirectory {
    by_chain: HashMap<ChainSlug, HashMap<String, String>>,
}

impl WalletDirectory {
    pub async fn load<S: WalletSource + ?Sized>(source: &S) -> Result<Self, StoreError> {
        let rows = source.active_wallets().await?;
        Ok(Self::from_rows(rows))
    }

    pub fn from_rows(rows: impl IntoIterator<Item = WalletRow>) -> Self {
        let mut by_chain: HashMap<ChainSlug, HashMap<String, String>> = HashMap::new();

        for row in rows {
            if !row.is_active {
                continue;
            }
            let slug = match row.chain.parse::<ChainSlug>() {
                Ok(slug) => slug,
                Err(e) => {
                    tracing::warn!(wallet_id = %row.wallet_id, error = %e, "Skipping wallet with unknown chain");
                    continue;
                }
            };
            let address = canonical_address(slug, &row.address);
            if let Some(previous) = by_chain
                .entry(slug)
                .or_default()
                .insert(address.clone(), row.wallet_id.clone())
            {
                tracing::warn!(
                    chain = %slug,
                    address = %address,
                    kept = %row.wallet_id,
                    dropped = %previous,
                    "Address registered under two wallet ids"
                );
            }
        }

        Self { by_chain }
    }

    /// Address -> wallet id map for one chain (empty when none are registered).
    pub fn for_chain(&self, slug: ChainSlug) -> HashMap<String, String> {
        self.by_chain.get(&slug).cloned().unwrap_or_default()
    }

    pub fn wallet_for(&self, slug: ChainSlug, address: &str) -> Option<&str> {
        self.by_chain
            .get(&slug)
            .and_then(|m| m.get(&canonical_address(slug, address)))
            .map(String::as_str)
    }

    pub fn chains(&self) -> Vec<ChainSlug> {
        let mut chains: Vec<ChainSlug> = self.by_chain.keys().copied().collect();
        chains.sort();
        chains
    }

    pub fn len(&self) -> usize {
        self.by_chain.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================
// CSV seeding
// ============================================================

/// Parse `chain,address,wallet_id[,is_active[,label]]` rows (with header).
/// Chains are folded to their canonical slug and addresses canonicalized.
pub fn parse_wallet_csv<R: Read>(reader: R) -> eyre::Result<Vec<WalletRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut rows = Vec::new();
    for (line, result) in reader.records().enumerate() {
        let record = result?;
        let line = line + 2;
        let chain = record.get(0).unwrap_or("");
        let address = record.get(1).unwrap_or("");
        let wallet_id = record.get(2).unwrap_or("");

        if chain.is_empty() || address.is_empty() || wallet_id.is_empty() {
            return Err(eyre::eyre!("line {}: chain, address and wallet_id are required", line));
        }
        let slug: ChainSlug = chain
            .parse()
            .map_err(|e| eyre::eyre!("line {}: {}", line, e))?;
        if !is_plausible_address(slug, address) {
            return Err(eyre::eyre!("line {}: '{}' is not a valid {} address", line, address, slug));
        }
        let is_active = match record.get(3).unwrap_or("") {
            "" => true,
            raw => parse_bool(raw).ok_or_else(|| eyre::eyre!("line {}: bad is_active '{}'", line, raw))?,
        };
        let label = record.get(4).filter(|l| !l.is_empty()).map(str::to_string);

        rows.push(WalletRow {
            wallet_id: wallet_id.to_string(),
            chain: slug.to_string(),
            address: canonical_address(slug, address),
            label,
            is_active,
        });
    }
    Ok(rows)
}

pub fn read_wallet_csv(path: &str) -> eyre::Result<Vec<WalletRow>> {
    let file = std::fs::File::open(path)
        .map_err(|e| eyre::eyre!("Failed to open wallet CSV '{}': {}", path, e))?;
    parse_wallet_csv(file)
}

pub async fn seed_wallets<S: WalletSource + ?Sized>(source: &S, rows: &[WalletRow]) -> eyre::Result<usize> {
    for row in rows {
        source.upsert_wallet(row).await?;
    }
    tracing::info!(count = rows.len(), "Wallets seeded");
    Ok(rows.len())
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "t" | "1" | "yes" | "y" => Some(true),
        "false" | "f" | "0" | "no" | "n" => Some(false),
        _ => None,
    }
}
