use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use super::{
    ContributionRow, ContributionStore, CursorRow, CursorStore, InsertOutcome, NewContribution,
    WalletRow, WalletSource,
};
use crate::chain::ChainSlug;
use crate::error::StoreError;

const UNIQUE_VIOLATION: &str = "23505";

/// PostgreSQL-backed store. Uniqueness and cursor monotonicity are enforced
/// by the database, so any number of processes may share one instance.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Migration(e.to_string()))
    }

    pub async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn height_param(height: u64) -> Result<i64, StoreError> {
    i64::try_from(height).map_err(|_| StoreError::Query(format!("height {} out of range", height)))
}

/// `ON CONFLICT DO NOTHING` keeps a duplicate from aborting an enclosing
/// transaction.
async fn insert_row<'e, E>(executor: E, c: &NewContribution) -> Result<InsertOutcome, StoreError>
where
    E: sqlx::Executor<'e, Database = sqlx::Postgres>,
{
    let result: Result<Option<(i64,)>, sqlx::Error> = sqlx::query_as(
        "INSERT INTO contributions
            (wallet_id, chain, tx_hash, amount, block_height, block_time, note, source)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
         ON CONFLICT (tx_hash, wallet_id) DO NOTHING
         RETURNING id",
    )
    .bind(&c.wallet_id)
    .bind(c.chain.as_str())
    .bind(&c.tx_hash)
    .bind(&c.amount)
    .bind(height_param(c.block_height)?)
    .bind(c.block_time)
    .bind(&c.note)
    .bind(c.source.as_str())
    .fetch_optional(executor)
    .await;

    match result {
        Ok(Some((id,))) => Ok(InsertOutcome::Inserted(id)),
        Ok(None) => Ok(InsertOutcome::Conflict),
        Err(sqlx::Error::Database(db)) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => {
            Ok(InsertOutcome::Conflict)
        }
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl WalletSource for PgStore {
    async fn active_wallets(&self) -> Result<Vec<WalletRow>, StoreError> {
        let rows: Vec<(String, String, String, Option<String>, bool)> = sqlx::query_as(
            "SELECT id, chain, address, label, is_active FROM wallets WHERE is_active ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(wallet_id, chain, address, label, is_active)| WalletRow {
                wallet_id,
                chain,
                address,
                label,
                is_active,
            })
            .collect())
    }

    async fn upsert_wallet(&self, wallet: &WalletRow) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO wallets (id, chain, address, label, is_active)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (id) DO UPDATE
             SET chain = $2, address = $3, label = $4, is_active = $5",
        )
        .bind(&wallet.wallet_id)
        .bind(&wallet.chain)
        .bind(&wallet.address)
        .bind(&wallet.label)
        .bind(wallet.is_active)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl CursorStore for PgStore {
    async fn cursor(&self, chain: ChainSlug) -> Result<Option<u64>, StoreError> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT last_scanned_height FROM scan_cursors WHERE chain = $1")
                .bind(chain.as_str())
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(h,)| h.max(0) as u64))
    }

    async fn advance_cursor(&self, chain: ChainSlug, height: u64) -> Result<u64, StoreError> {
        let (stored,): (i64,) = sqlx::query_as(
            "INSERT INTO scan_cursors (chain, last_scanned_height, updated_at)
             VALUES ($1, $2, NOW())
             ON CONFLICT (chain) DO UPDATE
             SET last_scanned_height = GREATEST(scan_cursors.last_scanned_height, EXCLUDED.last_scanned_height),
                 updated_at = NOW()
             RETURNING last_scanned_height",
        )
        .bind(chain.as_str())
        .bind(height_param(height)?)
        .fetch_one(&self.pool)
        .await?;
        Ok(stored.max(0) as u64)
    }

    async fn rewind_cursor(&self, chain: ChainSlug, height: u64) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO scan_cursors (chain, last_scanned_height, updated_at)
             VALUES ($1, $2, NOW())
             ON CONFLICT (chain) DO UPDATE
             SET last_scanned_height = $2, updated_at = NOW()",
        )
        .bind(chain.as_str())
        .bind(height_param(height)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_cursors(&self) -> Result<Vec<CursorRow>, StoreError> {
        let rows: Vec<(String, i64, DateTime<Utc>)> = sqlx::query_as(
            "SELECT chain, last_scanned_height, updated_at FROM scan_cursors ORDER BY chain",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(chain, height, updated_at)| CursorRow {
                chain,
                last_scanned_height: height.max(0) as u64,
                updated_at,
            })
            .collect())
    }
}

type ContributionTuple = (
    i64,
    String,
    String,
    String,
    BigDecimal,
    Option<BigDecimal>,
    i64,
    DateTime<Utc>,
    Option<String>,
    String,
);

#[async_trait]
impl ContributionStore for PgStore {
    async fn contribution_exists(
        &self,
        chain: ChainSlug,
        tx_hash: &str,
        wallet_id: Option<&str>,
    ) -> Result<bool, StoreError> {
        let (exists,): (bool,) = sqlx::query_as(
            "SELECT EXISTS (
                SELECT 1 FROM contributions
                WHERE chain = $1 AND tx_hash = $2 AND ($3::TEXT IS NULL OR wallet_id = $3)
             )",
        )
        .bind(chain.as_str())
        .bind(tx_hash)
        .bind(wallet_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn insert_contribution(
        &self,
        c: &NewContribution,
    ) -> Result<InsertOutcome, StoreError> {
        insert_row(&self.pool, c).await
    }

    async fn insert_contributions(
        &self,
        rows: &[NewContribution],
    ) -> Result<Vec<InsertOutcome>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let mut outcomes = Vec::with_capacity(rows.len());
        for c in rows {
            outcomes.push(insert_row(&mut *tx, c).await?);
        }
        tx.commit().await?;
        Ok(outcomes)
    }

    async fn attach_usd(&self, id: i64, amount_usd: &BigDecimal) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE contributions SET amount_usd = $2 WHERE id = $1 AND amount_usd IS NULL",
        )
        .bind(id)
        .bind(amount_usd)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn attach_note(
        &self,
        chain: ChainSlug,
        tx_hash: &str,
        note: &str,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE contributions SET note = $3
             WHERE chain = $1 AND tx_hash = $2 AND note IS NULL",
        )
        .bind(chain.as_str())
        .bind(tx_hash)
        .bind(note)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn contributions_for_tx(
        &self,
        chain: ChainSlug,
        tx_hash: &str,
    ) -> Result<Vec<ContributionRow>, StoreError> {
        let rows: Vec<ContributionTuple> = sqlx::query_as(
            "SELECT id, chain, wallet_id, tx_hash, amount, amount_usd, block_height,
                    block_time, note, source
             FROM contributions WHERE chain = $1 AND tx_hash = $2 ORDER BY id",
        )
        .bind(chain.as_str())
        .bind(tx_hash)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(
                |(id, chain, wallet_id, tx_hash, amount, amount_usd, block_height, block_time, note, source)| {
                    ContributionRow {
                        id,
                        chain,
                        wallet_id,
                        tx_hash,
                        amount,
                        amount_usd,
                        block_height,
                        block_time,
                        note,
                        source,
                    }
                },
            )
            .collect())
    }
}
