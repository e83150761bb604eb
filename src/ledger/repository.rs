use async_trait::async_trait;
use chrono::{DateTime, Utc};
use primitive_types::U256;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use tracing::info;

use super::models::*;
use crate::blockchain::hex;
use crate::blockchain::transaction::{BlockRef, TxStatus};
use crate::config::StorageConfig;
use crate::error::{StorageError, StorageResult};

const TRANSACTION_COLUMNS: &str = "id, hash, block_hash, block_number, from_addr, to_addr, \
     confirmations, amount, status, created_at, showed";

/// Durable storage of transactions and balances
///
/// Update operations report whether a row with the given id existed.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Insert a tracked transaction and return its assigned id
    async fn insert_transaction(&self, record: &NewTransaction) -> StorageResult<i64>;

    /// Write-once withdrawal-side copy kept for reporting
    async fn insert_withdrawal(&self, record: &NewTransaction) -> StorageResult<()>;

    async fn update_confirmations(&self, id: i64, confirmations: u64) -> StorageResult<bool>;

    async fn update_status(&self, id: i64, status: TxStatus) -> StorageResult<bool>;

    /// Record the containing block; `created_at` only fills an empty value
    async fn update_block(
        &self,
        id: i64,
        block: &BlockRef,
        created_at: DateTime<Utc>,
    ) -> StorageResult<bool>;

    /// Insert or replace the balance of `address`
    async fn upsert_balance(&self, address: &str, amount: &U256) -> StorageResult<()>;

    async fn load_by_status(&self, status: TxStatus) -> StorageResult<Vec<TransactionRecord>>;

    /// Rows not yet shown, or still below `confirmations_below` confirmations
    async fn load_recent(&self, confirmations_below: u64) -> StorageResult<Vec<TransactionRecord>>;

    /// Ids per `mark_shown_page` call
    fn page_size(&self) -> usize;

    async fn mark_shown_page(&self, ids: &[i64]) -> StorageResult<u64>;

    async fn load_pending(&self) -> StorageResult<Vec<TransactionRecord>> {
        self.load_by_status(TxStatus::Pending).await
    }

    /// Flag rows as shown, one batched update per page
    async fn mark_shown(&self, ids: &[i64]) -> StorageResult<u64> {
        let mut updated = 0;
        for page in ids.chunks(self.page_size().max(1)) {
            updated += self.mark_shown_page(page).await?;
        }
        Ok(updated)
    }
}

pub(crate) fn confirmations_to_i64(confirmations: u64) -> StorageResult<i64> {
    i64::try_from(confirmations)
        .map_err(|_| StorageError::Encoding(format!("confirmations {} out of range", confirmations)))
}

/// PostgreSQL-backed store
pub struct PgStore {
    pool: PgPool,
    page_size: usize,
}

impl PgStore {
    pub fn new(pool: PgPool, page_size: usize) -> Self {
        Self { pool, page_size }
    }

    /// Open the pool and apply pending migrations
    pub async fn connect(config: &StorageConfig) -> StorageResult<Self> {
        info!("📊 Connecting to database...");

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(&config.database_url)
            .await?;

        info!("🔄 Running database migrations...");
        sqlx::migrate!("./migrations").run(&pool).await?;

        info!("✓ Database initialized");
        Ok(Self::new(pool, config.page_size))
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl TransactionStore for PgStore {
    async fn insert_transaction(&self, record: &NewTransaction) -> StorageResult<i64> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO transactions_entry
                (hash, block_hash, block_number, from_addr, to_addr, created_at, amount, confirmations)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 0)
            RETURNING id
            "#,
        )
        .bind(&record.hash)
        .bind(&record.block_hash)
        .bind(&record.block_number)
        .bind(&record.from_addr)
        .bind(&record.to_addr)
        .bind(record.created_at)
        .bind(&record.amount)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    async fn insert_withdrawal(&self, record: &NewTransaction) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO transactions_withdraw (hash, from_addr, to_addr, amount, created_at)
            VALUES ($1, $2, $3, $4, NOW())
            "#,
        )
        .bind(&record.hash)
        .bind(&record.from_addr)
        .bind(&record.to_addr)
        .bind(&record.amount)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_confirmations(&self, id: i64, confirmations: u64) -> StorageResult<bool> {
        let result = sqlx::query("UPDATE transactions_entry SET confirmations = $1 WHERE id = $2")
            .bind(confirmations_to_i64(confirmations)?)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn update_status(&self, id: i64, status: TxStatus) -> StorageResult<bool> {
        let result = sqlx::query("UPDATE transactions_entry SET status = $1 WHERE id = $2")
            .bind(status)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn update_block(
        &self,
        id: i64,
        block: &BlockRef,
        created_at: DateTime<Utc>,
    ) -> StorageResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE transactions_entry
            SET block_hash = $1, block_number = $2, created_at = COALESCE(created_at, $3)
            WHERE id = $4
            "#,
        )
        .bind(&block.hash)
        .bind(quantity_to_decimal(&block.number)?)
        .bind(created_at)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn upsert_balance(&self, address: &str, amount: &U256) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO balances (address, balance, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (address) DO UPDATE SET balance = EXCLUDED.balance, updated_at = NOW()
            "#,
        )
        .bind(address.to_lowercase())
        .bind(hex::quantity_to_hex(amount))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn load_by_status(&self, status: TxStatus) -> StorageResult<Vec<TransactionRecord>> {
        let query = format!(
            "SELECT {} FROM transactions_entry WHERE status = $1 ORDER BY id",
            TRANSACTION_COLUMNS
        );
        let rows = sqlx::query_as::<_, TransactionRecord>(&query)
            .bind(status)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    async fn load_recent(&self, confirmations_below: u64) -> StorageResult<Vec<TransactionRecord>> {
        let query = format!(
            "SELECT {} FROM transactions_entry WHERE showed = FALSE OR confirmations < $1 ORDER BY id",
            TRANSACTION_COLUMNS
        );
        let rows = sqlx::query_as::<_, TransactionRecord>(&query)
            .bind(confirmations_to_i64(confirmations_below)?)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    fn page_size(&self) -> usize {
        self.page_size
    }

    async fn mark_shown_page(&self, ids: &[i64]) -> StorageResult<u64> {
        let result = sqlx::query("UPDATE transactions_entry SET showed = TRUE WHERE id = ANY($1)")
            .bind(ids)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
