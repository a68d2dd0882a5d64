//! Transaction log
//!
//! Append-only sink for per-event transaction records, with the read queries
//! the analytics endpoints need. Postgres backs production; an in-memory
//! implementation backs tests and database-less operation. Appends are
//! best-effort from the engine's point of view: a failed write degrades
//! durability, never the request.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::info;

use riskmesh_errors::{Result, RiskMeshError};

use crate::models::{TopRiskyUser, TransactionRecord};

/// Append-only transaction log collaborator.
#[async_trait]
pub trait TransactionLog: Send + Sync {
    /// Append one immutable record.
    async fn append(&self, record: &TransactionRecord) -> Result<()>;

    /// Records with `timestamp >= cutoff`, oldest first.
    async fn since(&self, cutoff: DateTime<Utc>) -> Result<Vec<TransactionRecord>>;

    /// One user's records with `timestamp >= cutoff`, oldest first.
    async fn for_user(&self, user_id: &str, cutoff: DateTime<Utc>) -> Result<Vec<TransactionRecord>>;

    /// Users ranked by mean risk, descending.
    async fn top_risky(&self, limit: i64) -> Result<Vec<TopRiskyUser>>;
}

// =============================================================================
// POSTGRES LOG
// =============================================================================

/// Postgres-backed transaction log.
pub struct PostgresTransactionLog {
    pool: PgPool,
}

impl PostgresTransactionLog {
    /// Connect and make sure the schema exists.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(|e| RiskMeshError::database("connect", e.to_string()))?;

        let log = Self { pool };
        log.ensure_schema().await?;
        info!("transaction log connected");
        Ok(log)
    }

    async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS transactions (
                transaction_id      UUID PRIMARY KEY,
                user_id             TEXT NOT NULL,
                device_id           TEXT NOT NULL,
                ip_address          TEXT NOT NULL,
                merchant_id         TEXT NOT NULL,
                transaction_amount  DOUBLE PRECISION NOT NULL,
                risk_score          DOUBLE PRECISION NOT NULL,
                propagation_depth   INTEGER NOT NULL,
                timestamp           TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| RiskMeshError::database("ensure_schema", e.to_string()))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_transactions_user ON transactions (user_id)")
            .execute(&self.pool)
            .await
            .map_err(|e| RiskMeshError::database("ensure_schema", e.to_string()))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_transactions_ts ON transactions (timestamp)")
            .execute(&self.pool)
            .await
            .map_err(|e| RiskMeshError::database("ensure_schema", e.to_string()))?;

        Ok(())
    }
}

#[async_trait]
impl TransactionLog for PostgresTransactionLog {
    async fn append(&self, record: &TransactionRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO transactions
                (transaction_id, user_id, device_id, ip_address, merchant_id,
                 transaction_amount, risk_score, propagation_depth, timestamp)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(record.transaction_id)
        .bind(&record.user_id)
        .bind(&record.device_id)
        .bind(&record.ip_address)
        .bind(&record.merchant_id)
        .bind(record.transaction_amount)
        .bind(record.risk_score)
        .bind(record.propagation_depth)
        .bind(record.timestamp)
        .execute(&self.pool)
        .await
        .map_err(|e| RiskMeshError::database("append", e.to_string()))?;
        Ok(())
    }

    async fn since(&self, cutoff: DateTime<Utc>) -> Result<Vec<TransactionRecord>> {
        sqlx::query_as::<_, TransactionRecord>(
            "SELECT * FROM transactions WHERE timestamp >= $1 ORDER BY timestamp ASC",
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RiskMeshError::database("since", e.to_string()))
    }

    async fn for_user(&self, user_id: &str, cutoff: DateTime<Utc>) -> Result<Vec<TransactionRecord>> {
        sqlx::query_as::<_, TransactionRecord>(
            r#"
            SELECT * FROM transactions
            WHERE user_id = $1 AND timestamp >= $2
            ORDER BY timestamp ASC
            "#,
        )
        .bind(user_id)
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RiskMeshError::database("for_user", e.to_string()))
    }

    async fn top_risky(&self, limit: i64) -> Result<Vec<TopRiskyUser>> {
        sqlx::query_as::<_, TopRiskyUser>(
            r#"
            SELECT user_id,
                   COUNT(*)        AS transaction_count,
                   AVG(risk_score) AS avg_risk,
                   MAX(risk_score) AS max_risk
            FROM transactions
            GROUP BY user_id
            ORDER BY avg_risk DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RiskMeshError::database("top_risky", e.to_string()))
    }
}

// =============================================================================
// IN-MEMORY LOG
// =============================================================================

/// In-memory transaction log for tests and database-less operation.
#[derive(Default)]
pub struct MemoryTransactionLog {
    records: RwLock<Vec<TransactionRecord>>,
}

impl MemoryTransactionLog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TransactionLog for MemoryTransactionLog {
    async fn append(&self, record: &TransactionRecord) -> Result<()> {
        self.records.write().await.push(record.clone());
        Ok(())
    }

    async fn since(&self, cutoff: DateTime<Utc>) -> Result<Vec<TransactionRecord>> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .filter(|r| r.timestamp >= cutoff)
            .cloned()
            .collect())
    }

    async fn for_user(&self, user_id: &str, cutoff: DateTime<Utc>) -> Result<Vec<TransactionRecord>> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .filter(|r| r.user_id == user_id && r.timestamp >= cutoff)
            .cloned()
            .collect())
    }

    async fn top_risky(&self, limit: i64) -> Result<Vec<TopRiskyUser>> {
        let records = self.records.read().await;
        let mut per_user: HashMap<&str, (i64, f64, f64)> = HashMap::new();
        for record in records.iter() {
            let entry = per_user.entry(&record.user_id).or_insert((0, 0.0, 0.0));
            entry.0 += 1;
            entry.1 += record.risk_score;
            entry.2 = entry.2.max(record.risk_score);
        }

        let mut ranked: Vec<TopRiskyUser> = per_user
            .into_iter()
            .map(|(user_id, (count, sum, max))| TopRiskyUser {
                user_id: user_id.to_string(),
                transaction_count: count,
                avg_risk: sum / count as f64,
                max_risk: max,
            })
            .collect();
        ranked.sort_by(|a, b| b.avg_risk.total_cmp(&a.avg_risk));
        ranked.truncate(limit.max(0) as usize);
        Ok(ranked)
    }
}
