use crate::database::error::{StoreError, StoreResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

/// Append-only audit row for one inbound call. Write-once, never mutated.
#[derive(Debug, Clone)]
pub struct UsageLogRecord {
    pub id: Uuid,
    pub partner_id: Option<Uuid>,
    pub endpoint: String,
    pub method: String,
    pub status_code: i32,
    pub latency_ms: i64,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait UsageLogStore: Send + Sync {
    async fn append(&self, record: UsageLogRecord) -> StoreResult<()>;
}

pub struct PgUsageLogStore {
    pool: PgPool,
}

impl PgUsageLogStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UsageLogStore for PgUsageLogStore {
    async fn append(&self, record: UsageLogRecord) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO usage_logs (id, partner_id, endpoint, method, status_code, latency_ms, \
             ip, user_agent, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(record.id)
        .bind(record.partner_id)
        .bind(&record.endpoint)
        .bind(&record.method)
        .bind(record.status_code)
        .bind(record.latency_ms)
        .bind(&record.ip)
        .bind(&record.user_agent)
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;
        Ok(())
    }
}
