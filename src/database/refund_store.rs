use crate::database::error::{StoreError, StoreResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RefundStatus {
    Pending,
    Completed,
    Rejected,
}

impl RefundStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefundStatus::Pending => "pending",
            RefundStatus::Completed => "completed",
            RefundStatus::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> StoreResult<Self> {
        match value {
            "pending" => Ok(RefundStatus::Pending),
            "completed" => Ok(RefundStatus::Completed),
            "rejected" => Ok(RefundStatus::Rejected),
            other => Err(StoreError::corrupt(format!(
                "unknown refund status '{}'",
                other
            ))),
        }
    }
}

/// A request to reverse a completed payment. First-class row with a foreign
/// key to the payment; amount never exceeds the original.
#[derive(Debug, Clone)]
pub struct Refund {
    pub id: Uuid,
    pub payment_id: Uuid,
    pub partner_id: Uuid,
    pub amount: Decimal,
    pub reason: Option<String>,
    pub status: RefundStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct RefundPage {
    pub items: Vec<Refund>,
    pub total: i64,
}

#[async_trait]
pub trait RefundStore: Send + Sync {
    async fn insert(&self, refund: &Refund) -> StoreResult<()>;

    async fn list(&self, partner_id: Uuid, limit: i64, offset: i64) -> StoreResult<RefundPage>;

    /// Full refund history for the balance engine.
    async fn list_all_for_partner(&self, partner_id: Uuid) -> StoreResult<Vec<Refund>>;
}

pub struct PgRefundStore {
    pool: PgPool,
}

const REFUND_COLUMNS: &str =
    "id, payment_id, partner_id, amount, reason, status, created_at, updated_at";

impl PgRefundStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_refund(row: &PgRow) -> StoreResult<Refund> {
        let status: String = row.try_get("status").map_err(StoreError::from_sqlx)?;
        Ok(Refund {
            id: row.try_get("id").map_err(StoreError::from_sqlx)?,
            payment_id: row.try_get("payment_id").map_err(StoreError::from_sqlx)?,
            partner_id: row.try_get("partner_id").map_err(StoreError::from_sqlx)?,
            amount: row.try_get("amount").map_err(StoreError::from_sqlx)?,
            reason: row.try_get("reason").map_err(StoreError::from_sqlx)?,
            status: RefundStatus::parse(&status)?,
            created_at: row.try_get("created_at").map_err(StoreError::from_sqlx)?,
            updated_at: row.try_get("updated_at").map_err(StoreError::from_sqlx)?,
        })
    }
}

#[async_trait]
impl RefundStore for PgRefundStore {
    async fn insert(&self, refund: &Refund) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO refunds (id, payment_id, partner_id, amount, reason, status, \
             created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(refund.id)
        .bind(refund.payment_id)
        .bind(refund.partner_id)
        .bind(refund.amount)
        .bind(&refund.reason)
        .bind(refund.status.as_str())
        .bind(refund.created_at)
        .bind(refund.updated_at)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;
        Ok(())
    }

    async fn list(&self, partner_id: Uuid, limit: i64, offset: i64) -> StoreResult<RefundPage> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM refunds WHERE partner_id = $1 \
             ORDER BY created_at DESC LIMIT $2 OFFSET $3",
            REFUND_COLUMNS
        ))
        .bind(partner_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;
        let total_row = sqlx::query("SELECT COUNT(*) AS total FROM refunds WHERE partner_id = $1")
            .bind(partner_id)
            .fetch_one(&self.pool)
            .await
            .map_err(StoreError::from_sqlx)?;

        let items = rows
            .iter()
            .map(Self::row_to_refund)
            .collect::<StoreResult<Vec<_>>>()?;
        let total: i64 = total_row.try_get("total").map_err(StoreError::from_sqlx)?;
        Ok(RefundPage { items, total })
    }

    async fn list_all_for_partner(&self, partner_id: Uuid) -> StoreResult<Vec<Refund>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM refunds WHERE partner_id = $1 ORDER BY created_at DESC",
            REFUND_COLUMNS
        ))
        .bind(partner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;
        rows.iter().map(Self::row_to_refund).collect()
    }
}
