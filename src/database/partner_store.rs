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
pub enum PartnerStatus {
    Approved,
    Pending,
    Suspended,
}

impl PartnerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PartnerStatus::Approved => "approved",
            PartnerStatus::Pending => "pending",
            PartnerStatus::Suspended => "suspended",
        }
    }

    pub fn parse(value: &str) -> StoreResult<Self> {
        match value {
            "approved" => Ok(PartnerStatus::Approved),
            "pending" => Ok(PartnerStatus::Pending),
            "suspended" => Ok(PartnerStatus::Suspended),
            other => Err(StoreError::corrupt(format!(
                "unknown partner status '{}'",
                other
            ))),
        }
    }
}

/// A registered API consumer. Created by the out-of-scope onboarding flow;
/// read-only to this core.
#[derive(Debug, Clone)]
pub struct Partner {
    pub id: Uuid,
    pub name: String,
    pub api_key: String,
    pub status: PartnerStatus,
    pub webhook_url: Option<String>,
    pub webhook_secret: Option<String>,
    pub commission_rate: Decimal,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait PartnerStore: Send + Sync {
    /// Looks up a partner by its live API key. Only `approved` partners are
    /// returned; everything else fails closed at the authenticator.
    async fn find_approved_by_api_key(&self, api_key: &str) -> StoreResult<Option<Partner>>;

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Partner>>;
}

pub struct PgPartnerStore {
    pool: PgPool,
}

impl PgPartnerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_partner(row: &PgRow) -> StoreResult<Partner> {
        let status: String = row.try_get("status").map_err(StoreError::from_sqlx)?;
        Ok(Partner {
            id: row.try_get("id").map_err(StoreError::from_sqlx)?,
            name: row.try_get("name").map_err(StoreError::from_sqlx)?,
            api_key: row.try_get("api_key").map_err(StoreError::from_sqlx)?,
            status: PartnerStatus::parse(&status)?,
            webhook_url: row.try_get("webhook_url").map_err(StoreError::from_sqlx)?,
            webhook_secret: row
                .try_get("webhook_secret")
                .map_err(StoreError::from_sqlx)?,
            commission_rate: row
                .try_get("commission_rate")
                .map_err(StoreError::from_sqlx)?,
            created_at: row.try_get("created_at").map_err(StoreError::from_sqlx)?,
        })
    }
}

const PARTNER_COLUMNS: &str =
    "id, name, api_key, status, webhook_url, webhook_secret, commission_rate, created_at";

#[async_trait]
impl PartnerStore for PgPartnerStore {
    async fn find_approved_by_api_key(&self, api_key: &str) -> StoreResult<Option<Partner>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM partners WHERE api_key = $1 AND status = 'approved'",
            PARTNER_COLUMNS
        ))
        .bind(api_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;
        row.as_ref().map(Self::row_to_partner).transpose()
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Partner>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM partners WHERE id = $1",
            PARTNER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;
        row.as_ref().map(Self::row_to_partner).transpose()
    }
}
