use crate::database::error::{StoreError, StoreResult};
use crate::providers::types::{PaymentMethod, PaymentStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use std::str::FromStr;
use uuid::Uuid;

/// One payment attempt. Never physically deleted; status transitions are
/// `pending -> {completed, failed, expired, cancelled}`.
#[derive(Debug, Clone)]
pub struct Payment {
    pub id: Uuid,
    pub partner_id: Uuid,
    pub order_reference: String,
    pub amount: Decimal,
    pub currency: String,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: Option<String>,
    /// Locally generated correlation id, assigned before any outbound
    /// provider call so asynchronous notifications can always find the row.
    pub merchant_reference: String,
    pub provider_transaction_id: Option<String>,
    pub reference_entity: Option<String>,
    pub reference_number: Option<String>,
    pub client_secret: Option<String>,
    pub sandbox: bool,
    pub metadata: JsonValue,
    pub provider_error: Option<String>,
    pub webhook_attempts: i32,
    pub webhook_last_event: Option<String>,
    pub webhook_last_error: Option<String>,
    pub webhook_history: JsonValue,
    pub expires_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct PaymentPage {
    pub items: Vec<Payment>,
    pub total: i64,
}

#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn insert(&self, payment: &Payment) -> StoreResult<()>;

    async fn update(&self, payment: &Payment) -> StoreResult<()>;

    /// Partner-scoped point lookup. Cross-partner ids come back `None`.
    async fn find_by_id(&self, partner_id: Uuid, id: Uuid) -> StoreResult<Option<Payment>>;

    async fn find_by_order_reference(
        &self,
        partner_id: Uuid,
        order_reference: &str,
    ) -> StoreResult<Option<Payment>>;

    /// Lookup by the pre-assigned correlation id, used by the asynchronous
    /// provider-notification handler.
    async fn find_by_merchant_reference(
        &self,
        merchant_reference: &str,
    ) -> StoreResult<Option<Payment>>;

    async fn list(
        &self,
        partner_id: Uuid,
        status: Option<PaymentStatus>,
        limit: i64,
        offset: i64,
    ) -> StoreResult<PaymentPage>;

    /// Full partner history for the balance/stats engine.
    async fn list_all_for_partner(&self, partner_id: Uuid) -> StoreResult<Vec<Payment>>;

    /// Payments that have at least one webhook delivery attempt recorded.
    async fn list_with_webhook_activity(
        &self,
        partner_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> StoreResult<PaymentPage>;
}

pub struct PgPaymentStore {
    pool: PgPool,
}

const PAYMENT_COLUMNS: &str = "id, partner_id, order_reference, amount, currency, method, status, \
     customer_name, customer_email, customer_phone, merchant_reference, \
     provider_transaction_id, reference_entity, reference_number, client_secret, \
     sandbox, metadata, provider_error, webhook_attempts, webhook_last_event, \
     webhook_last_error, webhook_history, expires_at, completed_at, created_at, updated_at";

impl PgPaymentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_payment(row: &PgRow) -> StoreResult<Payment> {
        let method: String = row.try_get("method").map_err(StoreError::from_sqlx)?;
        let status: String = row.try_get("status").map_err(StoreError::from_sqlx)?;
        Ok(Payment {
            id: row.try_get("id").map_err(StoreError::from_sqlx)?,
            partner_id: row.try_get("partner_id").map_err(StoreError::from_sqlx)?,
            order_reference: row
                .try_get("order_reference")
                .map_err(StoreError::from_sqlx)?,
            amount: row.try_get("amount").map_err(StoreError::from_sqlx)?,
            currency: row.try_get("currency").map_err(StoreError::from_sqlx)?,
            method: PaymentMethod::from_str(&method)
                .map_err(|e| StoreError::corrupt(e.to_string()))?,
            status: PaymentStatus::from_str(&status)
                .map_err(|e| StoreError::corrupt(e.to_string()))?,
            customer_name: row.try_get("customer_name").map_err(StoreError::from_sqlx)?,
            customer_email: row
                .try_get("customer_email")
                .map_err(StoreError::from_sqlx)?,
            customer_phone: row
                .try_get("customer_phone")
                .map_err(StoreError::from_sqlx)?,
            merchant_reference: row
                .try_get("merchant_reference")
                .map_err(StoreError::from_sqlx)?,
            provider_transaction_id: row
                .try_get("provider_transaction_id")
                .map_err(StoreError::from_sqlx)?,
            reference_entity: row
                .try_get("reference_entity")
                .map_err(StoreError::from_sqlx)?,
            reference_number: row
                .try_get("reference_number")
                .map_err(StoreError::from_sqlx)?,
            client_secret: row.try_get("client_secret").map_err(StoreError::from_sqlx)?,
            sandbox: row.try_get("sandbox").map_err(StoreError::from_sqlx)?,
            metadata: row.try_get("metadata").map_err(StoreError::from_sqlx)?,
            provider_error: row
                .try_get("provider_error")
                .map_err(StoreError::from_sqlx)?,
            webhook_attempts: row
                .try_get("webhook_attempts")
                .map_err(StoreError::from_sqlx)?,
            webhook_last_event: row
                .try_get("webhook_last_event")
                .map_err(StoreError::from_sqlx)?,
            webhook_last_error: row
                .try_get("webhook_last_error")
                .map_err(StoreError::from_sqlx)?,
            webhook_history: row
                .try_get("webhook_history")
                .map_err(StoreError::from_sqlx)?,
            expires_at: row.try_get("expires_at").map_err(StoreError::from_sqlx)?,
            completed_at: row.try_get("completed_at").map_err(StoreError::from_sqlx)?,
            created_at: row.try_get("created_at").map_err(StoreError::from_sqlx)?,
            updated_at: row.try_get("updated_at").map_err(StoreError::from_sqlx)?,
        })
    }
}

#[async_trait]
impl PaymentStore for PgPaymentStore {
    async fn insert(&self, payment: &Payment) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO payments (id, partner_id, order_reference, amount, currency, method, \
             status, customer_name, customer_email, customer_phone, merchant_reference, \
             provider_transaction_id, reference_entity, reference_number, client_secret, \
             sandbox, metadata, provider_error, webhook_attempts, webhook_last_event, \
             webhook_last_error, webhook_history, expires_at, completed_at, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, \
             $18, $19, $20, $21, $22, $23, $24, $25, $26)",
        )
        .bind(payment.id)
        .bind(payment.partner_id)
        .bind(&payment.order_reference)
        .bind(payment.amount)
        .bind(&payment.currency)
        .bind(payment.method.as_str())
        .bind(payment.status.as_str())
        .bind(&payment.customer_name)
        .bind(&payment.customer_email)
        .bind(&payment.customer_phone)
        .bind(&payment.merchant_reference)
        .bind(&payment.provider_transaction_id)
        .bind(&payment.reference_entity)
        .bind(&payment.reference_number)
        .bind(&payment.client_secret)
        .bind(payment.sandbox)
        .bind(&payment.metadata)
        .bind(&payment.provider_error)
        .bind(payment.webhook_attempts)
        .bind(&payment.webhook_last_event)
        .bind(&payment.webhook_last_error)
        .bind(&payment.webhook_history)
        .bind(payment.expires_at)
        .bind(payment.completed_at)
        .bind(payment.created_at)
        .bind(payment.updated_at)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;
        Ok(())
    }

    async fn update(&self, payment: &Payment) -> StoreResult<()> {
        sqlx::query(
            "UPDATE payments SET status = $2, provider_transaction_id = $3, \
             reference_entity = $4, reference_number = $5, client_secret = $6, metadata = $7, \
             provider_error = $8, webhook_attempts = $9, webhook_last_event = $10, \
             webhook_last_error = $11, webhook_history = $12, completed_at = $13, \
             updated_at = $14 WHERE id = $1",
        )
        .bind(payment.id)
        .bind(payment.status.as_str())
        .bind(&payment.provider_transaction_id)
        .bind(&payment.reference_entity)
        .bind(&payment.reference_number)
        .bind(&payment.client_secret)
        .bind(&payment.metadata)
        .bind(&payment.provider_error)
        .bind(payment.webhook_attempts)
        .bind(&payment.webhook_last_event)
        .bind(&payment.webhook_last_error)
        .bind(&payment.webhook_history)
        .bind(payment.completed_at)
        .bind(payment.updated_at)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;
        Ok(())
    }

    async fn find_by_id(&self, partner_id: Uuid, id: Uuid) -> StoreResult<Option<Payment>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM payments WHERE id = $1 AND partner_id = $2",
            PAYMENT_COLUMNS
        ))
        .bind(id)
        .bind(partner_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;
        row.as_ref().map(Self::row_to_payment).transpose()
    }

    async fn find_by_order_reference(
        &self,
        partner_id: Uuid,
        order_reference: &str,
    ) -> StoreResult<Option<Payment>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM payments WHERE partner_id = $1 AND order_reference = $2",
            PAYMENT_COLUMNS
        ))
        .bind(partner_id)
        .bind(order_reference)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;
        row.as_ref().map(Self::row_to_payment).transpose()
    }

    async fn find_by_merchant_reference(
        &self,
        merchant_reference: &str,
    ) -> StoreResult<Option<Payment>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM payments WHERE merchant_reference = $1",
            PAYMENT_COLUMNS
        ))
        .bind(merchant_reference)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;
        row.as_ref().map(Self::row_to_payment).transpose()
    }

    async fn list(
        &self,
        partner_id: Uuid,
        status: Option<PaymentStatus>,
        limit: i64,
        offset: i64,
    ) -> StoreResult<PaymentPage> {
        let (rows, total_row) = match status {
            Some(status) => {
                let rows = sqlx::query(&format!(
                    "SELECT {} FROM payments WHERE partner_id = $1 AND status = $2 \
                     ORDER BY created_at DESC LIMIT $3 OFFSET $4",
                    PAYMENT_COLUMNS
                ))
                .bind(partner_id)
                .bind(status.as_str())
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await
                .map_err(StoreError::from_sqlx)?;
                let total = sqlx::query(
                    "SELECT COUNT(*) AS total FROM payments WHERE partner_id = $1 AND status = $2",
                )
                .bind(partner_id)
                .bind(status.as_str())
                .fetch_one(&self.pool)
                .await
                .map_err(StoreError::from_sqlx)?;
                (rows, total)
            }
            None => {
                let rows = sqlx::query(&format!(
                    "SELECT {} FROM payments WHERE partner_id = $1 \
                     ORDER BY created_at DESC LIMIT $2 OFFSET $3",
                    PAYMENT_COLUMNS
                ))
                .bind(partner_id)
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await
                .map_err(StoreError::from_sqlx)?;
                let total =
                    sqlx::query("SELECT COUNT(*) AS total FROM payments WHERE partner_id = $1")
                        .bind(partner_id)
                        .fetch_one(&self.pool)
                        .await
                        .map_err(StoreError::from_sqlx)?;
                (rows, total)
            }
        };

        let items = rows
            .iter()
            .map(Self::row_to_payment)
            .collect::<StoreResult<Vec<_>>>()?;
        let total: i64 = total_row.try_get("total").map_err(StoreError::from_sqlx)?;
        Ok(PaymentPage { items, total })
    }

    async fn list_all_for_partner(&self, partner_id: Uuid) -> StoreResult<Vec<Payment>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM payments WHERE partner_id = $1 ORDER BY created_at DESC",
            PAYMENT_COLUMNS
        ))
        .bind(partner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;
        rows.iter().map(Self::row_to_payment).collect()
    }

    async fn list_with_webhook_activity(
        &self,
        partner_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> StoreResult<PaymentPage> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM payments WHERE partner_id = $1 AND webhook_attempts > 0 \
             ORDER BY updated_at DESC LIMIT $2 OFFSET $3",
            PAYMENT_COLUMNS
        ))
        .bind(partner_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;
        let total_row = sqlx::query(
            "SELECT COUNT(*) AS total FROM payments WHERE partner_id = $1 AND webhook_attempts > 0",
        )
        .bind(partner_id)
        .fetch_one(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        let items = rows
            .iter()
            .map(Self::row_to_payment)
            .collect::<StoreResult<Vec<_>>>()?;
        let total: i64 = total_row.try_get("total").map_err(StoreError::from_sqlx)?;
        Ok(PaymentPage { items, total })
    }
}
