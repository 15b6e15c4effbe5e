//! Payment lookup and listing.

use crate::database::payment_store::{Payment, PaymentPage, PaymentStore};
use crate::error::{AppError, AppResult};
use crate::providers::types::{PaymentMethod, PaymentStatus, ReferencePair};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

/// Partner-facing projection of a payment row. Internal bookkeeping
/// (webhook counters, provider error traces) stays out of this view.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentView {
    pub id: Uuid,
    pub order_reference: String,
    pub amount: Decimal,
    pub currency: String,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub customer_name: String,
    pub customer_email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_transaction_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<ReferencePair>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    pub sandbox: bool,
    pub expires_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl PaymentView {
    pub fn from_payment(payment: &Payment) -> Self {
        let reference = match (&payment.reference_entity, &payment.reference_number) {
            (Some(entity), Some(number)) => Some(ReferencePair {
                entity: entity.clone(),
                number: number.clone(),
            }),
            _ => None,
        };
        Self {
            id: payment.id,
            order_reference: payment.order_reference.clone(),
            amount: payment.amount,
            currency: payment.currency.clone(),
            method: payment.method,
            status: payment.status,
            customer_name: payment.customer_name.clone(),
            customer_email: payment.customer_email.clone(),
            customer_phone: payment.customer_phone.clone(),
            provider_transaction_id: payment.provider_transaction_id.clone(),
            reference,
            client_secret: payment.client_secret.clone(),
            sandbox: payment.sandbox,
            expires_at: payment.expires_at,
            completed_at: payment.completed_at,
            created_at: payment.created_at,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListPaymentsParams {
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Clamp pagination inputs instead of rejecting them; out-of-range values
/// are a nuisance, not an error.
pub fn clamp_page(limit: Option<i64>, offset: Option<i64>) -> (i64, i64) {
    let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let offset = offset.unwrap_or(0).max(0);
    (limit, offset)
}

pub struct QueryService {
    payments: Arc<dyn PaymentStore>,
}

impl QueryService {
    pub fn new(payments: Arc<dyn PaymentStore>) -> Self {
        Self { payments }
    }

    /// Point lookup scoped to the partner. Another partner's payment id
    /// resolves to `NotFound`, never to an authorization error that would
    /// leak existence.
    pub async fn get(&self, partner_id: Uuid, id: Uuid) -> AppResult<Payment> {
        self.payments
            .find_by_id(partner_id, id)
            .await?
            .ok_or(AppError::NotFound {
                resource: "payment",
            })
    }

    pub async fn list(
        &self,
        partner_id: Uuid,
        params: &ListPaymentsParams,
    ) -> AppResult<PaymentPage> {
        let status = match &params.status {
            Some(raw) => Some(PaymentStatus::from_str(raw).map_err(|_| {
                AppError::validation_field(format!("unknown payment status '{}'", raw), "status")
            })?),
            None => None,
        };
        let (limit, offset) = clamp_page(params.limit, params.offset);
        Ok(self.payments.list(partner_id, status, limit, offset).await?)
    }
}
