//! Refund workflow: eligibility, recording, listing.
//!
//! A refund never mutates the payment's own status; it is a first-class row
//! created `pending` against a `completed` payment, settled by an
//! out-of-scope back-office flow.

use crate::database::payment_store::PaymentStore;
use crate::database::refund_store::{Refund, RefundPage, RefundStatus, RefundStore};
use crate::error::{AppError, AppResult};
use crate::providers::types::PaymentStatus;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
pub struct RefundRequest {
    #[serde(alias = "paymentId")]
    pub payment_id: Uuid,
    pub amount: Option<Decimal>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundView {
    pub id: Uuid,
    pub payment_id: Uuid,
    pub amount: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub status: RefundStatus,
    pub created_at: DateTime<Utc>,
}

impl RefundView {
    pub fn from_refund(refund: &Refund) -> Self {
        Self {
            id: refund.id,
            payment_id: refund.payment_id,
            amount: refund.amount,
            reason: refund.reason.clone(),
            status: refund.status,
            created_at: refund.created_at,
        }
    }
}

pub struct RefundService {
    payments: Arc<dyn PaymentStore>,
    refunds: Arc<dyn RefundStore>,
}

impl RefundService {
    pub fn new(payments: Arc<dyn PaymentStore>, refunds: Arc<dyn RefundStore>) -> Self {
        Self { payments, refunds }
    }

    pub async fn create(&self, partner_id: Uuid, request: RefundRequest) -> AppResult<Refund> {
        let payment = self
            .payments
            .find_by_id(partner_id, request.payment_id)
            .await?
            .ok_or(AppError::NotFound {
                resource: "payment",
            })?;

        if payment.status != PaymentStatus::Completed {
            return Err(AppError::InvalidPaymentStatus {
                status: payment.status,
            });
        }

        // A valid positive request clamps to the original; anything else
        // defaults to a full refund.
        let amount = match request.amount {
            Some(requested) if requested > Decimal::ZERO => requested.min(payment.amount),
            _ => payment.amount,
        };

        let now = Utc::now();
        let refund = Refund {
            id: Uuid::new_v4(),
            payment_id: payment.id,
            partner_id,
            amount,
            reason: request
                .reason
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty()),
            status: RefundStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        self.refunds.insert(&refund).await?;

        tracing::info!(
            refund_id = %refund.id,
            payment_id = %payment.id,
            amount = %refund.amount,
            "refund recorded"
        );
        Ok(refund)
    }

    pub async fn list(&self, partner_id: Uuid, limit: i64, offset: i64) -> AppResult<RefundPage> {
        Ok(self.refunds.list(partner_id, limit, offset).await?)
    }
}
