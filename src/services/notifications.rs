//! Asynchronous provider notifications.
//!
//! Processors confirm or reject charges out-of-band. The notification's
//! signature is verified over the raw body bytes first; it then locates the
//! payment by the merchant reference assigned before the outbound call,
//! applies the status transition if the row is still pending, and fires the
//! partner webhook for terminal transitions.

use crate::config::NotificationSecrets;
use crate::database::partner_store::PartnerStore;
use crate::database::payment_store::PaymentStore;
use crate::error::{AppError, AppResult};
use crate::providers::types::PaymentStatus;
use crate::services::webhooks::{secure_eq, sign, WebhookDispatcher};
use chrono::Utc;
use serde_json::{json, Value as JsonValue};
use std::sync::Arc;

pub struct NotificationService {
    payments: Arc<dyn PaymentStore>,
    partners: Arc<dyn PartnerStore>,
    dispatcher: Arc<WebhookDispatcher>,
    secrets: NotificationSecrets,
}

impl NotificationService {
    pub fn new(
        payments: Arc<dyn PaymentStore>,
        partners: Arc<dyn PartnerStore>,
        dispatcher: Arc<WebhookDispatcher>,
        secrets: NotificationSecrets,
    ) -> Self {
        Self {
            payments,
            partners,
            dispatcher,
            secrets,
        }
    }

    /// HMAC check against the per-provider shared secret, over the exact
    /// body bytes as received. Runs before any parsing or state change.
    fn verify_signature(
        &self,
        provider: &str,
        signature: Option<&str>,
        body: &[u8],
    ) -> AppResult<()> {
        let Some(secret) = self.secrets.secret_for(provider) else {
            tracing::warn!(provider, "no notification secret configured, accepting unsigned");
            return Ok(());
        };
        let provided = signature.ok_or(AppError::InvalidSignature)?;
        let expected = sign(secret, body);
        if !secure_eq(&expected, provided) {
            return Err(AppError::InvalidSignature);
        }
        Ok(())
    }

    pub async fn handle(
        &self,
        provider: &str,
        signature: Option<&str>,
        body: &[u8],
    ) -> AppResult<JsonValue> {
        self.verify_signature(provider, signature, body)?;

        let payload: JsonValue = serde_json::from_slice(body)
            .map_err(|_| AppError::validation("notification body is not valid JSON"))?;
        let payload = &payload;

        let merchant_reference = extract_merchant_reference(payload).ok_or_else(|| {
            AppError::validation("notification carries no merchant reference")
        })?;

        let mut payment = self
            .payments
            .find_by_merchant_reference(&merchant_reference)
            .await?
            .ok_or(AppError::NotFound {
                resource: "payment",
            })?;

        let raw_status = payload
            .get("status")
            .and_then(JsonValue::as_str)
            .ok_or_else(|| AppError::validation("notification carries no status"))?;

        let Some(status) = map_notification_status(raw_status) else {
            tracing::info!(provider, raw_status, "ignoring unrecognized notification status");
            return Ok(json!({ "received": true, "applied": false }));
        };

        // Terminal rows never move again; late or duplicate notifications
        // are acknowledged and dropped.
        if payment.status.is_terminal() {
            tracing::info!(
                provider,
                payment_id = %payment.id,
                current = %payment.status,
                "notification for terminal payment ignored"
            );
            return Ok(json!({ "received": true, "applied": false }));
        }

        payment.status = status;
        if payment.provider_transaction_id.is_none() {
            payment.provider_transaction_id = payload
                .get("id")
                .or_else(|| payload.get("transactionId"))
                .and_then(JsonValue::as_str)
                .map(str::to_string);
        }
        match status {
            PaymentStatus::Completed => payment.completed_at = Some(Utc::now()),
            PaymentStatus::Failed => {
                payment.provider_error = payload
                    .get("reason")
                    .or_else(|| payload.get("message"))
                    .and_then(JsonValue::as_str)
                    .map(str::to_string);
            }
            _ => {}
        }
        payment.updated_at = Utc::now();
        self.payments.update(&payment).await?;

        tracing::info!(
            provider,
            payment_id = %payment.id,
            status = %payment.status,
            "provider notification applied"
        );

        if let Some(partner) = self.partners.find_by_id(payment.partner_id).await? {
            self.dispatcher.dispatch_payment_event(&partner, &payment);
        }

        Ok(json!({
            "received": true,
            "applied": true,
            "status": payment.status,
        }))
    }
}

fn extract_merchant_reference(payload: &JsonValue) -> Option<String> {
    payload
        .get("merchantTransactionId")
        .or_else(|| payload.get("merchant_reference"))
        .or_else(|| payload.pointer("/metadata/merchant_reference"))
        .or_else(|| payload.get("reference"))
        .and_then(JsonValue::as_str)
        .map(str::to_string)
}

fn map_notification_status(raw: &str) -> Option<PaymentStatus> {
    match raw.to_ascii_uppercase().as_str() {
        "ACCEPTED" | "COMPLETED" | "SUCCEEDED" | "SUCCESS" | "PAID" => {
            Some(PaymentStatus::Completed)
        }
        "REJECTED" | "FAILED" | "DECLINED" => Some(PaymentStatus::Failed),
        "EXPIRED" => Some(PaymentStatus::Expired),
        "CANCELED" | "CANCELLED" => Some(PaymentStatus::Cancelled),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::memory::{InMemoryPartnerStore, InMemoryPaymentStore};
    use crate::database::payment_store::Payment;
    use crate::providers::types::PaymentMethod;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    fn pending_payment(partner_id: Uuid, merchant_reference: &str) -> Payment {
        let now = Utc::now();
        Payment {
            id: Uuid::new_v4(),
            partner_id,
            order_reference: "order-1".to_string(),
            amount: Decimal::from(5000),
            currency: "AOA".to_string(),
            method: PaymentMethod::MobileMoneyPush,
            status: PaymentStatus::Pending,
            customer_name: "Ana".to_string(),
            customer_email: "ana@example.com".to_string(),
            customer_phone: Some("+244912345678".to_string()),
            merchant_reference: merchant_reference.to_string(),
            provider_transaction_id: None,
            reference_entity: None,
            reference_number: None,
            client_secret: None,
            sandbox: false,
            metadata: json!({}),
            provider_error: None,
            webhook_attempts: 0,
            webhook_last_event: None,
            webhook_last_error: None,
            webhook_history: json!([]),
            expires_at: now,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    async fn service_with(
        row: &Payment,
        secrets: NotificationSecrets,
    ) -> (NotificationService, Arc<InMemoryPaymentStore>) {
        let payments = Arc::new(InMemoryPaymentStore::new());
        payments.insert(row).await.unwrap();
        let partners = Arc::new(InMemoryPartnerStore::new());
        let dispatcher = Arc::new(WebhookDispatcher::new(payments.clone(), 10));
        (
            NotificationService::new(payments.clone(), partners, dispatcher, secrets),
            payments,
        )
    }

    fn mobile_money_secret(secret: &str) -> NotificationSecrets {
        NotificationSecrets {
            mobile_money: Some(secret.to_string()),
            card_rail: None,
        }
    }

    #[tokio::test]
    async fn accepted_notification_completes_a_pending_payment() {
        let partner_id = Uuid::new_v4();
        let row = pending_payment(partner_id, "PG-abc");
        let (service, payments) = service_with(&row, NotificationSecrets::default()).await;

        let body = json!({
            "merchantTransactionId": "PG-abc",
            "id": "MM-12345",
            "status": "ACCEPTED",
        })
        .to_string();
        let result = service
            .handle("mobile_money", None, body.as_bytes())
            .await
            .unwrap();
        assert_eq!(result["applied"], true);

        let updated = payments
            .find_by_id(partner_id, row.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.status, PaymentStatus::Completed);
        assert_eq!(updated.provider_transaction_id.as_deref(), Some("MM-12345"));
        assert!(updated.completed_at.is_some());
    }

    #[tokio::test]
    async fn terminal_payments_ignore_late_notifications() {
        let partner_id = Uuid::new_v4();
        let mut row = pending_payment(partner_id, "PG-abc");
        row.status = PaymentStatus::Completed;
        let (service, payments) = service_with(&row, NotificationSecrets::default()).await;

        let body = json!({ "merchantTransactionId": "PG-abc", "status": "REJECTED" }).to_string();
        let result = service
            .handle("mobile_money", None, body.as_bytes())
            .await
            .unwrap();
        assert_eq!(result["applied"], false);

        let unchanged = payments
            .find_by_id(partner_id, row.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(unchanged.status, PaymentStatus::Completed);
    }

    #[tokio::test]
    async fn unknown_merchant_reference_is_not_found() {
        let row = pending_payment(Uuid::new_v4(), "PG-abc");
        let (service, _) = service_with(&row, NotificationSecrets::default()).await;
        let body =
            json!({ "merchantTransactionId": "PG-missing", "status": "SUCCEEDED" }).to_string();
        let err = service
            .handle("card_rail", None, body.as_bytes())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));
    }

    #[tokio::test]
    async fn failure_notification_records_the_reason() {
        let partner_id = Uuid::new_v4();
        let row = pending_payment(partner_id, "PG-abc");
        let (service, payments) = service_with(&row, NotificationSecrets::default()).await;

        let body = json!({
            "merchant_reference": "PG-abc",
            "status": "REJECTED",
            "reason": "insufficient funds",
        })
        .to_string();
        service
            .handle("mobile_money", None, body.as_bytes())
            .await
            .unwrap();

        let updated = payments
            .find_by_id(partner_id, row.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.status, PaymentStatus::Failed);
        assert_eq!(
            updated.provider_error.as_deref(),
            Some("insufficient funds")
        );
    }

    #[tokio::test]
    async fn unsigned_notification_is_rejected_when_a_secret_is_configured() {
        let partner_id = Uuid::new_v4();
        let row = pending_payment(partner_id, "PG-abc");
        let (service, payments) = service_with(&row, mobile_money_secret("whsec_mm")).await;

        let body = json!({ "merchantTransactionId": "PG-abc", "status": "ACCEPTED" }).to_string();
        let err = service
            .handle("mobile_money", None, body.as_bytes())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidSignature));

        // no header, no transition
        let unchanged = payments
            .find_by_id(partner_id, row.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(unchanged.status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn wrong_signature_is_rejected() {
        let row = pending_payment(Uuid::new_v4(), "PG-abc");
        let (service, _) = service_with(&row, mobile_money_secret("whsec_mm")).await;

        let body = json!({ "merchantTransactionId": "PG-abc", "status": "ACCEPTED" }).to_string();
        let forged = sign("some_other_secret", body.as_bytes());
        let err = service
            .handle("mobile_money", Some(&forged), body.as_bytes())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidSignature));
    }

    #[tokio::test]
    async fn correctly_signed_notification_is_applied() {
        let partner_id = Uuid::new_v4();
        let row = pending_payment(partner_id, "PG-abc");
        let (service, payments) = service_with(&row, mobile_money_secret("whsec_mm")).await;

        let body = json!({ "merchantTransactionId": "PG-abc", "status": "ACCEPTED" }).to_string();
        let signature = sign("whsec_mm", body.as_bytes());
        let result = service
            .handle("mobile_money", Some(&signature), body.as_bytes())
            .await
            .unwrap();
        assert_eq!(result["applied"], true);

        let updated = payments
            .find_by_id(partner_id, row.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.status, PaymentStatus::Completed);
    }
}
