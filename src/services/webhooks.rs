//! Webhook signing and delivery.
//!
//! Status-change notifications to partners are signed with HMAC-SHA256 over
//! the exact payload bytes and delivered with a bounded timeout. Delivery is
//! fire-and-forget relative to whatever triggered it: a dead partner endpoint
//! is recorded on the payment row, never surfaced as an error to the request
//! that caused the status change.

use crate::database::partner_store::Partner;
use crate::database::payment_store::{Payment, PaymentStore};
use crate::error::{AppError, AppResult};
use crate::providers::types::PaymentStatus;
use crate::services::query::PaymentView;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::Serialize;
use serde_json::{json, Value as JsonValue};
use sha2::Sha256;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

pub const SIGNATURE_HEADER: &str = "x-webhook-signature";
pub const EVENT_HEADER: &str = "x-webhook-event";
pub const TIMESTAMP_HEADER: &str = "x-webhook-timestamp";

type HmacSha256 = Hmac<Sha256>;

/// HMAC-SHA256 over the payload bytes, hex-encoded.
pub fn sign(secret: &str, payload: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time signature comparison for receivers verifying our calls.
pub fn secure_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes().zip(b.bytes()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

pub fn event_for_status(status: PaymentStatus) -> &'static str {
    match status {
        PaymentStatus::Pending => "payment.pending",
        PaymentStatus::Completed => "payment.completed",
        PaymentStatus::Failed => "payment.failed",
        PaymentStatus::Expired => "payment.expired",
        PaymentStatus::Cancelled => "payment.cancelled",
    }
}

/// Delivery-metadata projection for the logs endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookLogView {
    pub payment_id: Uuid,
    pub order_reference: String,
    pub attempts: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_event: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub history: JsonValue,
}

impl WebhookLogView {
    pub fn from_payment(payment: &Payment) -> Self {
        Self {
            payment_id: payment.id,
            order_reference: payment.order_reference.clone(),
            attempts: payment.webhook_attempts,
            last_event: payment.webhook_last_event.clone(),
            last_error: payment.webhook_last_error.clone(),
            history: payment.webhook_history.clone(),
        }
    }
}

pub struct WebhookDispatcher {
    client: reqwest::Client,
    payments: Arc<dyn PaymentStore>,
    timeout: Duration,
}

impl WebhookDispatcher {
    pub fn new(payments: Arc<dyn PaymentStore>, timeout_secs: u64) -> Self {
        Self {
            client: reqwest::Client::new(),
            payments,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// One signed POST to the partner endpoint. Returns the response status
    /// and latency, or a description of what went wrong. Non-2xx counts as
    /// a failure; partners must acknowledge.
    async fn deliver(
        &self,
        url: &str,
        secret: Option<&str>,
        event: &str,
        payload: &JsonValue,
    ) -> Result<(u16, u64), String> {
        let body = serde_json::to_vec(payload).map_err(|e| e.to_string())?;
        let signature = secret.map(|s| sign(s, &body)).unwrap_or_default();

        let started = Instant::now();
        let response = self
            .client
            .post(url)
            .timeout(self.timeout)
            .header("content-type", "application/json")
            .header(SIGNATURE_HEADER, signature)
            .header(EVENT_HEADER, event)
            .header(TIMESTAMP_HEADER, Utc::now().timestamp().to_string())
            .body(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    "delivery timed out".to_string()
                } else {
                    format!("delivery failed: {}", e)
                }
            })?;
        let latency_ms = started.elapsed().as_millis() as u64;

        let status = response.status();
        if status.is_success() {
            Ok((status.as_u16(), latency_ms))
        } else {
            Err(format!("endpoint returned {}", status.as_u16()))
        }
    }

    /// Fire-and-forget notification for a payment's current status. The
    /// spawned task re-reads the row before writing delivery metadata so it
    /// does not clobber a concurrent status transition.
    pub fn dispatch_payment_event(self: &Arc<Self>, partner: &Partner, payment: &Payment) {
        let url = match &partner.webhook_url {
            Some(url) => url.clone(),
            None => {
                tracing::debug!(partner_id = %partner.id, "no webhook URL configured, skipping");
                return;
            }
        };

        let event = event_for_status(payment.status).to_string();
        let secret = partner.webhook_secret.clone();
        let payload = json!({
            "event": event,
            "timestamp": Utc::now().to_rfc3339(),
            "data": PaymentView::from_payment(payment),
        });
        let dispatcher = Arc::clone(self);
        let partner_id = partner.id;
        let payment_id = payment.id;

        tokio::spawn(async move {
            let result = dispatcher
                .deliver(&url, secret.as_deref(), &event, &payload)
                .await;
            match &result {
                Ok((status, latency_ms)) => tracing::info!(
                    %payment_id, event, status, latency_ms, "webhook delivered"
                ),
                Err(error) => tracing::warn!(%payment_id, event, error, "webhook delivery failed"),
            }
            dispatcher
                .record_delivery(partner_id, payment_id, &event, result)
                .await;
        });
    }

    async fn record_delivery(
        &self,
        partner_id: Uuid,
        payment_id: Uuid,
        event: &str,
        result: Result<(u16, u64), String>,
    ) {
        let mut payment = match self.payments.find_by_id(partner_id, payment_id).await {
            Ok(Some(payment)) => payment,
            Ok(None) => return,
            Err(err) => {
                tracing::warn!(%payment_id, error = %err, "could not load payment for delivery record");
                return;
            }
        };

        let attempt = match &result {
            Ok((status, latency_ms)) => json!({
                "event": event,
                "timestamp": Utc::now().to_rfc3339(),
                "success": true,
                "statusCode": status,
                "latencyMs": latency_ms,
            }),
            Err(error) => json!({
                "event": event,
                "timestamp": Utc::now().to_rfc3339(),
                "success": false,
                "error": error,
            }),
        };

        payment.webhook_attempts += 1;
        payment.webhook_last_event = Some(event.to_string());
        payment.webhook_last_error = result.err();
        if let Some(history) = payment.webhook_history.as_array_mut() {
            history.push(attempt);
        } else {
            payment.webhook_history = json!([attempt]);
        }
        payment.updated_at = Utc::now();

        if let Err(err) = self.payments.update(&payment).await {
            tracing::warn!(%payment_id, error = %err, "failed to persist delivery record");
        }
    }

    /// Connectivity check: delivers a synthetic `webhook.test` event and
    /// reports reachability and latency. Touches no payment record.
    pub async fn send_test(&self, partner: &Partner) -> AppResult<JsonValue> {
        let url = partner
            .webhook_url
            .as_deref()
            .ok_or_else(|| AppError::validation("no webhook URL is configured for this partner"))?;

        let payload = json!({
            "event": "webhook.test",
            "timestamp": Utc::now().to_rfc3339(),
            "data": {
                "partnerId": partner.id,
                "message": "webhook connectivity test",
            },
        });

        match self
            .deliver(url, partner.webhook_secret.as_deref(), "webhook.test", &payload)
            .await
        {
            Ok((status, latency_ms)) => Ok(json!({
                "delivered": true,
                "statusCode": status,
                "latencyMs": latency_ms,
            })),
            Err(error) => Ok(json!({
                "delivered": false,
                "error": error,
            })),
        }
    }

    /// Redeliver the event matching the payment's current status.
    pub fn resend(self: &Arc<Self>, partner: &Partner, payment: &Payment) -> AppResult<JsonValue> {
        if partner.webhook_url.is_none() {
            return Err(AppError::validation(
                "no webhook URL is configured for this partner",
            ));
        }
        let event = event_for_status(payment.status);
        self.dispatch_payment_event(partner, payment);
        Ok(json!({ "accepted": true, "event": event }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_matches_independent_computation() {
        let payload = br#"{"event":"payment.completed","amount":"5000"}"#;
        let ours = sign("whsec_abc123", payload);

        let mut mac = HmacSha256::new_from_slice(b"whsec_abc123").unwrap();
        mac.update(payload);
        let theirs = hex::encode(mac.finalize().into_bytes());

        assert_eq!(ours, theirs);
        assert!(secure_eq(&ours, &theirs));
    }

    #[test]
    fn different_payloads_produce_different_signatures() {
        let a = sign("secret", b"payload-a");
        let b = sign("secret", b"payload-b");
        assert_ne!(a, b);
        assert!(!secure_eq(&a, &b));
    }

    #[test]
    fn event_names_follow_status() {
        assert_eq!(event_for_status(PaymentStatus::Completed), "payment.completed");
        assert_eq!(event_for_status(PaymentStatus::Failed), "payment.failed");
        assert_eq!(event_for_status(PaymentStatus::Expired), "payment.expired");
    }
}
