//! Mobile-money / bank-reference processor adapter. The processor exposes
//! an OAuth-secured charge API: a client-credentials token is acquired per
//! charge and the charge is submitted with the pre-assigned merchant
//! transaction id so asynchronous notifications can correlate.

use crate::providers::adapter::ProviderAdapter;
use crate::providers::error::{ProviderError, ProviderResult};
use crate::providers::http::{ProviderHttpClient, RequestBody};
use crate::providers::types::{
    ChargeOutcome, ChargeRequest, PaymentMethod, PaymentStatus, ProviderFamily, ReferencePair,
};
use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone)]
pub struct MobileMoneyConfig {
    pub base_url: String,
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl MobileMoneyConfig {
    /// Reads credentials from the environment. Returns `None` when the
    /// processor is not configured; the orchestrator turns that into a
    /// configuration error only if a request actually needs this family.
    pub fn from_env() -> Option<Self> {
        let client_id = std::env::var("MOBILE_MONEY_CLIENT_ID").ok()?;
        let client_secret = std::env::var("MOBILE_MONEY_CLIENT_SECRET").ok()?;
        Some(Self {
            base_url: std::env::var("MOBILE_MONEY_BASE_URL")
                .unwrap_or_else(|_| "https://api.mobilemoney.example".to_string()),
            token_url: std::env::var("MOBILE_MONEY_TOKEN_URL")
                .unwrap_or_else(|_| "https://auth.mobilemoney.example/oauth2/token".to_string()),
            client_id,
            client_secret,
            timeout_secs: std::env::var("MOBILE_MONEY_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(30),
            max_retries: std::env::var("MOBILE_MONEY_MAX_RETRIES")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(2),
        })
    }
}

pub struct MobileMoneyAdapter {
    config: MobileMoneyConfig,
    http: ProviderHttpClient,
}

impl MobileMoneyAdapter {
    pub fn new(config: MobileMoneyConfig) -> ProviderResult<Self> {
        let http = ProviderHttpClient::new(
            ProviderFamily::MobileMoney,
            Duration::from_secs(config.timeout_secs),
            config.max_retries,
        )?;
        Ok(Self { config, http })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    async fn acquire_token(&self) -> ProviderResult<String> {
        let credentials = base64::engine::general_purpose::STANDARD.encode(format!(
            "{}:{}",
            self.config.client_id, self.config.client_secret
        ));
        let basic = format!("Basic {}", credentials);
        let fields = [("grant_type", "client_credentials".to_string())];

        let token: TokenResponse = self
            .http
            .request_json(
                reqwest::Method::POST,
                &self.config.token_url,
                None,
                RequestBody::Form(&fields),
                &[("Authorization", basic.as_str())],
            )
            .await?;

        if token.access_token.is_empty() {
            return Err(ProviderError::InvalidResponse {
                family: ProviderFamily::MobileMoney,
                message: "token endpoint returned an empty access token".to_string(),
            });
        }
        Ok(token.access_token)
    }

    fn wire_method(method: PaymentMethod) -> ProviderResult<&'static str> {
        match method {
            PaymentMethod::MobileMoneyPush => Ok("MOBILE_PUSH"),
            PaymentMethod::BankReference => Ok("BANK_REFERENCE"),
            other => Err(ProviderError::UnsupportedMethod {
                method: other.to_string(),
            }),
        }
    }

    fn map_status(raw: &str) -> PaymentStatus {
        match raw.to_uppercase().as_str() {
            "SUCCESS" | "COMPLETED" | "ACCEPTED" => PaymentStatus::Completed,
            "FAILED" | "DECLINED" | "REJECTED" => PaymentStatus::Failed,
            "EXPIRED" => PaymentStatus::Expired,
            _ => PaymentStatus::Pending,
        }
    }
}

#[async_trait]
impl ProviderAdapter for MobileMoneyAdapter {
    async fn create_charge(&self, request: ChargeRequest) -> ProviderResult<ChargeOutcome> {
        let wire_method = Self::wire_method(request.method)?;
        let token = self.acquire_token().await?;

        let payload = serde_json::json!({
            "merchantTransactionId": request.merchant_reference,
            "amount": request.amount.to_string(),
            "currency": request.currency,
            "paymentMethod": wire_method,
            "customer": {
                "name": request.customer_name,
                "email": request.customer_email,
                "phoneNumber": request.customer_phone,
            },
        });

        let raw: ChargeEnvelope = self
            .http
            .request_json(
                reqwest::Method::POST,
                &self.endpoint("/v1/charges"),
                Some(&token),
                RequestBody::Json(&payload),
                &[("Content-Type", "application/json")],
            )
            .await?;

        let reference = match (raw.reference_entity, raw.reference_number) {
            (Some(entity), Some(number)) => Some(ReferencePair { entity, number }),
            _ => None,
        };
        if request.method == PaymentMethod::BankReference && reference.is_none() {
            return Err(ProviderError::InvalidResponse {
                family: ProviderFamily::MobileMoney,
                message: "processor did not issue an entity/reference pair".to_string(),
            });
        }

        info!(
            merchant_reference = %request.merchant_reference,
            provider_id = %raw.id,
            "mobile money charge created"
        );

        Ok(ChargeOutcome {
            provider_transaction_id: Some(raw.id),
            status: Self::map_status(&raw.status),
            reference,
            client_secret: None,
            provider_data: raw.extra,
        })
    }

    fn family(&self) -> ProviderFamily {
        ProviderFamily::MobileMoney
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[allow(dead_code)]
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ChargeEnvelope {
    id: String,
    status: String,
    #[serde(default, rename = "referenceEntity")]
    reference_entity: Option<String>,
    #[serde(default, rename = "referenceNumber")]
    reference_number: Option<String>,
    #[serde(default)]
    extra: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_method_rejects_card_rail_methods() {
        assert_eq!(
            MobileMoneyAdapter::wire_method(PaymentMethod::MobileMoneyPush).unwrap(),
            "MOBILE_PUSH"
        );
        assert!(MobileMoneyAdapter::wire_method(PaymentMethod::Card).is_err());
    }

    #[test]
    fn status_mapping_covers_processor_vocabulary() {
        assert_eq!(
            MobileMoneyAdapter::map_status("ACCEPTED"),
            PaymentStatus::Completed
        );
        assert_eq!(
            MobileMoneyAdapter::map_status("declined"),
            PaymentStatus::Failed
        );
        assert_eq!(
            MobileMoneyAdapter::map_status("IN_PROGRESS"),
            PaymentStatus::Pending
        );
    }

    #[test]
    fn charge_envelope_deserializes_reference_fields() {
        let parsed: ChargeEnvelope = serde_json::from_value(serde_json::json!({
            "id": "mm_123",
            "status": "PENDING",
            "referenceEntity": "10245",
            "referenceNumber": "123456789"
        }))
        .expect("envelope should parse");
        assert_eq!(parsed.reference_entity.as_deref(), Some("10245"));
        assert_eq!(parsed.reference_number.as_deref(), Some("123456789"));
    }
}
