//! Card-network processor adapter. Charges are modeled as payment intents:
//! auto-confirmed for push-to-phone and multi-bank-reference instruments
//! (the customer acts outside this system's UI), manually confirmed for
//! plain card so a frontend can complete the flow with the client secret.

use crate::providers::adapter::ProviderAdapter;
use crate::providers::error::{ProviderError, ProviderResult};
use crate::providers::http::{ProviderHttpClient, RequestBody};
use crate::providers::types::{
    ChargeOutcome, ChargeRequest, PaymentMethod, PaymentStatus, ProviderFamily, ReferencePair,
};
use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone)]
pub struct CardRailConfig {
    pub secret_key: String,
    pub base_url: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl CardRailConfig {
    pub fn from_env() -> Option<Self> {
        let secret_key = std::env::var("CARD_RAIL_SECRET_KEY").ok()?;
        Some(Self {
            secret_key,
            base_url: std::env::var("CARD_RAIL_BASE_URL")
                .unwrap_or_else(|_| "https://api.cardrail.example".to_string()),
            timeout_secs: std::env::var("CARD_RAIL_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(30),
            max_retries: std::env::var("CARD_RAIL_MAX_RETRIES")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(2),
        })
    }
}

pub struct CardRailAdapter {
    config: CardRailConfig,
    http: ProviderHttpClient,
}

impl CardRailAdapter {
    pub fn new(config: CardRailConfig) -> ProviderResult<Self> {
        let http = ProviderHttpClient::new(
            ProviderFamily::CardRail,
            Duration::from_secs(config.timeout_secs),
            config.max_retries,
        )?;
        Ok(Self { config, http })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    fn intent_method(method: PaymentMethod) -> ProviderResult<&'static str> {
        match method {
            PaymentMethod::Card => Ok("card"),
            PaymentMethod::PushToPhoneEu => Ok("phone_push"),
            PaymentMethod::MultiBankReferenceEu => Ok("multi_bank_reference"),
            other => Err(ProviderError::UnsupportedMethod {
                method: other.to_string(),
            }),
        }
    }

    /// Push and reference instruments confirm outside our UI, so the intent
    /// is created already confirmed. Plain card hands back a client secret.
    fn auto_confirm(method: PaymentMethod) -> bool {
        matches!(
            method,
            PaymentMethod::PushToPhoneEu | PaymentMethod::MultiBankReferenceEu
        )
    }

    fn minor_units(amount: Decimal) -> ProviderResult<i64> {
        (amount * Decimal::from(100))
            .round()
            .to_i64()
            .ok_or(ProviderError::InvalidResponse {
                family: ProviderFamily::CardRail,
                message: format!("amount {} does not fit in minor units", amount),
            })
    }

    fn map_status(raw: &str) -> PaymentStatus {
        match raw {
            "succeeded" => PaymentStatus::Completed,
            "canceled" => PaymentStatus::Cancelled,
            _ => PaymentStatus::Pending,
        }
    }
}

#[async_trait]
impl ProviderAdapter for CardRailAdapter {
    async fn create_charge(&self, request: ChargeRequest) -> ProviderResult<ChargeOutcome> {
        let intent_method = Self::intent_method(request.method)?;
        let amount_minor = Self::minor_units(request.amount)?;

        let mut fields: Vec<(&str, String)> = vec![
            ("amount", amount_minor.to_string()),
            ("currency", request.currency.to_lowercase()),
            ("payment_method_types[]", intent_method.to_string()),
            (
                "metadata[merchant_reference]",
                request.merchant_reference.clone(),
            ),
            ("receipt_email", request.customer_email.clone()),
        ];
        if Self::auto_confirm(request.method) {
            fields.push(("confirm", "true".to_string()));
            if let Some(phone) = &request.customer_phone {
                fields.push(("payment_method_options[phone]", phone.clone()));
            }
        }
        if let Some(url) = &request.return_url {
            fields.push(("return_url", url.clone()));
        }

        let raw: PaymentIntent = self
            .http
            .request_json(
                reqwest::Method::POST,
                &self.endpoint("/v1/payment_intents"),
                Some(&self.config.secret_key),
                RequestBody::Form(&fields),
                &[],
            )
            .await?;

        let reference = raw.next_action.as_ref().and_then(|action| {
            action
                .reference_details
                .as_ref()
                .map(|details| ReferencePair {
                    entity: details.entity.clone(),
                    number: details.reference.clone(),
                })
        });
        if request.method == PaymentMethod::MultiBankReferenceEu && reference.is_none() {
            return Err(ProviderError::InvalidResponse {
                family: ProviderFamily::CardRail,
                message: "processor did not issue an entity/reference pair".to_string(),
            });
        }

        info!(
            merchant_reference = %request.merchant_reference,
            intent_id = %raw.id,
            "card rail payment intent created"
        );

        Ok(ChargeOutcome {
            provider_transaction_id: Some(raw.id),
            status: Self::map_status(&raw.status),
            reference,
            client_secret: raw.client_secret,
            provider_data: None,
        })
    }

    fn family(&self) -> ProviderFamily {
        ProviderFamily::CardRail
    }
}

#[derive(Debug, Deserialize)]
struct PaymentIntent {
    id: String,
    status: String,
    #[serde(default)]
    client_secret: Option<String>,
    #[serde(default)]
    next_action: Option<NextAction>,
}

#[derive(Debug, Deserialize)]
struct NextAction {
    #[serde(default, rename = "display_bank_reference_details")]
    reference_details: Option<BankReferenceDetails>,
}

#[derive(Debug, Deserialize)]
struct BankReferenceDetails {
    entity: String,
    reference: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn minor_units_rounds_decimal_amounts() {
        assert_eq!(
            CardRailAdapter::minor_units(Decimal::from_str("12.34").unwrap()).unwrap(),
            1234
        );
        assert_eq!(
            CardRailAdapter::minor_units(Decimal::from(5000)).unwrap(),
            500_000
        );
    }

    #[test]
    fn only_out_of_ui_methods_auto_confirm() {
        assert!(CardRailAdapter::auto_confirm(PaymentMethod::PushToPhoneEu));
        assert!(CardRailAdapter::auto_confirm(
            PaymentMethod::MultiBankReferenceEu
        ));
        assert!(!CardRailAdapter::auto_confirm(PaymentMethod::Card));
    }

    #[test]
    fn intent_method_rejects_mobile_money_methods() {
        assert!(CardRailAdapter::intent_method(PaymentMethod::MobileMoneyPush).is_err());
        assert_eq!(
            CardRailAdapter::intent_method(PaymentMethod::Card).unwrap(),
            "card"
        );
    }

    #[test]
    fn payment_intent_parses_reference_details() {
        let parsed: PaymentIntent = serde_json::from_value(serde_json::json!({
            "id": "pi_123",
            "status": "requires_action",
            "client_secret": "pi_123_secret",
            "next_action": {
                "display_bank_reference_details": {
                    "entity": "11249",
                    "reference": "123456789"
                }
            }
        }))
        .expect("intent should parse");
        let details = parsed.next_action.unwrap().reference_details.unwrap();
        assert_eq!(details.entity, "11249");
        assert_eq!(CardRailAdapter::map_status(&parsed.status), PaymentStatus::Pending);
    }
}
