use crate::providers::error::ProviderError;
use chrono::Duration;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::str::FromStr;

/// Downstream processor family a payment method is routed to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProviderFamily {
    MobileMoney,
    CardRail,
}

impl ProviderFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderFamily::MobileMoney => "mobile_money",
            ProviderFamily::CardRail => "card_rail",
        }
    }
}

impl std::fmt::Display for ProviderFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    MobileMoneyPush,
    BankReference,
    Card,
    PushToPhoneEu,
    MultiBankReferenceEu,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::MobileMoneyPush => "mobile_money_push",
            PaymentMethod::BankReference => "bank_reference",
            PaymentMethod::Card => "card",
            PaymentMethod::PushToPhoneEu => "push_to_phone_eu",
            PaymentMethod::MultiBankReferenceEu => "multi_bank_reference_eu",
        }
    }

    pub fn family(&self) -> ProviderFamily {
        match self {
            PaymentMethod::MobileMoneyPush | PaymentMethod::BankReference => {
                ProviderFamily::MobileMoney
            }
            PaymentMethod::Card
            | PaymentMethod::PushToPhoneEu
            | PaymentMethod::MultiBankReferenceEu => ProviderFamily::CardRail,
        }
    }

    /// Push-to-phone instruments need a phone number to push to.
    pub fn requires_phone(&self) -> bool {
        matches!(
            self,
            PaymentMethod::MobileMoneyPush | PaymentMethod::PushToPhoneEu
        )
    }

    /// Currency the downstream processor accepts, when it only accepts one.
    pub fn required_currency(&self) -> Option<&'static str> {
        match self {
            PaymentMethod::PushToPhoneEu | PaymentMethod::MultiBankReferenceEu => Some("EUR"),
            _ => None,
        }
    }

    /// Whether the customer is issued an entity/reference pair to pay
    /// out-of-band instead of confirming inline.
    pub fn is_reference_instrument(&self) -> bool {
        matches!(
            self,
            PaymentMethod::BankReference | PaymentMethod::MultiBankReferenceEu
        )
    }

    /// How long a created payment stays payable. Push prompts die in
    /// minutes, card holds last a day, printable references two days.
    pub fn expiry_horizon(&self) -> Duration {
        match self {
            PaymentMethod::MobileMoneyPush | PaymentMethod::PushToPhoneEu => Duration::minutes(15),
            PaymentMethod::Card => Duration::hours(24),
            PaymentMethod::BankReference | PaymentMethod::MultiBankReferenceEu => {
                Duration::hours(48)
            }
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = ProviderError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "mobile_money_push" => Ok(PaymentMethod::MobileMoneyPush),
            "bank_reference" => Ok(PaymentMethod::BankReference),
            "card" => Ok(PaymentMethod::Card),
            "push_to_phone_eu" => Ok(PaymentMethod::PushToPhoneEu),
            "multi_bank_reference_eu" => Ok(PaymentMethod::MultiBankReferenceEu),
            _ => Err(ProviderError::UnsupportedMethod {
                method: value.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Expired,
    Cancelled,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Expired => "expired",
            PaymentStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = ProviderError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "pending" => Ok(PaymentStatus::Pending),
            "completed" => Ok(PaymentStatus::Completed),
            "failed" => Ok(PaymentStatus::Failed),
            "expired" => Ok(PaymentStatus::Expired),
            "cancelled" => Ok(PaymentStatus::Cancelled),
            _ => Err(ProviderError::UnsupportedMethod {
                method: format!("status:{}", value),
            }),
        }
    }
}

/// Entity/reference pair the customer pays against at an ATM or banking app.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReferencePair {
    pub entity: String,
    pub number: String,
}

/// Provider-agnostic charge request handed to an adapter.
#[derive(Debug, Clone)]
pub struct ChargeRequest {
    pub merchant_reference: String,
    pub amount: Decimal,
    pub currency: String,
    pub method: PaymentMethod,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: Option<String>,
    pub return_url: Option<String>,
    pub cancel_url: Option<String>,
}

/// What an adapter learned from the processor about a charge attempt.
#[derive(Debug, Clone)]
pub struct ChargeOutcome {
    pub provider_transaction_id: Option<String>,
    pub status: PaymentStatus,
    pub reference: Option<ReferencePair>,
    pub client_secret: Option<String>,
    pub provider_data: Option<JsonValue>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_routing_matches_family() {
        assert_eq!(
            PaymentMethod::MobileMoneyPush.family(),
            ProviderFamily::MobileMoney
        );
        assert_eq!(
            PaymentMethod::BankReference.family(),
            ProviderFamily::MobileMoney
        );
        assert_eq!(PaymentMethod::Card.family(), ProviderFamily::CardRail);
        assert_eq!(
            PaymentMethod::MultiBankReferenceEu.family(),
            ProviderFamily::CardRail
        );
    }

    #[test]
    fn push_methods_require_phone() {
        assert!(PaymentMethod::MobileMoneyPush.requires_phone());
        assert!(PaymentMethod::PushToPhoneEu.requires_phone());
        assert!(!PaymentMethod::Card.requires_phone());
        assert!(!PaymentMethod::BankReference.requires_phone());
    }

    #[test]
    fn expiry_horizons_are_ordered_by_method_class() {
        assert!(
            PaymentMethod::MobileMoneyPush.expiry_horizon() < PaymentMethod::Card.expiry_horizon()
        );
        assert!(
            PaymentMethod::Card.expiry_horizon() < PaymentMethod::BankReference.expiry_horizon()
        );
        assert_eq!(
            PaymentMethod::BankReference.expiry_horizon(),
            Duration::hours(48)
        );
    }

    #[test]
    fn eu_methods_are_pinned_to_eur() {
        assert_eq!(PaymentMethod::PushToPhoneEu.required_currency(), Some("EUR"));
        assert_eq!(
            PaymentMethod::MultiBankReferenceEu.required_currency(),
            Some("EUR")
        );
        assert_eq!(PaymentMethod::MobileMoneyPush.required_currency(), None);
    }

    #[test]
    fn method_parses_from_wire_name() {
        assert_eq!(
            PaymentMethod::from_str("mobile_money_push").unwrap(),
            PaymentMethod::MobileMoneyPush
        );
        assert!(PaymentMethod::from_str("carrier_pigeon").is_err());
    }

    #[test]
    fn only_pending_is_non_terminal() {
        assert!(!PaymentStatus::Pending.is_terminal());
        assert!(PaymentStatus::Completed.is_terminal());
        assert!(PaymentStatus::Expired.is_terminal());
    }
}
