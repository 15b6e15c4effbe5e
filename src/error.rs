//! Gateway error taxonomy.
//!
//! One unified error type with HTTP status mapping, stable machine codes
//! for partner-side handling, and structured context that is flattened into
//! the error response body.

use crate::database::error::StoreError;
use crate::providers::error::ProviderError;
use crate::providers::types::{PaymentStatus, ProviderFamily};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use thiserror::Error;
use uuid::Uuid;

/// Machine-readable error codes surfaced in the `code` field.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorCode {
    #[serde(rename = "MISSING_API_KEY")]
    MissingApiKey,
    #[serde(rename = "INVALID_API_KEY")]
    InvalidApiKey,
    #[serde(rename = "INVALID_SIGNATURE")]
    InvalidSignature,
    #[serde(rename = "RATE_LIMIT_EXCEEDED")]
    RateLimitExceeded,
    #[serde(rename = "VALIDATION_ERROR")]
    ValidationError,
    #[serde(rename = "DUPLICATE_ORDER_ID")]
    DuplicateOrderId,
    #[serde(rename = "MOBILE_MONEY_NOT_CONFIGURED")]
    MobileMoneyNotConfigured,
    #[serde(rename = "MOBILE_MONEY_FAILED")]
    MobileMoneyFailed,
    #[serde(rename = "CARD_RAIL_NOT_CONFIGURED")]
    CardRailNotConfigured,
    #[serde(rename = "CARD_RAIL_FAILED")]
    CardRailFailed,
    #[serde(rename = "NOT_FOUND")]
    NotFound,
    #[serde(rename = "INVALID_PAYMENT_STATUS")]
    InvalidPaymentStatus,
    #[serde(rename = "INTERNAL_ERROR")]
    InternalError,
}

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Clone, Error)]
pub enum AppError {
    #[error("API key is required")]
    MissingApiKey,

    #[error("API key is invalid or the partner is not approved")]
    InvalidApiKey,

    #[error("Notification signature is missing or invalid")]
    InvalidSignature,

    #[error("Rate limit exceeded")]
    RateLimitExceeded { retry_after_secs: u64 },

    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("A payment already exists for order reference '{order_reference}'")]
    DuplicateOrderReference {
        order_reference: String,
        existing_id: Uuid,
        existing_status: PaymentStatus,
    },

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("{resource} not found")]
    NotFound { resource: &'static str },

    #[error("Payment in status '{status}' cannot be refunded")]
    InvalidPaymentStatus { status: PaymentStatus },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation {
            message: message.into(),
            field: None,
        }
    }

    pub fn validation_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        AppError::Validation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        AppError::Internal {
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            AppError::MissingApiKey | AppError::InvalidApiKey | AppError::InvalidSignature => 401,
            AppError::RateLimitExceeded { .. } => 429,
            AppError::Validation { .. } | AppError::InvalidPaymentStatus { .. } => 400,
            AppError::DuplicateOrderReference { .. } => 409,
            AppError::Provider(err) => err.http_status(),
            AppError::NotFound { .. } => 404,
            AppError::Internal { .. } => 500,
        }
    }

    pub fn error_code(&self) -> ErrorCode {
        match self {
            AppError::MissingApiKey => ErrorCode::MissingApiKey,
            AppError::InvalidApiKey => ErrorCode::InvalidApiKey,
            AppError::InvalidSignature => ErrorCode::InvalidSignature,
            AppError::RateLimitExceeded { .. } => ErrorCode::RateLimitExceeded,
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::DuplicateOrderReference { .. } => ErrorCode::DuplicateOrderId,
            AppError::Provider(err) => match (err.family(), err) {
                (Some(ProviderFamily::MobileMoney), ProviderError::NotConfigured { .. }) => {
                    ErrorCode::MobileMoneyNotConfigured
                }
                (Some(ProviderFamily::CardRail), ProviderError::NotConfigured { .. }) => {
                    ErrorCode::CardRailNotConfigured
                }
                (Some(ProviderFamily::MobileMoney), _) => ErrorCode::MobileMoneyFailed,
                (Some(ProviderFamily::CardRail), _) => ErrorCode::CardRailFailed,
                (None, _) => ErrorCode::ValidationError,
            },
            AppError::NotFound { .. } => ErrorCode::NotFound,
            AppError::InvalidPaymentStatus { .. } => ErrorCode::InvalidPaymentStatus,
            AppError::Internal { .. } => ErrorCode::InternalError,
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            AppError::Internal { .. } => {
                "An internal error occurred. Please try again later".to_string()
            }
            other => other.to_string(),
        }
    }

    /// Structured context merged into the error response body, so partners
    /// can reconcile (duplicate payments) or back off (rate limits)
    /// programmatically.
    pub fn context(&self) -> Map<String, JsonValue> {
        let mut context = Map::new();
        match self {
            AppError::RateLimitExceeded { retry_after_secs } => {
                context.insert(
                    "retryAfter".to_string(),
                    JsonValue::from(*retry_after_secs),
                );
            }
            AppError::Validation {
                field: Some(field), ..
            } => {
                context.insert("field".to_string(), JsonValue::from(field.clone()));
            }
            AppError::DuplicateOrderReference {
                existing_id,
                existing_status,
                ..
            } => {
                context.insert(
                    "existingPayment".to_string(),
                    serde_json::json!({
                        "id": existing_id,
                        "status": existing_status,
                    }),
                );
            }
            AppError::Provider(err) => {
                if let ProviderError::Rejected {
                    provider_code: Some(code),
                    ..
                } = err
                {
                    context.insert("providerCode".to_string(), JsonValue::from(code.clone()));
                }
            }
            _ => {}
        }
        context
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}
