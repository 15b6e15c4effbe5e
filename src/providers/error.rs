use crate::providers::types::ProviderFamily;
use thiserror::Error;

pub type ProviderResult<T> = Result<T, ProviderError>;

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("{family} processor credentials are not configured")]
    NotConfigured { family: ProviderFamily },

    #[error("{family} request failed: {message}")]
    Network {
        family: ProviderFamily,
        message: String,
    },

    #[error("{family} rejected the charge: {message}")]
    Rejected {
        family: ProviderFamily,
        message: String,
        provider_code: Option<String>,
    },

    #[error("{family} returned an unusable response: {message}")]
    InvalidResponse {
        family: ProviderFamily,
        message: String,
    },

    #[error("unsupported payment method: {method}")]
    UnsupportedMethod { method: String },
}

impl ProviderError {
    pub fn family(&self) -> Option<ProviderFamily> {
        match self {
            ProviderError::NotConfigured { family }
            | ProviderError::Network { family, .. }
            | ProviderError::Rejected { family, .. }
            | ProviderError::InvalidResponse { family, .. } => Some(*family),
            ProviderError::UnsupportedMethod { .. } => None,
        }
    }

    /// Stable machine code surfaced to partners. Configuration errors are
    /// operator-fixable and distinct from transient processor failures.
    pub fn error_code(&self) -> &'static str {
        match self {
            ProviderError::NotConfigured {
                family: ProviderFamily::MobileMoney,
            } => "MOBILE_MONEY_NOT_CONFIGURED",
            ProviderError::NotConfigured {
                family: ProviderFamily::CardRail,
            } => "CARD_RAIL_NOT_CONFIGURED",
            ProviderError::Network { family, .. }
            | ProviderError::Rejected { family, .. }
            | ProviderError::InvalidResponse { family, .. } => match family {
                ProviderFamily::MobileMoney => "MOBILE_MONEY_FAILED",
                ProviderFamily::CardRail => "CARD_RAIL_FAILED",
            },
            ProviderError::UnsupportedMethod { .. } => "VALIDATION_ERROR",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            ProviderError::NotConfigured { .. } => 500,
            ProviderError::Network { .. }
            | ProviderError::Rejected { .. }
            | ProviderError::InvalidResponse { .. } => 502,
            ProviderError::UnsupportedMethod { .. } => 400,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, ProviderError::Network { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_errors_map_to_500_with_family_code() {
        let err = ProviderError::NotConfigured {
            family: ProviderFamily::MobileMoney,
        };
        assert_eq!(err.http_status(), 500);
        assert_eq!(err.error_code(), "MOBILE_MONEY_NOT_CONFIGURED");
        assert!(!err.is_retryable());
    }

    #[test]
    fn transient_failures_map_to_502() {
        let err = ProviderError::Network {
            family: ProviderFamily::CardRail,
            message: "connect timeout".to_string(),
        };
        assert_eq!(err.http_status(), 502);
        assert_eq!(err.error_code(), "CARD_RAIL_FAILED");
        assert!(err.is_retryable());
    }
}
