//! Application configuration module
//! Handles environment variable loading and application settings.

use std::env;

/// Main application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub rate_limit: RateLimitConfig,
    pub gateway: GatewayConfig,
    pub notifications: NotificationSecrets,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Fixed-window rate limiting, per partner.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window_secs: u64,
}

/// Gateway-wide settings.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Currency assumed when a create-payment request omits one.
    pub base_currency: String,
    /// Webhook delivery timeout, seconds.
    pub webhook_timeout_secs: u64,
}

/// Shared secrets for verifying inbound processor notifications, one per
/// provider family. A notification for a family with a configured secret
/// must carry a valid signature; without a secret the notification is
/// accepted unsigned (local development and sandbox-only deployments).
#[derive(Debug, Clone, Default)]
pub struct NotificationSecrets {
    pub mobile_money: Option<String>,
    pub card_rail: Option<String>,
}

impl NotificationSecrets {
    pub fn secret_for(&self, provider: &str) -> Option<&str> {
        match provider {
            "mobile_money" => self.mobile_money.as_deref(),
            "card_rail" => self.card_rail.as_deref(),
            _ => None,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 100,
            window_secs: 60,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            server: ServerConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("PORT")
                    .ok()
                    .and_then(|v| v.parse::<u16>().ok())
                    .unwrap_or(8080),
            },
            rate_limit: RateLimitConfig {
                max_requests: env::var("RATE_LIMIT_MAX_REQUESTS")
                    .ok()
                    .and_then(|v| v.parse::<u32>().ok())
                    .unwrap_or(100),
                window_secs: env::var("RATE_LIMIT_WINDOW_SECS")
                    .ok()
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(60),
            },
            gateway: GatewayConfig {
                base_currency: env::var("BASE_CURRENCY").unwrap_or_else(|_| "AOA".to_string()),
                webhook_timeout_secs: env::var("WEBHOOK_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(10),
            },
            notifications: NotificationSecrets {
                mobile_money: env::var("MOBILE_MONEY_NOTIFICATION_SECRET").ok(),
                card_rail: env::var("CARD_RAIL_NOTIFICATION_SECRET").ok(),
            },
        }
    }
}
