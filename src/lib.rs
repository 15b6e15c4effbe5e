//! Payment orchestration gateway.
//!
//! Accepts provider-agnostic create-payment requests from partner systems,
//! routes them to the right downstream processor, tracks the payment
//! lifecycle, computes balances and statistics, records refunds, and
//! delivers signed status webhooks back to partners.

pub mod api;
pub mod config;
pub mod database;
pub mod error;
pub mod logging;
pub mod middleware;
pub mod providers;
pub mod services;

pub use crate::api::{router, AppState};
pub use crate::config::AppConfig;
pub use crate::error::{AppError, AppResult, ErrorCode};
