//! HTTP surface: state bundle and router assembly.

pub mod balance;
pub mod notifications;
pub mod payments;
pub mod refunds;
pub mod webhooks;

use crate::config::AppConfig;
use crate::database::Stores;
use crate::middleware::auth::auth_middleware;
use crate::middleware::rate_limit::RateLimiter;
use crate::middleware::usage_log::usage_log_middleware;
use crate::providers::adapter::ProviderAdapter;
use crate::providers::types::ProviderFamily;
use crate::services::notifications::NotificationService;
use crate::services::orchestrator::PaymentOrchestrator;
use crate::services::query::QueryService;
use crate::services::refunds::RefundService;
use crate::services::stats::StatsService;
use crate::services::webhooks::WebhookDispatcher;
use axum::{
    middleware,
    routing::{get, post},
    Json, Router,
};
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub stores: Stores,
    pub rate_limiter: Arc<RateLimiter>,
    pub orchestrator: Arc<PaymentOrchestrator>,
    pub query: Arc<QueryService>,
    pub stats: Arc<StatsService>,
    pub refunds: Arc<RefundService>,
    pub dispatcher: Arc<WebhookDispatcher>,
    pub notifications: Arc<NotificationService>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        stores: Stores,
        adapters: HashMap<ProviderFamily, Arc<dyn ProviderAdapter>>,
    ) -> Self {
        let dispatcher = Arc::new(WebhookDispatcher::new(
            stores.payments.clone(),
            config.gateway.webhook_timeout_secs,
        ));
        let orchestrator = Arc::new(PaymentOrchestrator::new(
            stores.payments.clone(),
            adapters,
            dispatcher.clone(),
            config.gateway.base_currency.clone(),
        ));
        let notifications = Arc::new(NotificationService::new(
            stores.payments.clone(),
            stores.partners.clone(),
            dispatcher.clone(),
            config.notifications.clone(),
        ));
        Self {
            rate_limiter: Arc::new(RateLimiter::new(&config.rate_limit)),
            query: Arc::new(QueryService::new(stores.payments.clone())),
            stats: Arc::new(StatsService::new(
                stores.payments.clone(),
                stores.refunds.clone(),
            )),
            refunds: Arc::new(RefundService::new(
                stores.payments.clone(),
                stores.refunds.clone(),
            )),
            orchestrator,
            dispatcher,
            notifications,
            config: Arc::new(config),
            stores,
        }
    }
}

pub fn router(state: AppState) -> Router {
    let partner_routes = Router::new()
        .route("/", post(payments::create_payment))
        .route("/payment/{id}", get(payments::get_payment))
        .route("/payments", get(payments::list_payments))
        .route("/balance", get(balance::get_balance))
        .route("/stats", get(balance::get_stats))
        .route(
            "/refunds",
            post(refunds::create_refund).get(refunds::list_refunds),
        )
        .route("/webhooks/test", post(webhooks::test_webhook))
        .route("/webhooks/resend", post(webhooks::resend_webhook))
        .route("/webhooks/logs", get(webhooks::webhook_logs))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .merge(partner_routes)
        .route(
            "/notifications/{provider}",
            post(notifications::provider_notification),
        )
        .route("/health", get(health))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            usage_log_middleware,
        ))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
