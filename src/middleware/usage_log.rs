//! API usage logging.
//!
//! Outermost layer: records endpoint, method, status, latency and caller
//! metadata for every request, authenticated or not. The write happens on a
//! spawned task so logging never adds latency to the response path, and a
//! failed write only warns.

use crate::api::AppState;
use crate::database::usage_log_store::UsageLogRecord;
use crate::middleware::auth::AuthenticatedPartner;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use std::time::Instant;
use uuid::Uuid;

pub async fn usage_log_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let started = Instant::now();
    let endpoint = request.uri().path().to_string();
    let method = request.method().to_string();
    let ip = client_ip(&request);
    let user_agent = request
        .headers()
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string());

    let response = next.run(request).await;

    let record = UsageLogRecord {
        id: Uuid::new_v4(),
        partner_id: response
            .extensions()
            .get::<AuthenticatedPartner>()
            .map(|p| p.0),
        endpoint,
        method,
        status_code: response.status().as_u16() as i32,
        latency_ms: started.elapsed().as_millis() as i64,
        ip,
        user_agent,
        created_at: Utc::now(),
    };

    let store = state.stores.usage_logs.clone();
    tokio::spawn(async move {
        if let Err(err) = store.append(record).await {
            tracing::warn!(error = %err, "failed to record usage log");
        }
    });

    response
}

fn client_ip(request: &Request) -> Option<String> {
    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
