//! Partner authentication and per-request rate accounting.
//!
//! Every protected route goes through here: the `x-api-key` header is
//! resolved to an approved partner, the fixed-window limiter is charged,
//! and the response gains `x-ratelimit-*` plus `x-sandbox-mode` headers.
//!
//! Test keys (`pg_test_...`) are normalized to their live form before the
//! lookup, so one partner row serves both modes; the original prefix decides
//! whether the request runs in sandbox.

use crate::api::AppState;
use crate::database::partner_store::Partner;
use crate::error::AppError;
use crate::middleware::rate_limit::RateLimitDecision;
use axum::{
    extract::{Request, State},
    http::HeaderValue,
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use uuid::Uuid;

pub const LIVE_KEY_PREFIX: &str = "pg_live_";
pub const TEST_KEY_PREFIX: &str = "pg_test_";

/// The authenticated partner, available to handlers as a request extension.
#[derive(Debug, Clone)]
pub struct PartnerContext {
    pub partner: Partner,
    pub sandbox: bool,
}

/// Response extension consumed by the usage logger.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedPartner(pub Uuid);

/// Strip the test prefix so test keys resolve to the same partner row as
/// their live counterpart. Returns the lookup key and the sandbox flag.
fn normalize_api_key(raw: &str) -> (String, bool) {
    match raw.strip_prefix(TEST_KEY_PREFIX) {
        Some(rest) => (format!("{}{}", LIVE_KEY_PREFIX, rest), true),
        None => (raw.to_string(), false),
    }
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let raw_key = match request
        .headers()
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
    {
        Some(key) => key.to_string(),
        None => return AppError::MissingApiKey.into_response(),
    };

    let (lookup_key, sandbox) = normalize_api_key(&raw_key);

    let partner = match state.stores.partners.find_approved_by_api_key(&lookup_key).await {
        Ok(Some(partner)) => partner,
        Ok(None) => return AppError::InvalidApiKey.into_response(),
        Err(err) => return AppError::from(err).into_response(),
    };

    let decision = state.rate_limiter.check(partner.id);
    if !decision.allowed {
        let error = AppError::RateLimitExceeded {
            retry_after_secs: decision.retry_after_secs(Utc::now()),
        };
        let mut response = error.into_response();
        // the partner was resolved, so the usage log still attributes the call
        response
            .extensions_mut()
            .insert(AuthenticatedPartner(partner.id));
        apply_headers(&mut response, &decision, sandbox);
        return response;
    }

    let partner_id = partner.id;
    request
        .extensions_mut()
        .insert(PartnerContext { partner, sandbox });

    let mut response = next.run(request).await;
    response
        .extensions_mut()
        .insert(AuthenticatedPartner(partner_id));
    apply_headers(&mut response, &decision, sandbox);
    response
}

fn apply_headers(response: &mut Response, decision: &RateLimitDecision, sandbox: bool) {
    let headers = response.headers_mut();
    if let Ok(v) = HeaderValue::from_str(&decision.limit.to_string()) {
        headers.insert("x-ratelimit-limit", v);
    }
    if let Ok(v) = HeaderValue::from_str(&decision.remaining.to_string()) {
        headers.insert("x-ratelimit-remaining", v);
    }
    if let Ok(v) = HeaderValue::from_str(&decision.reset_at.timestamp().to_string()) {
        headers.insert("x-ratelimit-reset", v);
    }
    headers.insert(
        "x-sandbox-mode",
        HeaderValue::from_static(if sandbox { "true" } else { "false" }),
    );
}
