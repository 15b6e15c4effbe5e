//! End-to-end tests over the full router with in-memory stores.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::Utc;
use http_body_util::BodyExt;
use paygate::config::{
    AppConfig, GatewayConfig, NotificationSecrets, RateLimitConfig, ServerConfig,
};
use paygate::database::memory::{
    InMemoryPartnerStore, InMemoryPaymentStore, InMemoryRefundStore, InMemoryUsageLogStore,
};
use paygate::database::partner_store::{Partner, PartnerStatus};
use paygate::database::Stores;
use paygate::middleware::auth::AuthenticatedPartner;
use paygate::services::webhooks::sign;
use paygate::{router, AppState};
use rust_decimal::Decimal;
use serde_json::{json, Value as JsonValue};
use std::collections::HashMap;
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

const LIVE_KEY: &str = "pg_live_abc123";
const TEST_KEY: &str = "pg_test_abc123";

fn config(rate_limit: u32) -> AppConfig {
    AppConfig {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        rate_limit: RateLimitConfig {
            max_requests: rate_limit,
            window_secs: 60,
        },
        gateway: GatewayConfig {
            base_currency: "AOA".to_string(),
            webhook_timeout_secs: 10,
        },
        notifications: NotificationSecrets::default(),
    }
}

fn partner() -> Partner {
    Partner {
        id: Uuid::new_v4(),
        name: "Acme Store".to_string(),
        api_key: LIVE_KEY.to_string(),
        status: PartnerStatus::Approved,
        webhook_url: None,
        webhook_secret: None,
        commission_rate: Decimal::ZERO,
        created_at: Utc::now(),
    }
}

async fn gateway_with_config(partners: Vec<Partner>, config: AppConfig) -> (Router, Stores) {
    let partner_store = Arc::new(InMemoryPartnerStore::new());
    for p in partners {
        partner_store.add(p).await;
    }
    let stores = Stores {
        partners: partner_store,
        payments: Arc::new(InMemoryPaymentStore::new()),
        refunds: Arc::new(InMemoryRefundStore::new()),
        usage_logs: Arc::new(InMemoryUsageLogStore::new()),
    };
    let state = AppState::new(config, stores.clone(), HashMap::new());
    (router(state), stores)
}

async fn gateway_with(partners: Vec<Partner>, rate_limit: u32) -> (Router, Stores) {
    gateway_with_config(partners, config(rate_limit)).await
}

async fn gateway() -> (Router, Partner, Stores) {
    let p = partner();
    let (app, stores) = gateway_with(vec![p.clone()], 100).await;
    (app, p, stores)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, JsonValue, axum::http::HeaderMap) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        JsonValue::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(JsonValue::Null)
    };
    (status, body, headers)
}

fn create_request(key: &str, body: JsonValue) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/")
        .header("content-type", "application/json")
        .header("x-api-key", key)
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get_request(key: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header("x-api-key", key)
        .body(Body::empty())
        .unwrap()
}

fn push_payment(order: &str, phone: &str) -> JsonValue {
    json!({
        "order_reference": order,
        "amount": 5000,
        "method": "mobile_money_push",
        "customer_name": "Ana Silva",
        "customer_email": "ana@example.com",
        "customer_phone": phone,
    })
}

#[tokio::test]
async fn missing_api_key_is_rejected() {
    let (app, _, _) = gateway().await;
    let request = Request::builder()
        .method("GET")
        .uri("/payments")
        .body(Body::empty())
        .unwrap();
    let (status, body, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "MISSING_API_KEY");
}

#[tokio::test]
async fn unknown_api_key_is_rejected() {
    let (app, _, _) = gateway().await;
    let (status, body, _) = send(&app, get_request("pg_live_nope", "/payments")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "INVALID_API_KEY");
}

#[tokio::test]
async fn sandbox_success_number_completes_and_is_queryable() {
    let (app, _, _) = gateway().await;

    let (status, body, headers) = send(
        &app,
        create_request(TEST_KEY, push_payment("order-1", "+244900000001")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(headers.get("x-sandbox-mode").unwrap(), "true");
    assert_eq!(body["payment"]["status"], "completed");
    let transaction_id = body["payment"]["providerTransactionId"].as_str().unwrap();
    assert!(transaction_id.starts_with("SBX-"));

    let id = body["payment"]["id"].as_str().unwrap();
    let (status, body, _) = send(&app, get_request(TEST_KEY, &format!("/payment/{}", id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["payment"]["status"], "completed");
    assert_eq!(
        body["payment"]["providerTransactionId"].as_str().unwrap(),
        transaction_id
    );
}

#[tokio::test]
async fn sandbox_failed_and_pending_numbers_are_deterministic() {
    let (app, _, _) = gateway().await;

    let (_, failed, _) = send(
        &app,
        create_request(TEST_KEY, push_payment("order-f", "+244900000002")),
    )
    .await;
    assert_eq!(failed["payment"]["status"], "failed");

    let (_, pending, _) = send(
        &app,
        create_request(TEST_KEY, push_payment("order-p", "+244900000003")),
    )
    .await;
    assert_eq!(pending["payment"]["status"], "pending");

    let (_, unknown, _) = send(
        &app,
        create_request(TEST_KEY, push_payment("order-u", "+244912345678")),
    )
    .await;
    assert_eq!(unknown["payment"]["status"], "pending");
}

#[tokio::test]
async fn duplicate_order_reference_returns_conflict_with_existing_payment() {
    let (app, _, _) = gateway().await;

    let (status, first, _) = send(
        &app,
        create_request(TEST_KEY, push_payment("order-1", "+244900000001")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, second, _) = send(
        &app,
        create_request(TEST_KEY, push_payment("order-1", "+244900000001")),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(second["code"], "DUPLICATE_ORDER_ID");
    assert_eq!(second["existingPayment"]["id"], first["payment"]["id"]);
    assert_eq!(second["existingPayment"]["status"], "completed");
}

#[tokio::test]
async fn rate_limit_rejects_over_the_window_budget() {
    let p = partner();
    let partner_id = p.id;
    let (app, _) = gateway_with(vec![p], 3).await;

    for _ in 0..3 {
        let (status, _, _) = send(&app, get_request(LIVE_KEY, "/payments")).await;
        assert_eq!(status, StatusCode::OK);
    }

    let response = app
        .clone()
        .oneshot(get_request(LIVE_KEY, "/payments"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    // the resolved partner stays attributed even on the rejected call
    assert_eq!(
        response
            .extensions()
            .get::<AuthenticatedPartner>()
            .map(|p| p.0),
        Some(partner_id)
    );
    let headers = response.headers().clone();
    assert_eq!(headers.get("x-ratelimit-remaining").unwrap(), "0");
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: JsonValue = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["code"], "RATE_LIMIT_EXCEEDED");
    assert!(body["retryAfter"].is_number());
}

#[tokio::test]
async fn validation_errors_carry_the_field() {
    let (app, _, _) = gateway().await;

    let (status, body, _) = send(
        &app,
        create_request(
            TEST_KEY,
            json!({
                "order_reference": "order-1",
                "amount": 5000,
                "method": "carrier_pigeon",
                "customer_name": "Ana",
                "customer_email": "ana@example.com",
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert_eq!(body["field"], "method");

    // push method without a phone number
    let (status, body, _) = send(
        &app,
        create_request(
            TEST_KEY,
            json!({
                "order_reference": "order-2",
                "amount": 5000,
                "method": "mobile_money_push",
                "customer_name": "Ana",
                "customer_email": "ana@example.com",
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "customer_phone");
}

#[tokio::test]
async fn cross_partner_lookup_is_not_found() {
    let owner = partner();
    let mut other = partner();
    other.id = Uuid::new_v4();
    other.api_key = "pg_live_other".to_string();
    let (app, _) = gateway_with(vec![owner, other], 100).await;

    let (_, created, _) = send(
        &app,
        create_request(TEST_KEY, push_payment("order-1", "+244900000001")),
    )
    .await;
    let id = created["payment"]["id"].as_str().unwrap();

    let (status, body, _) = send(
        &app,
        get_request("pg_test_other", &format!("/payment/{}", id)),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn listing_returns_totals_beyond_the_page() {
    let (app, _, _) = gateway().await;

    for i in 0..3 {
        let (status, _, _) = send(
            &app,
            create_request(
                TEST_KEY,
                push_payment(&format!("order-{}", i), "+244900000001"),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body, _) = send(&app, get_request(TEST_KEY, "/payments?limit=2")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["payments"].as_array().unwrap().len(), 2);
    assert_eq!(body["total"], 3);

    let (_, filtered, _) = send(
        &app,
        get_request(TEST_KEY, "/payments?status=completed&limit=10"),
    )
    .await;
    assert_eq!(filtered["total"], 3);
}

#[tokio::test]
async fn refund_rules_are_enforced_end_to_end() {
    let (app, _, _) = gateway().await;

    // completed payment: refund clamps to the original amount
    let (_, completed, _) = send(
        &app,
        create_request(TEST_KEY, push_payment("order-ok", "+244900000001")),
    )
    .await;
    let completed_id = completed["payment"]["id"].as_str().unwrap();

    let refund_request = Request::builder()
        .method("POST")
        .uri("/refunds")
        .header("content-type", "application/json")
        .header("x-api-key", TEST_KEY)
        .body(Body::from(
            json!({ "payment_id": completed_id, "amount": 99999 }).to_string(),
        ))
        .unwrap();
    let (status, body, _) = send(&app, refund_request).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["refund"]["amount"], "5000");
    assert_eq!(body["refund"]["status"], "pending");

    // pending payment: not refundable
    let (_, pending, _) = send(
        &app,
        create_request(TEST_KEY, push_payment("order-pend", "+244900000003")),
    )
    .await;
    let pending_id = pending["payment"]["id"].as_str().unwrap();

    let refund_request = Request::builder()
        .method("POST")
        .uri("/refunds")
        .header("content-type", "application/json")
        .header("x-api-key", TEST_KEY)
        .body(Body::from(json!({ "payment_id": pending_id }).to_string()))
        .unwrap();
    let (status, body, _) = send(&app, refund_request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_PAYMENT_STATUS");

    let (_, listing, _) = send(&app, get_request(TEST_KEY, "/refunds")).await;
    assert_eq!(listing["total"], 1);
}

#[tokio::test]
async fn balance_reflects_completed_payments_and_is_idempotent() {
    let (app, _, _) = gateway().await;

    send(
        &app,
        create_request(TEST_KEY, push_payment("order-1", "+244900000001")),
    )
    .await;
    send(
        &app,
        create_request(TEST_KEY, push_payment("order-2", "+244900000003")),
    )
    .await;

    let (status, first, _) = send(&app, get_request(TEST_KEY, "/balance")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["available"], "5000");
    assert_eq!(first["pending"], "5000");
    assert_eq!(first["currency"], "AOA");

    let (_, second, _) = send(&app, get_request(TEST_KEY, "/balance")).await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn provider_notification_completes_a_pending_payment() {
    let (app, p, stores) = gateway().await;

    let (_, created, _) = send(
        &app,
        create_request(TEST_KEY, push_payment("order-1", "+244900000003")),
    )
    .await;
    assert_eq!(created["payment"]["status"], "pending");
    let id: Uuid = created["payment"]["id"].as_str().unwrap().parse().unwrap();

    // the merchant reference travels only between gateway and processor
    let merchant_reference = stores
        .payments
        .find_by_id(p.id, id)
        .await
        .unwrap()
        .unwrap()
        .merchant_reference;

    let notification = Request::builder()
        .method("POST")
        .uri("/notifications/mobile_money")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({
                "merchantTransactionId": merchant_reference,
                "id": "MM-777",
                "status": "ACCEPTED",
            })
            .to_string(),
        ))
        .unwrap();
    let (status, body, _) = send(&app, notification).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["applied"], true);

    let (_, fetched, _) = send(&app, get_request(TEST_KEY, &format!("/payment/{}", id))).await;
    assert_eq!(fetched["payment"]["status"], "completed");
}

#[tokio::test]
async fn notification_signature_is_enforced_when_a_secret_is_configured() {
    let p = partner();
    let partner_id = p.id;
    let mut cfg = config(100);
    cfg.notifications = NotificationSecrets {
        mobile_money: Some("whsec_mm".to_string()),
        card_rail: None,
    };
    let (app, stores) = gateway_with_config(vec![p], cfg).await;

    let (_, created, _) = send(
        &app,
        create_request(TEST_KEY, push_payment("order-1", "+244900000003")),
    )
    .await;
    let id: Uuid = created["payment"]["id"].as_str().unwrap().parse().unwrap();
    let merchant_reference = stores
        .payments
        .find_by_id(partner_id, id)
        .await
        .unwrap()
        .unwrap()
        .merchant_reference;

    let body = json!({
        "merchantTransactionId": merchant_reference,
        "status": "ACCEPTED",
    })
    .to_string();

    // no signature header: rejected before any state change
    let unsigned = Request::builder()
        .method("POST")
        .uri("/notifications/mobile_money")
        .header("content-type", "application/json")
        .body(Body::from(body.clone()))
        .unwrap();
    let (status, rejected, _) = send(&app, unsigned).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(rejected["code"], "INVALID_SIGNATURE");

    let untouched = stores
        .payments
        .find_by_id(partner_id, id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(untouched.status.as_str(), "pending");

    // signed over the exact body bytes: applied
    let signature = sign("whsec_mm", body.as_bytes());
    let signed = Request::builder()
        .method("POST")
        .uri("/notifications/mobile_money")
        .header("content-type", "application/json")
        .header("x-webhook-signature", signature)
        .body(Body::from(body))
        .unwrap();
    let (status, accepted, _) = send(&app, signed).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(accepted["applied"], true);

    let completed = stores
        .payments
        .find_by_id(partner_id, id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(completed.status.as_str(), "completed");
}

#[tokio::test]
async fn webhook_test_without_configured_url_is_a_validation_error() {
    let (app, _, _) = gateway().await;
    let request = Request::builder()
        .method("POST")
        .uri("/webhooks/test")
        .header("x-api-key", TEST_KEY)
        .body(Body::empty())
        .unwrap();
    let (status, body, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn bank_reference_sandbox_payment_issues_a_reference_pair() {
    let (app, _, _) = gateway().await;
    let (status, body, _) = send(
        &app,
        create_request(
            TEST_KEY,
            json!({
                "order_reference": "order-ref",
                "amount": 12000,
                "method": "bank_reference",
                "customer_name": "Ana Silva",
                "customer_email": "ana@example.com",
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["payment"]["status"], "pending");
    let reference = &body["payment"]["reference"];
    assert!(reference["entity"].is_string());
    assert!(reference["number"].is_string());
    assert!(body["instructions"].as_str().unwrap().contains("entity"));
}

#[tokio::test]
async fn live_mode_without_adapter_is_a_configuration_error() {
    let (app, _, _) = gateway().await;
    let (status, body, headers) = send(
        &app,
        create_request(LIVE_KEY, push_payment("order-1", "+244912345678")),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "MOBILE_MONEY_NOT_CONFIGURED");
    assert_eq!(headers.get("x-sandbox-mode").unwrap(), "false");
}
