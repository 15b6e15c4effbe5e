use crate::api::AppState;
use crate::error::AppError;
use crate::middleware::auth::PartnerContext;
use crate::services::query::clamp_page;
use crate::services::webhooks::WebhookLogView;
use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Extension, Json,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

/// POST /webhooks/test
pub async fn test_webhook(
    State(state): State<AppState>,
    Extension(ctx): Extension<PartnerContext>,
) -> Result<impl IntoResponse, AppError> {
    let result = state.dispatcher.send_test(&ctx.partner).await?;
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
pub struct ResendRequest {
    #[serde(alias = "paymentId")]
    payment_id: Uuid,
}

/// POST /webhooks/resend
pub async fn resend_webhook(
    State(state): State<AppState>,
    Extension(ctx): Extension<PartnerContext>,
    Json(request): Json<ResendRequest>,
) -> Result<impl IntoResponse, AppError> {
    let payment = state.query.get(ctx.partner.id, request.payment_id).await?;
    let result = state.dispatcher.resend(&ctx.partner, &payment)?;
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
pub struct LogsParams {
    limit: Option<i64>,
    offset: Option<i64>,
}

/// GET /webhooks/logs?limit&offset
pub async fn webhook_logs(
    State(state): State<AppState>,
    Extension(ctx): Extension<PartnerContext>,
    Query(params): Query<LogsParams>,
) -> Result<impl IntoResponse, AppError> {
    let (limit, offset) = clamp_page(params.limit, params.offset);
    let page = state
        .stores
        .payments
        .list_with_webhook_activity(ctx.partner.id, limit, offset)
        .await?;
    let logs: Vec<WebhookLogView> = page.items.iter().map(WebhookLogView::from_payment).collect();
    Ok(Json(json!({
        "logs": logs,
        "total": page.total,
    })))
}
