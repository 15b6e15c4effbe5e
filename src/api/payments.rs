use crate::api::AppState;
use crate::error::AppError;
use crate::middleware::auth::PartnerContext;
use crate::services::orchestrator::{instructions_for, CreatePaymentRequest};
use crate::services::query::{ListPaymentsParams, PaymentView};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde_json::json;
use uuid::Uuid;

/// POST /
pub async fn create_payment(
    State(state): State<AppState>,
    Extension(ctx): Extension<PartnerContext>,
    Json(request): Json<CreatePaymentRequest>,
) -> Result<impl IntoResponse, AppError> {
    let payment = state.orchestrator.create_payment(&ctx, request).await?;
    let body = json!({
        "payment": PaymentView::from_payment(&payment),
        "instructions": instructions_for(&payment),
    });
    Ok((StatusCode::CREATED, Json(body)))
}

/// GET /payment/{id}
pub async fn get_payment(
    State(state): State<AppState>,
    Extension(ctx): Extension<PartnerContext>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let payment = state.query.get(ctx.partner.id, id).await?;
    Ok(Json(json!({ "payment": PaymentView::from_payment(&payment) })))
}

/// GET /payments?status&limit&offset
pub async fn list_payments(
    State(state): State<AppState>,
    Extension(ctx): Extension<PartnerContext>,
    Query(params): Query<ListPaymentsParams>,
) -> Result<impl IntoResponse, AppError> {
    let page = state.query.list(ctx.partner.id, &params).await?;
    let payments: Vec<PaymentView> = page.items.iter().map(PaymentView::from_payment).collect();
    Ok(Json(json!({
        "payments": payments,
        "total": page.total,
    })))
}
