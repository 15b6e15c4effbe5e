use crate::api::AppState;
use crate::error::AppError;
use crate::middleware::auth::PartnerContext;
use crate::services::query::clamp_page;
use crate::services::refunds::{RefundRequest, RefundView};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde::Deserialize;
use serde_json::json;

/// POST /refunds
pub async fn create_refund(
    State(state): State<AppState>,
    Extension(ctx): Extension<PartnerContext>,
    Json(request): Json<RefundRequest>,
) -> Result<impl IntoResponse, AppError> {
    let refund = state.refunds.create(ctx.partner.id, request).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "refund": RefundView::from_refund(&refund) })),
    ))
}

#[derive(Debug, Deserialize)]
pub struct ListRefundsParams {
    limit: Option<i64>,
    offset: Option<i64>,
}

/// GET /refunds?limit&offset
pub async fn list_refunds(
    State(state): State<AppState>,
    Extension(ctx): Extension<PartnerContext>,
    Query(params): Query<ListRefundsParams>,
) -> Result<impl IntoResponse, AppError> {
    let (limit, offset) = clamp_page(params.limit, params.offset);
    let page = state.refunds.list(ctx.partner.id, limit, offset).await?;
    let refunds: Vec<RefundView> = page.items.iter().map(RefundView::from_refund).collect();
    Ok(Json(json!({
        "refunds": refunds,
        "total": page.total,
    })))
}
