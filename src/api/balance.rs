use crate::api::AppState;
use crate::error::AppError;
use crate::middleware::auth::PartnerContext;
use crate::services::stats::StatsPeriod;
use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Extension, Json,
};
use serde::Deserialize;

/// GET /balance
pub async fn get_balance(
    State(state): State<AppState>,
    Extension(ctx): Extension<PartnerContext>,
) -> Result<impl IntoResponse, AppError> {
    let balance = state
        .stats
        .balance(&ctx.partner, &state.config.gateway.base_currency)
        .await?;
    Ok(Json(balance))
}

#[derive(Debug, Deserialize)]
pub struct StatsParams {
    period: Option<String>,
}

/// GET /stats?period
pub async fn get_stats(
    State(state): State<AppState>,
    Extension(ctx): Extension<PartnerContext>,
    Query(params): Query<StatsParams>,
) -> Result<impl IntoResponse, AppError> {
    let period = StatsPeriod::parse(params.period.as_deref().unwrap_or("30d"))?;
    let stats = state.stats.stats(ctx.partner.id, period).await?;
    Ok(Json(stats))
}
