use crate::api::AppState;
use crate::error::AppError;
use crate::services::webhooks::SIGNATURE_HEADER;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
    response::IntoResponse,
    Json,
};
use tracing::info;

/// POST /notifications/{provider}
///
/// Entry point for asynchronous processor notifications. Not API-key
/// authenticated; the body is verified against the provider's shared secret
/// and the payment is located by its pre-assigned merchant reference, which
/// only ever travels between this service and the processor.
pub async fn provider_notification(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    info!(provider = %provider, "received provider notification");
    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
    let result = state
        .notifications
        .handle(&provider, signature, &body)
        .await?;
    Ok(Json(result))
}
