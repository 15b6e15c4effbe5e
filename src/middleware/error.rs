//! Error response rendering.
//!
//! Every failure surfaces as `{ "error": <message>, "code": <CODE>, ... }`
//! with any structured context flattened into the same object, so partners
//! can branch on `code` and read extras like `existingPayment` or
//! `retryAfter` without a nested envelope.

use crate::error::{AppError, ErrorCode};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: ErrorCode,
    #[serde(flatten)]
    pub context: Map<String, JsonValue>,
}

impl ErrorResponse {
    pub fn from_app_error(error: &AppError) -> Self {
        Self {
            error: error.user_message(),
            code: error.error_code(),
            context: error.context(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "request failed");
        } else {
            tracing::warn!(error = %self, status = status.as_u16(), "request rejected");
        }

        let body = ErrorResponse::from_app_error(&self);
        (status, Json(body)).into_response()
    }
}
