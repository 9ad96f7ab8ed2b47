//! Outward error payloads: `{"error": ...}` plus `latency` when a remote call was made.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tamnone_core::{DialogueError, TuningError};

pub const CLIENT_UNAVAILABLE: &str = "API 클라이언트가 초기화되지 않았습니다.";

#[derive(Debug)]
pub enum ApiError {
    /// Space client failed to initialize at startup.
    ClientUnavailable,
    /// Missing or malformed input; nothing was touched.
    Validation(String),
    /// The Space call failed (transport, protocol shape or Space-reported).
    Remote { message: String, latency: f64 },
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::ClientUnavailable => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": CLIENT_UNAVAILABLE })),
            )
                .into_response(),
            ApiError::Validation(message) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
            }
            ApiError::Remote { message, latency } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": message, "latency": latency })),
            )
                .into_response(),
        }
    }
}

impl From<DialogueError> for ApiError {
    fn from(e: DialogueError) -> Self {
        ApiError::Validation(e.to_string())
    }
}

impl From<TuningError> for ApiError {
    fn from(e: TuningError) -> Self {
        ApiError::Validation(e.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        ApiError::Validation(e.body_text())
    }
}
