// ── API error mapping ────────────────────────────────────────────────────────
// Mirrors the proxy's `{"error":{"kind":..,"message":..}}` response shape so
// the whole HTTP surface looks the same no matter which router answered.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use sidecar_core::SidecarError;

pub enum ApiError {
    NotFound(String),
    Validation(String),
    Internal(SidecarError),
}

impl ApiError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }
}

impl From<SidecarError> for ApiError {
    fn from(err: SidecarError) -> Self {
        match err {
            SidecarError::Validation(msg) => ApiError::Validation(msg),
            other => ApiError::Internal(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match self {
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, "not_found", message),
            ApiError::Validation(message) => (StatusCode::BAD_REQUEST, "validation_error", message),
            ApiError::Internal(SidecarError::Upstream { status, body }) => (
                StatusCode::BAD_GATEWAY,
                "upstream_error",
                format!("upstream returned {status}: {body}"),
            ),
            ApiError::Internal(SidecarError::Network(err)) => {
                (StatusCode::BAD_GATEWAY, "network_error", err.to_string())
            }
            ApiError::Internal(SidecarError::Keyring(msg)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "keyring_error", msg)
            }
            ApiError::Internal(SidecarError::Migration(msg)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "migration_error", msg)
            }
            ApiError::Internal(err) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", err.to_string()),
        };
        (status, Json(json!({"error": {"kind": kind, "message": message}}))).into_response()
    }
}
