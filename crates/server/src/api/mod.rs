//! HTTP endpoints.
//!
//! Handlers share one error type, [`ApiError`], which renders every failure
//! as `{"error": msg}` with a status code chosen by the error kind.

mod health;
mod predict;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::{error, warn};

use shield_core::ShieldError;

// ── Shared types ─────────────────────────────────────────────────

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Per-request failure, converted to a response at the handler boundary.
#[derive(Debug)]
pub struct ApiError(ShieldError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        if self.0.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl From<ShieldError> for ApiError {
    fn from(e: ShieldError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self.0, "request failed");
        } else {
            warn!(error = %self.0, "request rejected");
        }
        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

// ── Re-exports ───────────────────────────────────────────────────

pub use health::health;
pub use predict::predict;
