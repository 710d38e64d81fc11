//! API response, query and error types.

use axum::Json;
use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::QueryRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use crate::error::SimulationError;

/// Error response body: `{"status_code": 400, "detail": "..."}`.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    /// HTTP status code, repeated in the body.
    pub status_code: u16,
    /// Human-readable cause, naming the offending file where relevant.
    pub detail: String,
}

/// Query parameters of `POST /api/simulation`.
#[derive(Debug, Default, Deserialize)]
pub struct SimulationQuery {
    /// Chart bucket width overriding the configured one.
    pub resolution_minutes: Option<u32>,
}

/// `GET /` body.
#[derive(Debug, Serialize)]
pub struct WelcomeResponse {
    pub message: &'static str,
}

/// `GET /health` body.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// A [`SimulationError`] rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub SimulationError);

impl From<SimulationError> for ApiError {
    fn from(err: SimulationError) -> Self {
        Self(err)
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self(rejected(rejection.status(), rejection.body_text()))
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        Self(rejected(rejection.status(), rejection.body_text()))
    }
}

/// Maps a request the extractors could not read to an upload error,
/// keeping 413 for bodies over the size limit.
pub fn rejected(status: StatusCode, detail: String) -> SimulationError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        SimulationError::PayloadTooLarge(detail)
    } else {
        SimulationError::Upload(detail)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!(error = %self.0, "simulation request failed");
        } else {
            tracing::warn!(error = %self.0, "simulation request rejected");
        }
        let body = ErrorResponse {
            status_code: status.as_u16(),
            detail: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
