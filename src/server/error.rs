//! Mapping of request failures onto HTTP responses.

use crate::metrics::MetricsError;
use crate::registry::SessionError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Errors returned by request handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("metrics encoding failed: {0}")]
    Metrics(#[from] MetricsError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Session(SessionError::CameraNotFound(_)) => {
                (StatusCode::NOT_FOUND, "CAMERA_NOT_FOUND")
            }
            ApiError::Session(SessionError::AlreadyStreaming(_)) => {
                (StatusCode::BAD_REQUEST, "ALREADY_STREAMING")
            }
            ApiError::Session(SessionError::NotStreaming(_)) => {
                (StatusCode::BAD_REQUEST, "NOT_STREAMING")
            }
            ApiError::Session(SessionError::InvalidArgument(_)) => {
                (StatusCode::BAD_REQUEST, "INVALID_ARGUMENT")
            }
            ApiError::Session(SessionError::DeviceUnavailable { .. }) => {
                (StatusCode::SERVICE_UNAVAILABLE, "DEVICE_UNAVAILABLE")
            }
            ApiError::Metrics(_) => (StatusCode::INTERNAL_SERVER_ERROR, "METRICS_ERROR"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.parts().0
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code) = self.parts();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(status = %status, error_code, message = %message, "Request error");
        } else {
            tracing::warn!(status = %status, error_code, message = %message, "Request rejected");
        }

        let body = Json(json!({
            "error_code": error_code,
            "message": message
        }));

        (status, body).into_response()
    }
}
