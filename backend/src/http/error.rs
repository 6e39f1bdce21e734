//! HTTP error handling and response types.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::services::SeriesError;

/// API error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// Error code for programmatic handling
    pub error: String,
    /// Human-readable error message
    pub message: String,
}

impl ApiError {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
        }
    }
}

/// Application error type for HTTP handlers.
#[derive(Debug)]
pub enum AppError {
    /// Data-path failure
    Series(SeriesError),
    /// Internal server error
    Internal(String),
}

impl AppError {
    fn status_and_body(&self) -> (StatusCode, ApiError) {
        match self {
            AppError::Series(e) => {
                let code = match e {
                    SeriesError::Range(_) => "invalid_range",
                    SeriesError::SourceRead { .. } => "source_unavailable",
                    SeriesError::Normalization { .. } => "normalization_error",
                    SeriesError::DuplicateInstant(_) => "duplicate_instant",
                    SeriesError::DuplicateSource(_) => "internal_error",
                };
                let status = if e.is_validation() {
                    StatusCode::BAD_REQUEST
                } else {
                    StatusCode::INTERNAL_SERVER_ERROR
                };
                (status, ApiError::new(code, e.to_string()))
            }
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiError::new("internal_error", msg.clone()),
            ),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = self.status_and_body();
        if status.is_server_error() {
            tracing::error!(error = %body.error, "{}", body.message);
        } else {
            tracing::debug!(error = %body.error, "{}", body.message);
        }
        (status, Json(body)).into_response()
    }
}

impl From<SeriesError> for AppError {
    fn from(err: SeriesError) -> Self {
        AppError::Series(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::RepositoryError;
    use crate::services::RangeError;

    #[test]
    fn test_validation_errors_are_client_errors() {
        let err = AppError::from(SeriesError::from(RangeError::IncompleteWindow {
            present: "start",
            missing: "end",
        }));
        let (status, body) = err.status_and_body();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error, "invalid_range");
    }

    #[test]
    fn test_read_errors_are_server_errors() {
        let err = AppError::from(SeriesError::source_read(
            crate::models::SourceKind::Actual,
            RepositoryError::connection("refused"),
        ));
        let (status, body) = err.status_and_body();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error, "source_unavailable");
        assert!(body.message.contains("actual"));
    }
}
