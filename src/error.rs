use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use tracing::error;
use validator::ValidationErrors;

use crate::dao::storage::StorageError;

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// A storage operation failed.
    #[error("storage operation failed")]
    Storage(#[source] StorageError),
    /// Application is running in degraded mode without storage.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// A unique key is already taken.
    #[error("{0}")]
    Conflict(String),
    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Conflict { message } => ServiceError::Conflict(message),
            other => ServiceError::Storage(other),
        }
    }
}

impl From<ValidationErrors> for ServiceError {
    fn from(err: ValidationErrors) -> Self {
        ServiceError::InvalidInput(format!("validation failed: {err}"))
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Conflict with current state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Service unavailable or degraded.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Storage(source) => {
                error!(error = %source, "storage operation failed");
                AppError::Internal("storage operation failed".into())
            }
            ServiceError::Degraded => AppError::ServiceUnavailable("degraded mode".into()),
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::Conflict(message) => AppError::Conflict(message),
            ServiceError::NotFound(message) => AppError::NotFound(message),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_conflicts_keep_their_message() {
        let err: ServiceError = StorageError::conflict("season taken").into();
        let app: AppError = err.into();
        assert_eq!(app.status(), StatusCode::CONFLICT);
        assert_eq!(app.to_string(), "conflict: season taken");
    }

    #[test]
    fn persistence_failures_are_generic_internal_errors() {
        let io = std::io::Error::other("connection reset");
        let err: ServiceError = StorageError::unavailable("load cells".into(), io).into();
        assert!(matches!(err, ServiceError::Storage(_)));
        let app = AppError::from(err);
        assert_eq!(app.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(app.to_string(), "internal error: storage operation failed");

        let err: ServiceError = StorageError::lock_unavailable(4, "busy").into();
        assert_eq!(AppError::from(err).status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn validation_failures_become_bad_requests() {
        let mut errors = ValidationErrors::new();
        errors.add("weekNumber", validator::ValidationError::new("range"));
        let app = AppError::from(ServiceError::from(errors));
        assert_eq!(app.status(), StatusCode::BAD_REQUEST);
        assert!(app.to_string().starts_with("bad request: validation failed"));
    }

    #[test]
    fn degraded_and_missing_rows_map_to_http_codes() {
        assert_eq!(
            AppError::from(ServiceError::Degraded).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            AppError::from(ServiceError::NotFound("cell 3".into())).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::from(ServiceError::InvalidInput("bad week".into())).status(),
            StatusCode::BAD_REQUEST
        );
    }
}
