use axum::{Json, http::StatusCode, response::IntoResponse};

use super::models::ErrorResponse;
use crate::handlers::{OperationError, RegistryError};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid request body, {0}")]
    InvalidPayload(String),
    #[error("request body too large, limit is {0} bytes")]
    PayloadTooLarge(usize),
    #[error("method not allowed")]
    MethodNotAllowed,
    #[error("no handler for '{0}'")]
    NoHandler(String),
    #[error(transparent)]
    Operation(#[from] OperationError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidPayload(_) | ApiError::NoHandler(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Operation(err) if err.is_caller_fault() => StatusCode::BAD_REQUEST,
            ApiError::Operation(OperationError::UpstreamResource(_)) => StatusCode::BAD_GATEWAY,
            ApiError::Operation(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: self.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(value: serde_json::Error) -> Self {
        ApiError::InvalidPayload(value.to_string())
    }
}

impl From<RegistryError> for ApiError {
    fn from(value: RegistryError) -> Self {
        match value {
            RegistryError::NoHandler(operation) => ApiError::NoHandler(operation),
            RegistryError::Job(err) => ApiError::Operation(err),
            other => ApiError::Internal(other.to_string()),
        }
    }
}
