/// Unified error handling module
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Unified error response format
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub ok: bool,
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
    #[error("upstream network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("upstream protocol error: {0}")]
    Protocol(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Storage(_) => "STORAGE_ERROR",
            ApiError::Network(e) => {
                if e.is_timeout() {
                    "UPSTREAM_TIMEOUT"
                } else if e.is_connect() {
                    "UPSTREAM_UNREACHABLE"
                } else {
                    "UPSTREAM_ERROR"
                }
            }
            ApiError::Protocol(_) => "UPSTREAM_PROTOCOL",
            ApiError::InvalidInput(_) => "INVALID_INPUT",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn detail(&self) -> ErrorDetail {
        ErrorDetail {
            code: self.code().to_string(),
            message: self.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let error_response = ErrorResponse {
            ok: false,
            error: self.detail(),
        };

        // Always return HTTP 200 with ok=false; clients switch on the flag
        (StatusCode::OK, Json(error_response)).into_response()
    }
}

/// Type alias for API results
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_input_code() {
        let err = ApiError::InvalidInput("bad path".to_string());
        assert_eq!(err.code(), "INVALID_INPUT");
        assert!(err.to_string().contains("bad path"));
    }

    #[test]
    fn test_protocol_code() {
        let err = ApiError::Protocol("status 502".to_string());
        assert_eq!(err.code(), "UPSTREAM_PROTOCOL");
    }
}
