use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::store::StoreError;
use crate::triggers::TriggerError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Trigger error: {0}")]
    Trigger(#[from] TriggerError),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Serialize)]
struct ErrorBody {
    code: String,
    message: String,
}

/// Check if running in production mode (based on RUN_MODE env var)
pub(crate) fn is_production() -> bool {
    std::env::var("RUN_MODE")
        .map(|m| m == "production" || m == "prod")
        .unwrap_or(false)
}

/// Message shown to clients for server-side failures.
fn masked(log_msg: &str, production_msg: &str) -> String {
    if is_production() {
        production_msg.to_string()
    } else {
        log_msg.to_string()
    }
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, String, String) {
        match self {
            AppError::Config(e) => {
                let log_msg = e.to_string();
                let client_msg = masked(&log_msg, "Configuration error");
                (StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERROR", client_msg, log_msg)
            }
            AppError::Auth(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone(), msg.clone()),
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                msg.clone(),
                msg.clone(),
            ),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone(), msg.clone()),
            AppError::Internal(e) => {
                let client_msg = masked(e, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", client_msg, e.clone())
            }
            AppError::Store(e) => {
                let log_msg = e.to_string();
                let client_msg = masked(&log_msg, "Service temporarily unavailable");
                (StatusCode::SERVICE_UNAVAILABLE, "STORE_ERROR", client_msg, log_msg)
            }
            AppError::Trigger(TriggerError::Invalid(msg)) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                msg.clone(),
                msg.clone(),
            ),
            AppError::Trigger(e) => {
                let log_msg = e.to_string();
                let client_msg = masked(&log_msg, "Trigger failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "TRIGGER_ERROR", client_msg, log_msg)
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, client_message, log_message) = self.parts();

        // Always log the detailed error server-side
        tracing::error!(
            code = %code,
            status = %status.as_u16(),
            message = %log_message,
            "API error"
        );

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message: client_message,
            },
        };

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_maps_to_bad_request() {
        let (status, code, client, _) = AppError::Validation("missing id".into()).parts();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(code, "VALIDATION_ERROR");
        assert_eq!(client, "missing id");
    }

    #[test]
    fn test_invalid_trigger_maps_to_bad_request() {
        let err = AppError::from(TriggerError::Invalid("unknown collection".into()));
        let (status, code, _, _) = err.parts();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(code, "VALIDATION_ERROR");
    }

    #[test]
    fn test_store_error_is_service_unavailable() {
        let err = AppError::from(StoreError::Unavailable("redis down".into()));
        let (status, code, _, log) = err.parts();
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(code, "STORE_ERROR");
        assert!(log.contains("redis down"));
    }
}
