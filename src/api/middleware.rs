use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application error types
#[derive(Debug, Error)]
pub enum AppError {
    /// No table in the request could be resolved against the schema
    #[error("{0}")]
    SchemaResolution(String),

    #[error("Translation error: {0}")]
    Translation(String),

    #[error("Invalid SQL: {0}")]
    InvalidSql(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorDetail {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_detail) = match self {
            AppError::SchemaResolution(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail::new("SCHEMA_RESOLUTION_ERROR", msg)
                    .with_details("Mention a table from the schema or register an alias for it."),
            ),
            AppError::Translation(msg) => (
                StatusCode::BAD_GATEWAY,
                ErrorDetail::new("TRANSLATION_ERROR", msg),
            ),
            AppError::InvalidSql(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("INVALID_SQL", msg),
            ),
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorDetail::new("VALIDATION_ERROR", msg),
            ),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("INTERNAL_ERROR", msg),
            ),
        };

        let body = Json(ErrorResponse {
            error: error_detail,
        });

        (status, body).into_response()
    }
}

/// Pattern compilation failures are internal faults
impl From<regex::Error> for AppError {
    fn from(err: regex::Error) -> Self {
        AppError::Internal(format!("Failed to compile pattern: {}", err))
    }
}

/// Malformed request bodies
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}
