use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let error_debug = format!("{:?}", self);

        let (status, error_message) = match self {
            AppError::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error".to_string(),
            ),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        let body = Json(json!({
            "error": error_debug,
            "message": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<crate::services::pass_issuer::IssuanceError> for AppError {
    fn from(e: crate::services::pass_issuer::IssuanceError) -> Self {
        use crate::services::pass_issuer::IssuanceError;
        match e {
            IssuanceError::Database(err) => AppError::Database(err),
            IssuanceError::InvalidMaxUses | IssuanceError::InvalidWindow => {
                AppError::Validation(e.to_string())
            }
            IssuanceError::PropertyNotFound | IssuanceError::UnitNotFound => {
                AppError::NotFound(e.to_string())
            }
            IssuanceError::CodeSpaceExhausted => AppError::Conflict(e.to_string()),
        }
    }
}

impl From<crate::services::pass_validator::ValidationError> for AppError {
    fn from(e: crate::services::pass_validator::ValidationError) -> Self {
        match e {
            crate::services::pass_validator::ValidationError::Database(err) => {
                AppError::Database(err)
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
