//! API error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use vidgen_worker::IntakeError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{0}")]
    QuotaExceeded(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::QuotaExceeded(_) | ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable code for clients that branch on the failure.
    fn code(&self) -> Option<&'static str> {
        match self {
            ApiError::QuotaExceeded(_) => Some("QUOTA_EXCEEDED"),
            ApiError::Validation(_) => Some("VALIDATION_FAILED"),
            ApiError::Conflict(_) => Some("USAGE_NOT_RECORDED"),
            _ => None,
        }
    }
}

impl From<IntakeError> for ApiError {
    fn from(err: IntakeError) -> Self {
        match err {
            IntakeError::Validation(msg) => ApiError::Validation(msg),
            IntakeError::QuotaExceeded { .. } => ApiError::QuotaExceeded(err.to_string()),
            IntakeError::Consistency(_) => ApiError::Conflict(err.to_string()),
            IntakeError::Configuration(msg) | IntakeError::Store(msg) => ApiError::Unavailable(msg),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<String> = errors
            .field_errors()
            .into_iter()
            .map(|(field, errs)| {
                let reason = errs
                    .first()
                    .and_then(|e| e.message.as_ref().map(|m| m.to_string()))
                    .unwrap_or_else(|| "is invalid".to_string());
                format!("{field} {reason}")
            })
            .collect();
        fields.sort();
        ApiError::Validation(fields.join("; "))
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'static str>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Don't expose internal error details in production
        let detail = match &self {
            ApiError::Internal(_) | ApiError::Unavailable(_)
                if std::env::var("ENVIRONMENT").unwrap_or_default() == "production" =>
            {
                "The service is temporarily unavailable".to_string()
            }
            _ => self.to_string(),
        };

        let body = ErrorResponse {
            detail,
            code: self.code(),
        };
        (status, Json(body)).into_response()
    }
}
