//! API error types and responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::provider::ProviderError;
use crate::subscriptions::SubscriptionError;

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Bad request - invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Payment provider not configured.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// External service error.
    #[error("external service error: {0}")]
    ExternalService(String),
}

/// JSON error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            Self::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, "unavailable", msg),
            Self::ExternalService(msg) => {
                tracing::error!(error = %msg, "External service error");
                (StatusCode::BAD_GATEWAY, "external_service_error", msg)
            }
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<ProviderError> for ApiError {
    fn from(err: ProviderError) -> Self {
        if err.is_rejected_webhook() {
            return Self::BadRequest(err.to_string());
        }

        match err {
            ProviderError::NotFound { object, id } => {
                Self::NotFound(format!("{object} not found: {id}"))
            }
            ProviderError::Configuration(msg) => Self::Unavailable(msg),
            other => Self::ExternalService(other.to_string()),
        }
    }
}

impl From<SubscriptionError> for ApiError {
    fn from(err: SubscriptionError) -> Self {
        match err {
            SubscriptionError::Provider(e) => e.into(),
            other @ SubscriptionError::CouponNotAllowed => Self::BadRequest(other.to_string()),
            other @ SubscriptionError::MissingCheckoutUrl => {
                Self::ExternalService(other.to_string())
            }
        }
    }
}
