use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Structured error body returned by storefront-facing endpoints.
///
/// Webhook endpoints return the same shape; their callers are machines and
/// only look at the status code.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// HTTP status category (e.g., "Bad Request", "Bad Gateway")
    pub error: String,
    /// Human-readable error description
    pub message: String,
    /// Upstream diagnostic detail, when available
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// ISO 8601 timestamp when the error occurred
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Webhook signature verification failed: {0}")]
    SignatureError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Credential exchange failed: {0}")]
    AuthError(String),

    #[error("Distributor API error (status {status})")]
    UpstreamError { status: u16, body: String },

    #[error("Checkout session creation failed: {0}")]
    CheckoutCreationError(String),

    #[error("Persistence error: {0}")]
    PersistenceError(#[from] sea_orm::error::DbErr),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl ServiceError {
    /// Status code the error maps to at the HTTP boundary.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::ValidationError(_)
            | ServiceError::BadRequest(_)
            | ServiceError::SignatureError(_) => StatusCode::BAD_REQUEST,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::UpstreamError { .. } | ServiceError::CheckoutCreationError(_) => {
                StatusCode::BAD_GATEWAY
            }
            ServiceError::AuthError(_)
            | ServiceError::PersistenceError(_)
            | ServiceError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn details(&self) -> Option<String> {
        match self {
            ServiceError::UpstreamError { body, .. } if !body.is_empty() => Some(body.clone()),
            _ => None,
        }
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(errors.to_string())
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let body = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Unknown").to_string(),
            message: self.to_string(),
            details: self.details(),
            timestamp: Utc::now().to_rfc3339(),
        };

        (status, Json(body)).into_response()
    }
}
