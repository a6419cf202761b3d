//! Error types for the HTTP service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use meta_webhooks_core::{
    DispatchError, ErrorCategory, TransportError, ValidationError, WebhookError,
};
use tracing::{error, warn};

#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;

/// Seconds a caller should wait before redelivering after a transient failure.
const RETRY_AFTER_SECONDS: u64 = 60;

const INTERNAL_ERROR_MESSAGE: &str = "Internal server error occurred. Please try again later.";

/// Webhook handler errors with HTTP status code mapping
///
/// - `400 Bad Request`: malformed deliveries (empty body, invalid JSON,
///   schema violations, undecodable entries)
/// - `401 Unauthorized`: missing or mismatched payload signature
/// - `403 Forbidden`: rejected subscription handshake
/// - `405 Method Not Allowed`: wrong HTTP method for the stage
/// - `500 Internal Server Error`: missing handlers, unsupported subjects,
///   handler failures and schema misconfiguration
/// - `503 Service Unavailable` / `504 Gateway Timeout`: dispatch cancelled or
///   out of time; the platform may redeliver
///
/// Messages for `500` responses are replaced with a generic text. The detail
/// is logged server-side.
#[derive(Debug, thiserror::Error)]
pub enum WebhookHandlerError {
    /// A pipeline stage rejected the request.
    #[error("{0}")]
    ProcessingFailed(#[from] WebhookError),
}

impl WebhookHandlerError {
    /// Status code the response will carry.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::ProcessingFailed(e) => status_for(e),
        }
    }

    fn retry_after(&self) -> Option<u64> {
        match self {
            Self::ProcessingFailed(e) if e.is_transient() => Some(RETRY_AFTER_SECONDS),
            Self::ProcessingFailed(_) => None,
        }
    }
}

fn status_for(error: &WebhookError) -> StatusCode {
    match error {
        WebhookError::Transport(TransportError::InvalidMethod { .. }) => {
            StatusCode::METHOD_NOT_ALLOWED
        }
        WebhookError::Transport(TransportError::EmptyBody) => StatusCode::BAD_REQUEST,
        WebhookError::Authentication(_) => StatusCode::UNAUTHORIZED,
        WebhookError::Subscription(_) => StatusCode::FORBIDDEN,
        WebhookError::Validation(ValidationError::InvalidPayload { .. }) => {
            StatusCode::BAD_REQUEST
        }
        WebhookError::Validation(_) => StatusCode::INTERNAL_SERVER_ERROR,
        WebhookError::Decode(_) => StatusCode::BAD_REQUEST,
        WebhookError::Dispatch(DispatchError::DeadlineExceeded) => StatusCode::GATEWAY_TIMEOUT,
        WebhookError::Dispatch(e) => match e.category() {
            ErrorCategory::Cancellation => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        },
    }
}

impl IntoResponse for WebhookHandlerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let retry_after = self.retry_after();

        let message = if status.is_server_error() && retry_after.is_none() {
            error!(error = %self, "Webhook request failed with an internal error");
            INTERNAL_ERROR_MESSAGE.to_string()
        } else {
            if retry_after.is_some() {
                warn!(error = %self, "Webhook request did not complete; delivery may be retried");
            }
            self.to_string()
        };

        let body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        let mut response = (status, Json(body)).into_response();

        if let Some(retry_seconds) = retry_after {
            if let Ok(header_value) = retry_seconds.to_string().parse() {
                response.headers_mut().insert("Retry-After", header_value);
            }
        }

        response
    }
}

/// Service-level errors
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Failed to bind to address {address}: {message}")]
    BindFailed { address: String, message: String },

    #[error("Server failed: {message}")]
    ServerFailed { message: String },

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),
}

impl ServiceError {
    /// Process exit code reported by the service binary.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::BindFailed { .. } => 1,
            Self::ServerFailed { .. } => 2,
            Self::Configuration(_) => 3,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required configuration: {key}")]
    Missing { key: String },

    #[error("Failed to build webhook pipeline: {0}")]
    Pipeline(#[source] WebhookError),
}
