//! Error taxonomy for webhook processing.
//!
//! Every pipeline stage has its own error enum. [`WebhookError`] wraps them
//! and classifies failures through [`ErrorCategory`] so an HTTP adapter can
//! pick a status code without matching on individual variants.

use crate::handler::{HandlerError, HandlerKind};
use std::fmt;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;

// ============================================================================
// Classification
// ============================================================================

/// Broad failure class of a [`WebhookError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Wrong HTTP method or unreadable body.
    Transport,
    /// Signature or verify-token mismatch.
    Authentication,
    /// Payload rejected by the schema, or no schema loaded.
    Validation,
    /// Malformed JSON or an unsupported field/shape.
    Decode,
    /// Caller setup mistake, e.g. a leaf handler that was never registered.
    Configuration,
    /// Caller deadline expired or the dispatch was cancelled.
    Cancellation,
    /// Error returned by a caller-supplied handler.
    Handler,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Transport => "transport",
            Self::Authentication => "authentication",
            Self::Validation => "validation",
            Self::Decode => "decode",
            Self::Configuration => "configuration",
            Self::Cancellation => "cancellation",
            Self::Handler => "handler",
        };
        f.write_str(name)
    }
}

/// Processing state of a single inbound delivery.
///
/// A request moves `Received → Verified → Validated → Decoded → Dispatching`
/// and ends in one of `Completed`, `Failed` or `Cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestStage {
    Received,
    Verified,
    Validated,
    Decoded,
    Dispatching,
    Completed,
    Failed,
    Cancelled,
}

impl RequestStage {
    /// True for `Completed`, `Failed` and `Cancelled`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for RequestStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Received => "received",
            Self::Verified => "verified",
            Self::Validated => "validated",
            Self::Decoded => "decoded",
            Self::Dispatching => "dispatching",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Top-level error
// ============================================================================

/// Failure of any stage of webhook processing.
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Signature verification failed: {0}")]
    Authentication(#[from] VerificationError),

    #[error("Subscription handshake failed: {0}")]
    Subscription(#[from] SubscriptionError),

    #[error("Payload validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Payload decoding failed: {0}")]
    Decode(#[from] DecodeError),

    #[error("Dispatch failed: {0}")]
    Dispatch(#[from] DispatchError),
}

impl WebhookError {
    /// Get error category for monitoring and status mapping
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Transport(_) => ErrorCategory::Transport,
            Self::Authentication(_) | Self::Subscription(_) => ErrorCategory::Authentication,
            Self::Validation(_) => ErrorCategory::Validation,
            Self::Decode(_) => ErrorCategory::Decode,
            Self::Dispatch(e) => e.category(),
        }
    }

    /// Check if the platform may succeed by redelivering the same payload.
    ///
    /// Nothing is retried inside this crate; this only informs the caller.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Dispatch(e) => e.is_transient(),
            _ => false,
        }
    }

    /// The last stage the request reached before failing.
    pub fn stage(&self) -> RequestStage {
        match self {
            Self::Transport(_) | Self::Authentication(_) | Self::Subscription(_) => {
                RequestStage::Received
            }
            Self::Validation(_) => RequestStage::Verified,
            Self::Decode(_) => RequestStage::Validated,
            Self::Dispatch(_) => RequestStage::Dispatching,
        }
    }

    /// Terminal stage the request ends in because of this error.
    pub fn outcome(&self) -> RequestStage {
        match self.category() {
            ErrorCategory::Cancellation => RequestStage::Cancelled,
            _ => RequestStage::Failed,
        }
    }
}

// ============================================================================
// Stage errors
// ============================================================================

/// Request could not be read as a webhook delivery.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("Method {method} is not allowed")]
    InvalidMethod { method: String },

    #[error("Request body is empty")]
    EmptyBody,
}

/// Signature check on the raw body failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerificationError {
    #[error("Missing signature header: {header}")]
    MissingSignature { header: String },

    #[error("Signature does not match payload")]
    SignatureMismatch,
}

/// Verify-token handshake was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubscriptionError {
    #[error("Subscription verification failed")]
    VerificationFailed,
}

/// Schema gate rejected the document.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("No event schema has been compiled")]
    MissingSchema,

    #[error("Failed to compile event schema: {message}")]
    SchemaCompile { message: String },

    #[error("Payload does not match the event schema: {}", .errors.join("; "))]
    InvalidPayload { errors: Vec<String> },
}

/// Payload is not an event this crate knows how to interpret.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Body is not valid JSON: {0}")]
    MalformedJson(#[source] serde_json::Error),

    #[error("Event structure is invalid: {0}")]
    InvalidStructure(#[source] serde_json::Error),

    #[error("Entry {index} is missing required field '{field}'")]
    MissingEntryField { index: usize, field: &'static str },

    #[error("Entry {entry_id}: change field '{field}' is not supported")]
    UnsupportedField { entry_id: String, field: String },

    #[error("Entry {entry_id}: change '{field}' has no value")]
    MissingChangeValue { entry_id: String, field: String },

    #[error("Entry {entry_id}: change '{field}' has an invalid value: {source}")]
    InvalidChangeValue {
        entry_id: String,
        field: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Entry {entry_id}: messaging item {index} matches no known shape")]
    UnrecognizedMessagingShape { entry_id: String, index: usize },
}

impl DecodeError {
    /// True when the JSON was well-formed but names a platform feature this
    /// crate does not implement.
    pub fn is_unsupported(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedField { .. } | Self::UnrecognizedMessagingShape { .. }
        )
    }
}

/// Failure while delivering a decoded event to handlers.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("No {handler} handler is registered")]
    HandlerNotDefined { handler: HandlerKind },

    #[error("Subject '{subject}' is not supported by the default handlers")]
    SubjectNotSupported { subject: String },

    #[error("Dispatch was cancelled")]
    Cancelled,

    #[error("Dispatch deadline exceeded")]
    DeadlineExceeded,

    #[error("Handler failed: {0}")]
    Handler(#[source] HandlerError),

    #[error("Handler task panicked: {message}")]
    TaskPanicked { message: String },
}

impl DispatchError {
    /// Wrap an error returned by a caller handler.
    ///
    /// A handler that propagates a [`DispatchError`] (for example the cause
    /// returned by [`crate::DispatchContext::done`]) keeps its own kind.
    pub fn from_handler(error: HandlerError) -> Self {
        match error.downcast::<DispatchError>() {
            Ok(dispatch_error) => *dispatch_error,
            Err(other) => Self::Handler(other),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::HandlerNotDefined { .. } | Self::SubjectNotSupported { .. } => {
                ErrorCategory::Configuration
            }
            Self::Cancelled | Self::DeadlineExceeded => ErrorCategory::Cancellation,
            Self::Handler(_) | Self::TaskPanicked { .. } => ErrorCategory::Handler,
        }
    }

    /// True for caller cancellation and deadline expiry.
    pub fn is_cancellation(&self) -> bool {
        self.category() == ErrorCategory::Cancellation
    }

    pub fn is_transient(&self) -> bool {
        self.is_cancellation()
    }
}
