//! # Meta Webhooks Core
//!
//! Receives Meta platform webhook deliveries (Instagram subject), authenticates
//! and validates them, decodes the polymorphic event payload into typed values
//! and fans delivery out to caller-supplied handlers.
//!
//! The processing pipeline for a single delivery is:
//!
//! 1. **Verify** the `X-Hub-Signature-256` HMAC over the raw body
//!    ([`webhook::SignatureVerifier`]).
//! 2. **Validate** the JSON document against the embedded event schema
//!    ([`webhook::SchemaGate`]).
//! 3. **Decode** the document into an [`Event`] ([`event`]).
//! 4. **Dispatch** every entry, change and messaging item concurrently to the
//!    registered handlers ([`dispatch`], [`handler`]), first error wins.
//!
//! [`Webhooks`] ties the stages together; the HTTP server lives in the
//! `meta-webhooks-api` crate.
//!
//! ```
//! use bytes::Bytes;
//! use meta_webhooks_core::{DispatchContext, WebhookError, WebhookRequest, Webhooks};
//! use std::collections::HashMap;
//!
//! # tokio_test::block_on(async {
//! let webhooks = Webhooks::builder().build()?;
//!
//! let body = Bytes::from_static(br#"{"object":"instagram","entry":[]}"#);
//! let request = WebhookRequest::new("POST", HashMap::new(), body);
//! let event = webhooks
//!     .handle_request(&DispatchContext::background(), &request)
//!     .await?;
//!
//! assert!(event.entries.is_empty());
//! # Ok::<(), WebhookError>(())
//! # }).unwrap();
//! ```

pub mod dispatch;
pub mod error;
pub mod event;
pub mod handler;
pub mod webhook;

#[cfg(test)]
mod test_support;

pub use dispatch::DispatchContext;
pub use error::{
    DecodeError, DispatchError, ErrorCategory, RequestStage, SubscriptionError, TransportError,
    ValidationError, VerificationError, WebhookError,
};
pub use event::{
    Attachment, AttachmentPayload, Change, ChangeValue, Entry, Event, Mention, Message,
    MessageEvent, Messaging, MessagingHeader, Participant, Postback, PostbackEvent, Referral,
    ReferralEvent, StoryInsights, Subject,
};
pub use handler::{
    ChangesHandler, EntryHandler, HandlerError, HandlerKind, HandlerResult,
    InstagramChangesHandler, InstagramHandler, InstagramMentionHandler, InstagramMessageHandler,
    InstagramMessagingHandler, InstagramPostbackHandler, InstagramReferralHandler,
    InstagramStoryInsightsHandler, MessagingHandler,
};
pub use webhook::{
    SchemaGate, SignatureVerifier, SubscriptionQuery, WebhookRequest, Webhooks, WebhooksBuilder,
    WebhooksConfig, DEFAULT_SIGNATURE_HEADER,
};
