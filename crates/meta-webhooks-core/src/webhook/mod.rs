//! Webhook request pipeline.
//!
//! [`Webhooks`] runs a delivery through every stage in order:
//! `Received → Verified → Validated → Decoded → Dispatching`, failing the whole
//! request on the first error. The stages are also exposed one by one for
//! callers that embed them in their own flow.

use crate::dispatch::{DispatchContext, Dispatcher};
use crate::error::{DecodeError, TransportError, WebhookError};
use crate::event::{supported_change_fields, Event};
use crate::handler::resolution::HandlerRegistry;
use crate::handler::{
    ChangesHandler, EntryHandler, InstagramChangesHandler, InstagramHandler,
    InstagramMentionHandler, InstagramMessageHandler, InstagramMessagingHandler,
    InstagramPostbackHandler, InstagramReferralHandler, InstagramStoryInsightsHandler,
    MessagingHandler,
};
use crate::RequestStage;
use bytes::Bytes;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use zeroize::Zeroizing;

mod config;
mod schema;
mod signature;
mod subscription;

pub use config::WebhooksConfig;
pub use schema::SchemaGate;
pub use signature::{SignatureVerifier, DEFAULT_SIGNATURE_HEADER};
pub use subscription::SubscriptionQuery;

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;

// ============================================================================
// Request
// ============================================================================

/// An inbound HTTP request as seen by the pipeline.
#[derive(Debug, Clone)]
pub struct WebhookRequest {
    method: String,
    headers: HashMap<String, String>,
    body: Bytes,
}

impl WebhookRequest {
    /// Header names are matched case-insensitively.
    pub fn new(method: impl Into<String>, headers: HashMap<String, String>, body: Bytes) -> Self {
        let headers = headers
            .into_iter()
            .map(|(name, value)| (name.to_ascii_lowercase(), value))
            .collect();
        Self {
            method: method.into(),
            headers,
            body,
        }
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// Verification, validation, decoding and dispatch of webhook deliveries.
///
/// Cheap to clone; all handler state is shared.
#[derive(Clone)]
pub struct Webhooks {
    verifier: SignatureVerifier,
    schema: SchemaGate,
    verify_token: Arc<Zeroizing<String>>,
    dispatcher: Dispatcher,
}

impl Webhooks {
    pub fn builder() -> WebhooksBuilder {
        WebhooksBuilder::default()
    }

    /// Header the signature is read from.
    pub fn signature_header(&self) -> &str {
        self.verifier.header_name()
    }

    /// Check the body signature. Always succeeds when no secret is configured.
    pub fn verify_payload(&self, body: &[u8], signature: Option<&str>) -> Result<(), WebhookError> {
        self.verifier.verify(body, signature)?;
        Ok(())
    }

    /// Parse the body as JSON without interpreting it.
    pub fn parse_payload(&self, body: &[u8]) -> Result<Value, WebhookError> {
        serde_json::from_slice(body)
            .map_err(|e| DecodeError::MalformedJson(e).into())
    }

    pub fn validate_payload(&self, document: &Value) -> Result<(), WebhookError> {
        self.schema.validate(document)?;
        Ok(())
    }

    /// Run every stage before dispatch and return the decoded event.
    pub fn process(&self, request: &WebhookRequest) -> Result<Event, WebhookError> {
        if !request.method().eq_ignore_ascii_case("POST") {
            return Err(TransportError::InvalidMethod {
                method: request.method().to_string(),
            }
            .into());
        }
        if request.body().is_empty() {
            return Err(TransportError::EmptyBody.into());
        }

        self.verify_payload(request.body(), request.header(self.signature_header()))?;
        debug!(stage = %RequestStage::Verified, "Webhook signature accepted");

        let document = self.parse_payload(request.body())?;
        self.validate_payload(&document)?;
        debug!(stage = %RequestStage::Validated, "Webhook payload matches schema");

        let event = Event::from_value(&document)?;
        debug!(
            stage = %RequestStage::Decoded,
            subject = %event.subject,
            entries = event.entries.len(),
            items = event.item_count(),
            "Webhook payload decoded"
        );
        Ok(event)
    }

    /// Deliver a decoded event to the registered handlers.
    pub async fn dispatch(
        &self,
        ctx: &DispatchContext,
        event: Arc<Event>,
    ) -> Result<(), WebhookError> {
        self.dispatcher.dispatch(ctx, event).await?;
        Ok(())
    }

    /// Process a delivery end to end.
    ///
    /// Returns the dispatched event so the caller can report on it.
    #[instrument(skip(self, ctx, request), fields(method = %request.method(), body_len = request.body().len()))]
    pub async fn handle_request(
        &self,
        ctx: &DispatchContext,
        request: &WebhookRequest,
    ) -> Result<Arc<Event>, WebhookError> {
        debug!(stage = %RequestStage::Received, "Webhook request received");

        let event = match self.process(request) {
            Ok(event) => Arc::new(event),
            Err(e) => {
                log_failure(&e);
                return Err(e);
            }
        };

        debug!(stage = %RequestStage::Dispatching, "Dispatching webhook event");
        if let Err(e) = self.dispatch(ctx, Arc::clone(&event)).await {
            log_failure(&e);
            return Err(e);
        }

        info!(
            stage = %RequestStage::Completed,
            subject = %event.subject,
            entries = event.entries.len(),
            items = event.item_count(),
            "Webhook event dispatched"
        );
        Ok(event)
    }

    /// Answer the subscription handshake with the challenge to echo back.
    #[instrument(skip(self, query))]
    pub fn verify_subscription(
        &self,
        method: &str,
        query: &SubscriptionQuery,
    ) -> Result<String, WebhookError> {
        if !method.eq_ignore_ascii_case("GET") {
            return Err(TransportError::InvalidMethod {
                method: method.to_string(),
            }
            .into());
        }

        match subscription::verify(&self.verify_token, query) {
            Ok(challenge) => {
                info!("Subscription handshake accepted");
                Ok(challenge)
            }
            Err(e) => {
                warn!(mode = ?query.mode, "Subscription handshake rejected");
                Err(e.into())
            }
        }
    }
}

fn log_failure(error: &WebhookError) {
    let category = error.category();
    match error {
        WebhookError::Decode(decode) if decode.is_unsupported() => {
            let supported: Vec<&str> = supported_change_fields().collect();
            warn!(
                stage = %error.stage(),
                outcome = %error.outcome(),
                category = %category,
                supported_change_fields = ?supported,
                error = %error,
                "Webhook payload uses an unsupported platform feature"
            );
        }
        WebhookError::Dispatch(_) => {
            warn!(
                stage = %error.stage(),
                outcome = %error.outcome(),
                category = %category,
                error = %error,
                "Webhook dispatch failed"
            );
        }
        _ => {
            warn!(
                stage = %error.stage(),
                outcome = %error.outcome(),
                category = %category,
                error = %error,
                "Webhook request rejected"
            );
        }
    }
}

impl std::fmt::Debug for Webhooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Webhooks")
            .field("verifier", &self.verifier)
            .field("schema", &self.schema)
            .field("verify_token", &"<REDACTED>")
            .finish()
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Configures a [`Webhooks`] pipeline.
///
/// The embedded event schema is compiled on [`WebhooksBuilder::build`] unless
/// another gate is supplied with [`WebhooksBuilder::schema`].
#[derive(Default)]
pub struct WebhooksBuilder {
    secret: Zeroizing<String>,
    verify_token: Zeroizing<String>,
    signature_header: Option<String>,
    ignore_echo_messages: bool,
    schema: Option<SchemaGate>,
    handlers: HandlerRegistry,
}

impl WebhooksBuilder {
    /// Apply every setting of `config`.
    pub fn with_config(self, config: &WebhooksConfig) -> Self {
        self.secret(&config.secret)
            .verify_token(&config.verify_token)
            .signature_header(&config.signature_header)
            .ignore_echo_messages(config.ignore_echo_messages)
    }

    /// App secret for signature verification. Empty disables verification.
    pub fn secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Zeroizing::new(secret.into());
        self
    }

    pub fn verify_token(mut self, token: impl Into<String>) -> Self {
        self.verify_token = Zeroizing::new(token.into());
        self
    }

    pub fn signature_header(mut self, header: impl Into<String>) -> Self {
        self.signature_header = Some(header.into());
        self
    }

    pub fn ignore_echo_messages(mut self, ignore: bool) -> Self {
        self.ignore_echo_messages = ignore;
        self
    }

    pub fn schema(mut self, schema: SchemaGate) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Receive whole entries; no other handler is called.
    pub fn entry_handler(mut self, handler: Arc<dyn EntryHandler>) -> Self {
        self.handlers.entry = Some(handler);
        self
    }

    /// Receive every change; change leaf handlers are not called.
    pub fn changes_handler(mut self, handler: Arc<dyn ChangesHandler>) -> Self {
        self.handlers.changes = Some(handler);
        self
    }

    /// Receive every messaging item; messaging leaf handlers are not called.
    pub fn messaging_handler(mut self, handler: Arc<dyn MessagingHandler>) -> Self {
        self.handlers.messaging = Some(handler);
        self
    }

    pub fn instagram_mention_handler(mut self, handler: Arc<dyn InstagramMentionHandler>) -> Self {
        self.handlers.leaves.mention = Some(handler);
        self
    }

    pub fn instagram_story_insights_handler(
        mut self,
        handler: Arc<dyn InstagramStoryInsightsHandler>,
    ) -> Self {
        self.handlers.leaves.story_insights = Some(handler);
        self
    }

    pub fn instagram_message_handler(mut self, handler: Arc<dyn InstagramMessageHandler>) -> Self {
        self.handlers.leaves.message = Some(handler);
        self
    }

    pub fn instagram_postback_handler(
        mut self,
        handler: Arc<dyn InstagramPostbackHandler>,
    ) -> Self {
        self.handlers.leaves.postback = Some(handler);
        self
    }

    pub fn instagram_referral_handler(
        mut self,
        handler: Arc<dyn InstagramReferralHandler>,
    ) -> Self {
        self.handlers.leaves.referral = Some(handler);
        self
    }

    /// Register one value for both change leaves.
    pub fn instagram_changes_handler<H>(self, handler: Arc<H>) -> Self
    where
        H: InstagramChangesHandler + 'static,
    {
        self.instagram_mention_handler(handler.clone())
            .instagram_story_insights_handler(handler)
    }

    /// Register one value for all three messaging leaves.
    pub fn instagram_messaging_handler<H>(self, handler: Arc<H>) -> Self
    where
        H: InstagramMessagingHandler + 'static,
    {
        self.instagram_message_handler(handler.clone())
            .instagram_postback_handler(handler.clone())
            .instagram_referral_handler(handler)
    }

    /// Register one value for every Instagram leaf.
    pub fn instagram_handler<H>(self, handler: Arc<H>) -> Self
    where
        H: InstagramHandler + 'static,
    {
        self.instagram_changes_handler(handler.clone())
            .instagram_messaging_handler(handler)
    }

    pub fn build(self) -> Result<Webhooks, WebhookError> {
        let schema = match self.schema {
            Some(schema) => schema,
            None => SchemaGate::embedded()?,
        };
        if !schema.is_loaded() {
            warn!("Webhooks built without a schema; every delivery will be rejected");
        }

        let mut verifier = SignatureVerifier::new(self.secret.as_bytes());
        if let Some(header) = self.signature_header.filter(|h| !h.is_empty()) {
            verifier = verifier.with_header_name(header);
        }
        if !verifier.is_enabled() {
            warn!("No webhook secret configured; payload signatures will not be verified");
        }

        let table = self.handlers.resolve(self.ignore_echo_messages);
        info!(
            signature_header = %verifier.header_name(),
            verify_signatures = verifier.is_enabled(),
            ignore_echo_messages = self.ignore_echo_messages,
            "Webhooks pipeline configured"
        );

        Ok(Webhooks {
            verifier,
            schema,
            verify_token: Arc::new(self.verify_token),
            dispatcher: Dispatcher::new(table),
        })
    }
}
