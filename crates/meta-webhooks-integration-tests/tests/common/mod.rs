//! Common test utilities for meta-webhooks-api integration tests
//!
//! This module provides:
//! - A recording handler implementing every handler trait
//! - Request signing independent of the crate under test
//! - Router and request builders

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::Request,
    response::Response,
    Router,
};
use hmac::{Hmac, Mac};
use meta_webhooks_api::{create_router, AppState, ServiceConfig};
use meta_webhooks_core::{
    Change, ChangesHandler, DispatchContext, Entry, EntryHandler, HandlerResult,
    InstagramMentionHandler, InstagramMessageHandler, InstagramPostbackHandler,
    InstagramReferralHandler, InstagramStoryInsightsHandler, Mention, MessageEvent, Messaging,
    MessagingHandler, PostbackEvent, ReferralEvent, StoryInsights, Subject, Webhooks,
    WebhooksBuilder,
};
use sha2::Sha256;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const SECRET: &str = "very_secret";
pub const VERIFY_TOKEN: &str = "T";
pub const WEBHOOK_PATH: &str = "/webhooks";

// ============================================================================
// Recording handler
// ============================================================================

/// Records every call as `"<kind>:<id>"`.
///
/// Optionally fails calls of one kind, or works for `delay` while honouring
/// cancellation. Calls that finish their work are also recorded as
/// `"done:<kind>:<id>"`.
#[derive(Default)]
pub struct RecordingHandler {
    calls: Mutex<Vec<String>>,
    fail_kind: Option<&'static str>,
    delay: Option<Duration>,
}

impl RecordingHandler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing(kind: &'static str) -> Arc<Self> {
        Arc::new(Self {
            fail_kind: Some(kind),
            ..Self::default()
        })
    }

    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay: Some(delay),
            ..Self::default()
        })
    }

    /// Calls in sorted order, excluding completion markers.
    pub fn calls(&self) -> Vec<String> {
        let mut calls: Vec<String> = self
            .calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| !call.starts_with("done:"))
            .cloned()
            .collect();
        calls.sort();
        calls
    }

    pub fn completed(&self) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.starts_with("done:"))
            .count()
    }

    pub fn total(&self) -> usize {
        self.calls().len()
    }

    async fn record(&self, ctx: &DispatchContext, kind: &'static str, id: &str) -> HandlerResult {
        self.calls.lock().unwrap().push(format!("{kind}:{id}"));

        if let Some(delay) = self.delay {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                cause = ctx.done() => return Err(cause.into()),
            }
        }
        if self.fail_kind == Some(kind) {
            return Err(format!("{kind} handler failed for {id}").into());
        }

        self.calls.lock().unwrap().push(format!("done:{kind}:{id}"));
        Ok(())
    }
}

#[async_trait]
impl EntryHandler for RecordingHandler {
    async fn entry(&self, ctx: &DispatchContext, subject: &Subject, entry: &Entry) -> HandlerResult {
        self.record(ctx, "entry", &format!("{subject}/{}", entry.id))
            .await
    }
}

#[async_trait]
impl ChangesHandler for RecordingHandler {
    async fn change(
        &self,
        ctx: &DispatchContext,
        _subject: &Subject,
        entry: &Entry,
        change: &Change,
    ) -> HandlerResult {
        self.record(ctx, "change", &format!("{}/{}", entry.id, change.field))
            .await
    }
}

#[async_trait]
impl MessagingHandler for RecordingHandler {
    async fn messaging(
        &self,
        ctx: &DispatchContext,
        _subject: &Subject,
        entry: &Entry,
        messaging: &Messaging,
    ) -> HandlerResult {
        self.record(ctx, "messaging", &format!("{}/{}", entry.id, messaging.kind()))
            .await
    }
}

#[async_trait]
impl InstagramMentionHandler for RecordingHandler {
    async fn instagram_mention(
        &self,
        ctx: &DispatchContext,
        _entry: &Entry,
        mention: &Mention,
    ) -> HandlerResult {
        let id = if mention.comment_id.is_empty() {
            mention.media_id.clone()
        } else {
            format!("{}/{}", mention.media_id, mention.comment_id)
        };
        self.record(ctx, "mention", &id).await
    }
}

#[async_trait]
impl InstagramStoryInsightsHandler for RecordingHandler {
    async fn instagram_story_insights(
        &self,
        ctx: &DispatchContext,
        _entry: &Entry,
        insights: &StoryInsights,
    ) -> HandlerResult {
        self.record(ctx, "story_insights", &insights.media_id).await
    }
}

#[async_trait]
impl InstagramMessageHandler for RecordingHandler {
    async fn instagram_message(
        &self,
        ctx: &DispatchContext,
        _entry: &Entry,
        event: &MessageEvent,
    ) -> HandlerResult {
        self.record(ctx, "message", &event.message.id).await
    }
}

#[async_trait]
impl InstagramPostbackHandler for RecordingHandler {
    async fn instagram_postback(
        &self,
        ctx: &DispatchContext,
        _entry: &Entry,
        event: &PostbackEvent,
    ) -> HandlerResult {
        self.record(ctx, "postback", &event.postback.id).await
    }
}

#[async_trait]
impl InstagramReferralHandler for RecordingHandler {
    async fn instagram_referral(
        &self,
        ctx: &DispatchContext,
        _entry: &Entry,
        event: &ReferralEvent,
    ) -> HandlerResult {
        self.record(ctx, "referral", &event.referral.reference).await
    }
}

// ============================================================================
// Signing
// ============================================================================

/// `sha256=<hex>` signature of `body` under `secret`.
pub fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(body);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

// ============================================================================
// App builders
// ============================================================================

pub fn test_config() -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.webhooks.secret = SECRET.to_string();
    config.webhooks.verify_token = VERIFY_TOKEN.to_string();
    config.server.webhook_path = WEBHOOK_PATH.to_string();
    config
}

/// Router over a pipeline built from `config` and customised by `register`.
pub fn create_app(
    config: ServiceConfig,
    register: impl FnOnce(WebhooksBuilder) -> WebhooksBuilder,
) -> Router {
    let webhooks = register(Webhooks::builder().with_config(&config.webhooks))
        .build()
        .unwrap();
    create_router(AppState::new(config, webhooks))
}

/// Router with `handler` registered for every Instagram leaf.
pub fn create_instagram_app(handler: Arc<RecordingHandler>) -> Router {
    create_app(test_config(), |builder| builder.instagram_handler(handler))
}

// ============================================================================
// Requests
// ============================================================================

pub fn signed_post(body: &[u8]) -> Request<Body> {
    post_with_signature(body, Some(sign(SECRET, body)))
}

pub fn post_with_signature(body: &[u8], signature: Option<String>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(WEBHOOK_PATH)
        .header("content-type", "application/json");
    if let Some(signature) = signature {
        builder = builder.header("X-Hub-Signature-256", signature);
    }
    builder.body(Body::from(body.to_vec())).unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub async fn read_body(response: Response) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

pub async fn read_json(response: Response) -> serde_json::Value {
    serde_json::from_slice(&read_body(response).await).unwrap()
}

// ============================================================================
// Payloads
// ============================================================================

pub fn to_body(document: &serde_json::Value) -> Vec<u8> {
    serde_json::to_vec(document).unwrap()
}

pub fn messaging_item(sender: &str, recipient: &str, shape: serde_json::Value) -> serde_json::Value {
    let mut item = serde_json::json!({
        "sender": { "id": sender },
        "recipient": { "id": recipient },
        "timestamp": 1569262485349_i64,
    });
    if let (Some(item), Some(shape)) = (item.as_object_mut(), shape.as_object()) {
        for (key, value) in shape {
            item.insert(key.clone(), value.clone());
        }
    }
    item
}

/// Event with `entries` entries, each carrying `changes` mentions and
/// `messages` messages with ids unique across the event.
pub fn generated_event(entries: usize, changes: usize, messages: usize) -> serde_json::Value {
    let entry: Vec<serde_json::Value> = (0..entries)
        .map(|e| {
            let changes: Vec<serde_json::Value> = (0..changes)
                .map(|c| {
                    serde_json::json!({
                        "field": "mentions",
                        "value": { "media_id": format!("media-{e}-{c}") }
                    })
                })
                .collect();
            let messaging: Vec<serde_json::Value> = (0..messages)
                .map(|m| {
                    messaging_item(
                        "567",
                        &format!("page-{e}"),
                        serde_json::json!({ "message": { "mid": format!("mid-{e}-{m}"), "text": "hi" } }),
                    )
                })
                .collect();
            serde_json::json!({
                "id": format!("page-{e}"),
                "time": 1569262486134_i64 + e as i64,
                "changes": changes,
                "messaging": messaging,
            })
        })
        .collect();

    serde_json::json!({ "object": "instagram", "entry": entry })
}
