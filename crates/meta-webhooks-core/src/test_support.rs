//! Recording handlers shared by unit tests.

use crate::dispatch::DispatchContext;
use crate::event::{
    Change, Entry, Mention, MessageEvent, Messaging, PostbackEvent, ReferralEvent, StoryInsights,
    Subject,
};
use crate::handler::{
    ChangesHandler, EntryHandler, HandlerResult, InstagramMentionHandler, InstagramMessageHandler,
    InstagramPostbackHandler, InstagramReferralHandler, InstagramStoryInsightsHandler,
    MessagingHandler,
};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Implements every handler trait and records each call as `"<kind>:<id>"`.
#[derive(Default)]
pub(crate) struct RecordingHandler {
    calls: Mutex<Vec<String>>,
    fail_kind: Option<&'static str>,
    delay: Option<Duration>,
}

impl RecordingHandler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Handler whose calls of `kind` return an error after recording.
    pub fn failing(kind: &'static str) -> Arc<Self> {
        Arc::new(Self {
            fail_kind: Some(kind),
            ..Self::default()
        })
    }

    /// Handler that sleeps for `delay` before returning, ignoring cancellation.
    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay: Some(delay),
            ..Self::default()
        })
    }

    pub fn calls(&self) -> Vec<String> {
        let mut calls = self.calls.lock().unwrap().clone();
        calls.sort();
        calls
    }

    pub fn count(&self, kind: &str) -> usize {
        let prefix = format!("{kind}:");
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.starts_with(&prefix))
            .count()
    }

    async fn record(&self, kind: &'static str, id: &str) -> HandlerResult {
        self.calls.lock().unwrap().push(format!("{kind}:{id}"));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_kind == Some(kind) {
            return Err(format!("{kind} handler failed for {id}").into());
        }
        Ok(())
    }
}

#[async_trait]
impl EntryHandler for RecordingHandler {
    async fn entry(&self, _ctx: &DispatchContext, _subject: &Subject, entry: &Entry) -> HandlerResult {
        self.record("entry", &entry.id).await
    }
}

#[async_trait]
impl ChangesHandler for RecordingHandler {
    async fn change(
        &self,
        _ctx: &DispatchContext,
        _subject: &Subject,
        _entry: &Entry,
        change: &Change,
    ) -> HandlerResult {
        self.record("change", &change.field).await
    }
}

#[async_trait]
impl MessagingHandler for RecordingHandler {
    async fn messaging(
        &self,
        _ctx: &DispatchContext,
        _subject: &Subject,
        _entry: &Entry,
        messaging: &Messaging,
    ) -> HandlerResult {
        self.record("messaging", messaging.kind()).await
    }
}

#[async_trait]
impl InstagramMentionHandler for RecordingHandler {
    async fn instagram_mention(
        &self,
        _ctx: &DispatchContext,
        _entry: &Entry,
        mention: &Mention,
    ) -> HandlerResult {
        self.record("mention", &mention.media_id).await
    }
}

#[async_trait]
impl InstagramStoryInsightsHandler for RecordingHandler {
    async fn instagram_story_insights(
        &self,
        _ctx: &DispatchContext,
        _entry: &Entry,
        insights: &StoryInsights,
    ) -> HandlerResult {
        self.record("story_insights", &insights.media_id).await
    }
}

#[async_trait]
impl InstagramMessageHandler for RecordingHandler {
    async fn instagram_message(
        &self,
        _ctx: &DispatchContext,
        _entry: &Entry,
        message: &MessageEvent,
    ) -> HandlerResult {
        self.record("message", &message.message.id).await
    }
}

#[async_trait]
impl InstagramPostbackHandler for RecordingHandler {
    async fn instagram_postback(
        &self,
        _ctx: &DispatchContext,
        _entry: &Entry,
        postback: &PostbackEvent,
    ) -> HandlerResult {
        self.record("postback", &postback.postback.id).await
    }
}

#[async_trait]
impl InstagramReferralHandler for RecordingHandler {
    async fn instagram_referral(
        &self,
        _ctx: &DispatchContext,
        _entry: &Entry,
        referral: &ReferralEvent,
    ) -> HandlerResult {
        self.record("referral", &referral.referral.kind).await
    }
}

/// Event JSON with two entries covering every leaf kind.
pub(crate) fn full_event_json() -> serde_json::Value {
    serde_json::json!({
        "object": "instagram",
        "entry": [
            {
                "id": "123",
                "time": 1569262486134_i64,
                "changes": [
                    { "field": "mentions", "value": { "media_id": "m1", "comment_id": "c1" } },
                    { "field": "story_insights", "value": { "media_id": "s1", "reach": 3 } }
                ],
                "messaging": [
                    {
                        "sender": { "id": "567" },
                        "recipient": { "id": "123" },
                        "timestamp": 1569262485349_i64,
                        "message": { "mid": "msg1", "text": "hi" }
                    },
                    {
                        "sender": { "id": "567" },
                        "recipient": { "id": "123" },
                        "timestamp": 1569262485350_i64,
                        "postback": { "mid": "pb1", "payload": "START" }
                    }
                ]
            },
            {
                "id": "456",
                "time": 1569262486135_i64,
                "changes": [
                    { "field": "mentions", "value": { "media_id": "m2" } }
                ],
                "messaging": [
                    {
                        "sender": { "id": "568" },
                        "recipient": { "id": "456" },
                        "timestamp": 1569262485351_i64,
                        "referral": { "type": "OPEN_THREAD", "source": "ADS", "ref": "x" }
                    }
                ]
            }
        ]
    })
}
