//! Default handler that writes every Instagram event to the log.

use async_trait::async_trait;
use meta_webhooks_core::{
    DispatchContext, Entry, HandlerResult, InstagramMentionHandler, InstagramMessageHandler,
    InstagramPostbackHandler, InstagramReferralHandler, InstagramStoryInsightsHandler, Mention,
    MessageEvent, PostbackEvent, ReferralEvent, StoryInsights,
};
use tracing::info;

#[cfg(test)]
#[path = "logging_handler_tests.rs"]
mod tests;

/// Logs each Instagram event at `info` and acknowledges it.
///
/// Message text and postback payloads are not logged; only their sizes.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHandler;

#[async_trait]
impl InstagramMentionHandler for LoggingHandler {
    async fn instagram_mention(
        &self,
        _ctx: &DispatchContext,
        entry: &Entry,
        mention: &Mention,
    ) -> HandlerResult {
        info!(
            entry_id = %entry.id,
            media_id = %mention.media_id,
            comment_id = %mention.comment_id,
            "Instagram mention"
        );
        Ok(())
    }
}

#[async_trait]
impl InstagramStoryInsightsHandler for LoggingHandler {
    async fn instagram_story_insights(
        &self,
        _ctx: &DispatchContext,
        entry: &Entry,
        insights: &StoryInsights,
    ) -> HandlerResult {
        info!(
            entry_id = %entry.id,
            media_id = %insights.media_id,
            reach = insights.reach,
            impressions = insights.impressions,
            replies = insights.replies,
            exits = insights.exits,
            taps_forward = insights.taps_forward,
            taps_back = insights.taps_back,
            "Instagram story insights"
        );
        Ok(())
    }
}

#[async_trait]
impl InstagramMessageHandler for LoggingHandler {
    async fn instagram_message(
        &self,
        _ctx: &DispatchContext,
        entry: &Entry,
        event: &MessageEvent,
    ) -> HandlerResult {
        let message = &event.message;
        info!(
            entry_id = %entry.id,
            sender_id = %event.header.sender.id,
            message_id = %message.id,
            text_len = message.text.len(),
            attachments = message.attachments.len(),
            is_echo = message.is_echo,
            is_deleted = message.is_deleted,
            "Instagram message"
        );
        Ok(())
    }
}

#[async_trait]
impl InstagramPostbackHandler for LoggingHandler {
    async fn instagram_postback(
        &self,
        _ctx: &DispatchContext,
        entry: &Entry,
        event: &PostbackEvent,
    ) -> HandlerResult {
        info!(
            entry_id = %entry.id,
            sender_id = %event.header.sender.id,
            postback_id = %event.postback.id,
            title = %event.postback.title,
            payload_len = event.postback.payload.len(),
            "Instagram postback"
        );
        Ok(())
    }
}

#[async_trait]
impl InstagramReferralHandler for LoggingHandler {
    async fn instagram_referral(
        &self,
        _ctx: &DispatchContext,
        entry: &Entry,
        event: &ReferralEvent,
    ) -> HandlerResult {
        info!(
            entry_id = %entry.id,
            sender_id = %event.header.sender.id,
            kind = %event.referral.kind,
            source = %event.referral.source,
            "Instagram referral"
        );
        Ok(())
    }
}
