//! Handler capabilities.
//!
//! Callers plug in at the granularity that suits them:
//!
//! - [`EntryHandler`] receives whole entries and bypasses everything below.
//! - [`ChangesHandler`] and [`MessagingHandler`] receive individual items of
//!   every subject and bypass the leaf handlers of their branch.
//! - The Instagram leaf handlers receive one typed value each.
//!
//! Composite traits ([`InstagramChangesHandler`], [`InstagramMessagingHandler`],
//! [`InstagramHandler`]) are implemented automatically for any type that
//! implements all of their leaves, so one struct can be registered for a whole
//! branch at once.

use crate::dispatch::DispatchContext;
use crate::event::{
    Change, Entry, Mention, MessageEvent, Messaging, PostbackEvent, ReferralEvent, StoryInsights,
    Subject,
};
use async_trait::async_trait;
use std::fmt;

pub(crate) mod resolution;

/// Error returned by caller handlers. Propagated unchanged as the dispatch error.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

pub type HandlerResult = Result<(), HandlerError>;

// ============================================================================
// Coarse capabilities
// ============================================================================

/// Receives every entry of every delivery.
#[async_trait]
pub trait EntryHandler: Send + Sync {
    async fn entry(&self, ctx: &DispatchContext, subject: &Subject, entry: &Entry)
        -> HandlerResult;
}

/// Receives every change of every entry.
#[async_trait]
pub trait ChangesHandler: Send + Sync {
    async fn change(
        &self,
        ctx: &DispatchContext,
        subject: &Subject,
        entry: &Entry,
        change: &Change,
    ) -> HandlerResult;
}

/// Receives every messaging item of every entry.
#[async_trait]
pub trait MessagingHandler: Send + Sync {
    async fn messaging(
        &self,
        ctx: &DispatchContext,
        subject: &Subject,
        entry: &Entry,
        messaging: &Messaging,
    ) -> HandlerResult;
}

// ============================================================================
// Instagram leaf capabilities
// ============================================================================

#[async_trait]
pub trait InstagramMentionHandler: Send + Sync {
    async fn instagram_mention(
        &self,
        ctx: &DispatchContext,
        entry: &Entry,
        mention: &Mention,
    ) -> HandlerResult;
}

#[async_trait]
pub trait InstagramStoryInsightsHandler: Send + Sync {
    async fn instagram_story_insights(
        &self,
        ctx: &DispatchContext,
        entry: &Entry,
        insights: &StoryInsights,
    ) -> HandlerResult;
}

#[async_trait]
pub trait InstagramMessageHandler: Send + Sync {
    async fn instagram_message(
        &self,
        ctx: &DispatchContext,
        entry: &Entry,
        message: &MessageEvent,
    ) -> HandlerResult;
}

#[async_trait]
pub trait InstagramPostbackHandler: Send + Sync {
    async fn instagram_postback(
        &self,
        ctx: &DispatchContext,
        entry: &Entry,
        postback: &PostbackEvent,
    ) -> HandlerResult;
}

#[async_trait]
pub trait InstagramReferralHandler: Send + Sync {
    async fn instagram_referral(
        &self,
        ctx: &DispatchContext,
        entry: &Entry,
        referral: &ReferralEvent,
    ) -> HandlerResult;
}

// ============================================================================
// Composites
// ============================================================================

/// Both Instagram change leaves.
pub trait InstagramChangesHandler: InstagramMentionHandler + InstagramStoryInsightsHandler {}

impl<T> InstagramChangesHandler for T where T: InstagramMentionHandler + InstagramStoryInsightsHandler
{}

/// All three Instagram messaging leaves.
pub trait InstagramMessagingHandler:
    InstagramMessageHandler + InstagramPostbackHandler + InstagramReferralHandler
{
}

impl<T> InstagramMessagingHandler for T where
    T: InstagramMessageHandler + InstagramPostbackHandler + InstagramReferralHandler
{
}

/// Every Instagram leaf.
pub trait InstagramHandler: InstagramChangesHandler + InstagramMessagingHandler {}

impl<T> InstagramHandler for T where T: InstagramChangesHandler + InstagramMessagingHandler {}

// ============================================================================
// Handler kinds
// ============================================================================

/// Leaf handler slots, used to report which one is missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandlerKind {
    InstagramMention,
    InstagramStoryInsights,
    InstagramMessage,
    InstagramPostback,
    InstagramReferral,
}

impl fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::InstagramMention => "instagram mention",
            Self::InstagramStoryInsights => "instagram story insights",
            Self::InstagramMessage => "instagram message",
            Self::InstagramPostback => "instagram postback",
            Self::InstagramReferral => "instagram referral",
        };
        f.write_str(name)
    }
}
