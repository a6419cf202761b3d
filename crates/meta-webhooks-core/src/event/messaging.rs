//! Messaging items and their structural classification.
//!
//! The platform does not tag messaging items with a kind. A payload is
//! classified by probing the known shapes in a fixed order and accepting the
//! first one whose identifying field is non-empty:
//!
//! 1. [`MessageEvent`] when `message.mid` is set
//! 2. [`PostbackEvent`] when `postback.mid` is set
//! 3. [`ReferralEvent`] when `referral.type` is set
//!
//! A payload that carries both a message and a postback is therefore always a
//! message. If the platform ever sends such a payload intentionally the
//! postback part is not delivered.

use crate::error::DecodeError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[cfg(test)]
#[path = "messaging_tests.rs"]
mod tests;

// ============================================================================
// Classified item
// ============================================================================

/// One messaging item of an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Messaging {
    Message(MessageEvent),
    Postback(PostbackEvent),
    Referral(ReferralEvent),
}

type Sniffer = fn(&Value) -> Option<Messaging>;

/// Shape sniffers in priority order.
const SNIFFERS: &[Sniffer] = &[sniff_message, sniff_postback, sniff_referral];

fn sniff_message(value: &Value) -> Option<Messaging> {
    MessageEvent::deserialize(value)
        .ok()
        .filter(|event| !event.message.id.is_empty())
        .map(Messaging::Message)
}

fn sniff_postback(value: &Value) -> Option<Messaging> {
    PostbackEvent::deserialize(value)
        .ok()
        .filter(|event| !event.postback.id.is_empty())
        .map(Messaging::Postback)
}

fn sniff_referral(value: &Value) -> Option<Messaging> {
    ReferralEvent::deserialize(value)
        .ok()
        .filter(|event| !event.referral.kind.is_empty())
        .map(Messaging::Referral)
}

impl Messaging {
    pub(crate) fn decode(entry_id: &str, index: usize, value: &Value) -> Result<Self, DecodeError> {
        SNIFFERS
            .iter()
            .find_map(|sniff| sniff(value))
            .ok_or_else(|| DecodeError::UnrecognizedMessagingShape {
                entry_id: entry_id.to_string(),
                index,
            })
    }

    pub fn header(&self) -> &MessagingHeader {
        match self {
            Self::Message(event) => &event.header,
            Self::Postback(event) => &event.header,
            Self::Referral(event) => &event.header,
        }
    }

    /// Short name of the variant, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Message(_) => "message",
            Self::Postback(_) => "postback",
            Self::Referral(_) => "referral",
        }
    }
}

// ============================================================================
// Shapes
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    #[serde(default)]
    pub id: String,
}

/// Fields shared by every messaging shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagingHeader {
    #[serde(default)]
    pub sender: Participant,
    #[serde(default)]
    pub recipient: Participant,
    /// Milliseconds since the Unix epoch.
    #[serde(default)]
    pub timestamp: i64,
}

/// A message was sent, edited away or echoed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEvent {
    #[serde(flatten)]
    pub header: MessagingHeader,
    pub message: Message,
}

/// A button or ice-breaker was tapped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostbackEvent {
    #[serde(flatten)]
    pub header: MessagingHeader,
    pub postback: Postback,
}

/// The user entered the conversation through a referral link or ad.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferralEvent {
    #[serde(flatten)]
    pub header: MessagingHeader,
    pub referral: Referral,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Message {
    #[serde(rename = "mid")]
    pub id: String,
    pub text: String,
    pub attachments: Vec<Attachment>,
    pub referral: Option<Referral>,
    pub is_deleted: bool,
    pub is_echo: bool,
    pub is_unsupported: bool,
    pub reply_to: Option<ReplyTo>,
    pub quick_reply: Option<QuickReply>,
}

/// Message or story the message replies to. Exactly one side is set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplyTo {
    #[serde(rename = "mid")]
    pub id: String,
    pub story: Option<StoryReply>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoryReply {
    pub id: String,
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuickReply {
    pub payload: String,
}

/// Media attached to a message.
///
/// `kind` (`image`, `story_mention`, `reel`, `ig_reel`, `like_heart`, ...)
/// decides which payload fields carry meaning; all of them are always present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Attachment {
    #[serde(rename = "type")]
    pub kind: String,
    pub payload: AttachmentPayload,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttachmentPayload {
    pub url: String,
    pub title: String,
    pub sticker_id: String,
    pub reel_video_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Postback {
    #[serde(rename = "mid")]
    pub id: String,
    pub title: String,
    pub payload: String,
    pub referral: Option<Referral>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Referral {
    #[serde(rename = "type")]
    pub kind: String,
    pub source: String,
    #[serde(rename = "ref")]
    pub reference: String,
    pub product: Option<ReferralProduct>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferralProduct {
    pub id: String,
}
