//! Typed webhook event model and its decoder.
//!
//! An [`Event`] is decoded once per delivery and shared read-only with every
//! handler. Decoding runs in two phases: serde reads the envelope into private
//! raw structs, then each change and messaging item is resolved into a closed
//! sum type ([`ChangeValue`], [`Messaging`]). Anything the resolver does not
//! recognise is reported as a field-scoped [`DecodeError`].

use crate::error::DecodeError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

mod changes;
mod messaging;

pub use changes::{supported_change_fields, Change, ChangeValue, Mention, StoryInsights};
pub use messaging::{
    Attachment, AttachmentPayload, Message, MessageEvent, Messaging, MessagingHeader, Participant,
    Postback, PostbackEvent, QuickReply, Referral, ReferralEvent, ReferralProduct, ReplyTo,
    StoryReply,
};

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;

// ============================================================================
// Subject
// ============================================================================

/// Webhook topic carried in the `object` field.
///
/// Unknown topics are preserved so a custom handler can decide what to do
/// with them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Subject {
    Instagram,
    Other(String),
}

impl Subject {
    pub const INSTAGRAM: &'static str = "instagram";

    pub fn as_str(&self) -> &str {
        match self {
            Self::Instagram => Self::INSTAGRAM,
            Self::Other(name) => name,
        }
    }

    pub fn is_instagram(&self) -> bool {
        matches!(self, Self::Instagram)
    }
}

impl From<String> for Subject {
    fn from(value: String) -> Self {
        if value == Self::INSTAGRAM {
            Self::Instagram
        } else {
            Self::Other(value)
        }
    }
}

impl From<&str> for Subject {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<Subject> for String {
    fn from(value: Subject) -> Self {
        match value {
            Subject::Instagram => Subject::INSTAGRAM.to_string(),
            Subject::Other(name) => name,
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Event and Entry
// ============================================================================

/// One inbound webhook delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub subject: Subject,
    pub entries: Vec<Entry>,
}

/// One unit of change for a subject at a point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    /// Id of the account the entry belongs to. Never empty.
    pub id: String,
    /// Milliseconds since the Unix epoch. Never zero.
    pub time: i64,
    pub changes: Vec<Change>,
    pub messaging: Vec<Messaging>,
}

impl Entry {
    /// Entry time as a UTC timestamp, `None` when out of range.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.time)
    }

    fn from_raw(index: usize, raw: RawEntry) -> Result<Self, DecodeError> {
        if raw.id.is_empty() {
            return Err(DecodeError::MissingEntryField { index, field: "id" });
        }
        if raw.time == 0 {
            return Err(DecodeError::MissingEntryField {
                index,
                field: "time",
            });
        }

        let changes = raw
            .changes
            .into_iter()
            .map(|change| Change::decode(&raw.id, change.field, change.value))
            .collect::<Result<Vec<_>, _>>()?;

        let messaging = raw
            .messaging
            .iter()
            .enumerate()
            .map(|(position, value)| Messaging::decode(&raw.id, position, value))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            id: raw.id,
            time: raw.time,
            changes,
            messaging,
        })
    }
}

impl Event {
    /// Decode an event from the raw request body.
    pub fn decode(body: &[u8]) -> Result<Self, DecodeError> {
        let document: Value = serde_json::from_slice(body).map_err(DecodeError::MalformedJson)?;
        Self::from_value(&document)
    }

    /// Decode an event from an already parsed JSON document.
    pub fn from_value(document: &Value) -> Result<Self, DecodeError> {
        let raw = RawEvent::deserialize(document).map_err(DecodeError::InvalidStructure)?;

        let entries = raw
            .entry
            .into_iter()
            .enumerate()
            .map(|(index, entry)| Entry::from_raw(index, entry))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            subject: raw.object,
            entries,
        })
    }

    /// Number of leaf items (changes plus messaging) across all entries.
    pub fn item_count(&self) -> usize {
        self.entries
            .iter()
            .map(|entry| entry.changes.len() + entry.messaging.len())
            .sum()
    }
}

// ============================================================================
// Wire representation
// ============================================================================

#[derive(Deserialize)]
struct RawEvent {
    object: Subject,
    #[serde(default)]
    entry: Vec<RawEntry>,
}

#[derive(Deserialize)]
struct RawEntry {
    #[serde(default)]
    id: String,
    #[serde(default)]
    time: i64,
    #[serde(default)]
    changes: Vec<RawChange>,
    #[serde(default)]
    messaging: Vec<Value>,
}

#[derive(Deserialize)]
struct RawChange {
    field: String,
    #[serde(default)]
    value: Option<Value>,
}
