//! Field-keyed change notifications.

use crate::error::DecodeError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[cfg(test)]
#[path = "changes_tests.rs"]
mod tests;

/// A change notification; `value` is selected by `field`.
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    pub field: String,
    pub value: ChangeValue,
}

/// Decoded value of a [`Change`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeValue {
    Mention(Mention),
    StoryInsights(StoryInsights),
}

/// The account was mentioned in a caption or comment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mention {
    pub media_id: String,
    /// Empty when the mention is in a caption.
    #[serde(default)]
    pub comment_id: String,
}

/// Metrics for a story that expired.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoryInsights {
    pub media_id: String,
    pub exits: i64,
    pub replies: i64,
    pub reach: i64,
    pub taps_forward: i64,
    pub taps_back: i64,
    pub impressions: i64,
}

type ChangeDecoder = fn(&Value) -> Result<ChangeValue, serde_json::Error>;

/// Supported change fields and how to decode their values.
const CHANGE_DECODERS: &[(&str, ChangeDecoder)] = &[
    ("mentions", decode_mention),
    ("story_insights", decode_story_insights),
];

fn decode_mention(value: &Value) -> Result<ChangeValue, serde_json::Error> {
    Mention::deserialize(value).map(ChangeValue::Mention)
}

fn decode_story_insights(value: &Value) -> Result<ChangeValue, serde_json::Error> {
    StoryInsights::deserialize(value).map(ChangeValue::StoryInsights)
}

/// Names of all change fields the decoder understands.
pub fn supported_change_fields() -> impl Iterator<Item = &'static str> {
    CHANGE_DECODERS.iter().map(|(field, _)| *field)
}

impl Change {
    pub(crate) fn decode(
        entry_id: &str,
        field: String,
        value: Option<Value>,
    ) -> Result<Self, DecodeError> {
        let Some((_, decoder)) = CHANGE_DECODERS.iter().find(|(name, _)| *name == field) else {
            return Err(DecodeError::UnsupportedField {
                entry_id: entry_id.to_string(),
                field,
            });
        };

        let Some(value) = value else {
            return Err(DecodeError::MissingChangeValue {
                entry_id: entry_id.to_string(),
                field,
            });
        };

        match decoder(&value) {
            Ok(value) => Ok(Self { field, value }),
            Err(source) => Err(DecodeError::InvalidChangeValue {
                entry_id: entry_id.to_string(),
                field,
                source,
            }),
        }
    }
}

impl ChangeValue {
    /// Media the change refers to.
    pub fn media_id(&self) -> &str {
        match self {
            Self::Mention(mention) => &mention.media_id,
            Self::StoryInsights(insights) => &insights.media_id,
        }
    }
}
