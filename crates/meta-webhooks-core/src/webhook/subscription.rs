//! Verify-token handshake performed when a subscription is created.

use crate::error::SubscriptionError;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

#[cfg(test)]
#[path = "subscription_tests.rs"]
mod tests;

const SUBSCRIBE_MODE: &str = "subscribe";

/// Query parameters of the verification `GET` request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionQuery {
    #[serde(rename = "hub.mode", default)]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token", default)]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge", default)]
    pub challenge: Option<String>,
}

impl SubscriptionQuery {
    pub fn new(
        mode: impl Into<String>,
        verify_token: impl Into<String>,
        challenge: impl Into<String>,
    ) -> Self {
        Self {
            mode: Some(mode.into()),
            verify_token: Some(verify_token.into()),
            challenge: Some(challenge.into()),
        }
    }
}

/// Return the challenge to echo back when the handshake matches `expected_token`.
pub(crate) fn verify(
    expected_token: &str,
    query: &SubscriptionQuery,
) -> Result<String, SubscriptionError> {
    if query.mode.as_deref() != Some(SUBSCRIBE_MODE) {
        return Err(SubscriptionError::VerificationFailed);
    }

    let token = query.verify_token.as_deref().unwrap_or_default();
    if !bool::from(token.as_bytes().ct_eq(expected_token.as_bytes())) {
        return Err(SubscriptionError::VerificationFailed);
    }

    match query.challenge.as_deref() {
        Some(challenge) if !challenge.is_empty() => Ok(challenge.to_string()),
        _ => Err(SubscriptionError::VerificationFailed),
    }
}
