//! Serializable webhook settings.

use super::signature::DEFAULT_SIGNATURE_HEADER;
use serde::{Deserialize, Serialize};

/// Settings applied through [`super::WebhooksBuilder::with_config`].
///
/// Every field has a default so partial configuration files deserialize.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct WebhooksConfig {
    /// App secret used to verify payload signatures. Empty disables verification.
    pub secret: String,

    /// Token expected in the subscription handshake.
    pub verify_token: String,

    /// Header carrying the payload signature.
    pub signature_header: String,

    /// Skip messages the app sent itself.
    pub ignore_echo_messages: bool,
}

impl Default for WebhooksConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            verify_token: String::new(),
            signature_header: DEFAULT_SIGNATURE_HEADER.to_string(),
            ignore_echo_messages: false,
        }
    }
}

impl std::fmt::Debug for WebhooksConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |value: &str| if value.is_empty() { "<EMPTY>" } else { "<REDACTED>" };
        f.debug_struct("WebhooksConfig")
            .field("secret", &redact(&self.secret))
            .field("verify_token", &redact(&self.verify_token))
            .field("signature_header", &self.signature_header)
            .field("ignore_echo_messages", &self.ignore_echo_messages)
            .finish()
    }
}
