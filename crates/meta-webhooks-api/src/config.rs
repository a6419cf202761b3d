//! Configuration types for the HTTP service

use crate::errors::ConfigError;
use meta_webhooks_core::WebhooksConfig;
use serde::{Deserialize, Serialize};

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

const HEALTH_PATH: &str = "/health";
const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Service configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct ServiceConfig {
    /// HTTP server settings
    pub server: ServerConfig,

    /// Signature, handshake and echo settings passed to the pipeline
    pub webhooks: WebhooksConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl ServiceConfig {
    /// Reject values the service cannot start with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.logging.validate()?;

        if self.webhooks.signature_header.trim().is_empty() {
            return Err(ConfigError::Missing {
                key: "webhooks.signature_header".to_string(),
            });
        }
        Ok(())
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Path serving both the subscription handshake and deliveries
    pub webhook_path: String,

    /// Time allowed for handlers to finish one delivery, in milliseconds
    pub dispatch_timeout_ms: u64,

    /// Time in-flight requests get to finish after a shutdown signal, in seconds
    pub shutdown_timeout_seconds: u64,

    /// Maximum request size in bytes
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            webhook_path: "/webhooks".to_string(),
            dispatch_timeout_ms: 10_000,
            shutdown_timeout_seconds: 30,
            max_body_size: 1024 * 1024, // 1MB
        }
    }
}

impl ServerConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::Missing {
                key: "server.host".to_string(),
            });
        }
        if !self.webhook_path.starts_with('/') {
            return Err(ConfigError::Invalid {
                message: format!(
                    "server.webhook_path must start with '/', got '{}'",
                    self.webhook_path
                ),
            });
        }
        if self.webhook_path == HEALTH_PATH {
            return Err(ConfigError::Invalid {
                message: format!("server.webhook_path must not be {HEALTH_PATH}"),
            });
        }
        if self.dispatch_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                message: "server.dispatch_timeout_ms must be greater than zero".to_string(),
            });
        }
        if self.max_body_size == 0 {
            return Err(ConfigError::Invalid {
                message: "server.max_body_size must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default level when `RUST_LOG` is not set
    pub level: String,

    /// Enable JSON structured logging
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

impl LoggingConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let level = self.level.to_ascii_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::Invalid {
                message: format!(
                    "logging.level must be one of {}, got '{}'",
                    LOG_LEVELS.join(", "),
                    self.level
                ),
            });
        }
        Ok(())
    }
}
