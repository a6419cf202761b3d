//! # Meta Webhooks Service
//!
//! Binary entry point for the Meta webhooks HTTP service.
//!
//! This executable:
//! - Loads configuration from files and environment
//! - Initializes logging
//! - Builds the webhook pipeline with a [`LoggingHandler`] for every
//!   Instagram event
//! - Starts the HTTP server from meta-webhooks-api

mod logging_handler;

use logging_handler::LoggingHandler;
use meta_webhooks_api::{start_server, ConfigError, LoggingConfig, ServiceConfig, ServiceError};
use meta_webhooks_core::Webhooks;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const CONFIG_FILE_ENV: &str = "MW_CONFIG_FILE";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let loaded = load_configuration();

    // Logging settings come from the configuration, so a broken configuration
    // is reported with the defaults.
    let logging = loaded
        .as_ref()
        .map(|config| config.logging.clone())
        .unwrap_or_default();
    init_tracing(&logging);

    info!("Starting Meta Webhooks Service");

    let service_config = match loaded {
        Ok(config) => config,
        Err(e) => {
            error!(
                error = %e,
                "Could not load service configuration; aborting. \
                 Fix the configuration and restart."
            );
            std::process::exit(3);
        }
    };

    if let Err(e) = service_config.validate() {
        error!(error = %e, "Service configuration is invalid; aborting");
        std::process::exit(3);
    }

    if service_config.webhooks.secret.is_empty() {
        warn!("webhooks.secret is empty; payload signatures will NOT be verified");
    }
    if service_config.webhooks.verify_token.is_empty() {
        warn!("webhooks.verify_token is empty; any handshake sending an empty hub.verify_token will be accepted");
    }

    let webhooks = match Webhooks::builder()
        .with_config(&service_config.webhooks)
        .instagram_handler(Arc::new(LoggingHandler))
        .build()
    {
        Ok(webhooks) => webhooks,
        Err(e) => {
            let e = ServiceError::from(ConfigError::Pipeline(e));
            error!(error = %e, "Failed to build webhook pipeline; aborting");
            std::process::exit(e.exit_code());
        }
    };

    info!(
        host = %service_config.server.host,
        port = service_config.server.port,
        path = %service_config.server.webhook_path,
        "Starting HTTP server"
    );

    if let Err(e) = start_server(service_config, webhooks).await {
        error!("Failed to start server: {}", e);
        std::process::exit(e.exit_code());
    }

    Ok(())
}

// ============================================================================
// Private helpers
// ============================================================================

/// Load configuration from every source.
///
/// Sources (applied in order, later sources override earlier ones):
///  1. `/etc/meta-webhooks/service.yaml`: system-wide defaults
///  2. `./config/service.yaml`: deployment-local override
///  3. Path given by `MW_CONFIG_FILE`: operator-specified file, must exist
///  4. Environment variables prefixed `MW__` (double-underscore separator),
///     e.g. `MW__SERVER__PORT=9090` sets `server.port = 9090`
///
/// All fields carry serde defaults, so an unconfigured environment yields the
/// built-in defaults. A malformed file or a value of the wrong type is an error.
fn load_configuration() -> Result<ServiceConfig, config::ConfigError> {
    let mut config_builder = config::Config::builder()
        .add_source(
            config::File::with_name("/etc/meta-webhooks/service")
                .required(false)
                .format(config::FileFormat::Yaml),
        )
        .add_source(
            config::File::with_name("config/service")
                .required(false)
                .format(config::FileFormat::Yaml),
        );

    if let Ok(explicit_path) = std::env::var(CONFIG_FILE_ENV) {
        if !explicit_path.is_empty() {
            config_builder = config_builder.add_source(
                config::File::with_name(&explicit_path)
                    .required(true)
                    .format(config::FileFormat::Yaml),
            );
        }
    }

    config_builder
        .add_source(config::Environment::with_prefix("MW").separator("__"))
        .build()?
        .try_deserialize()
}

/// `RUST_LOG` wins over the configured level.
fn init_tracing(logging: &LoggingConfig) {
    let level = logging.level.to_ascii_lowercase();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "meta_webhooks_service={level},meta_webhooks_api={level},meta_webhooks_core={level},tower_http=debug"
        )
        .into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    if logging.json_format {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}
