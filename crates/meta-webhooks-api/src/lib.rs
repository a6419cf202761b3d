//! # Meta Webhooks HTTP Service
//!
//! HTTP adapter for [`meta_webhooks_core::Webhooks`].
//!
//! This service provides:
//! - the subscription handshake (`GET <webhook_path>`)
//! - event delivery with signature verification (`POST <webhook_path>`)
//! - a health check endpoint (`GET /health`)

pub mod config;
pub mod errors;
pub mod responses;

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;

pub use config::{LoggingConfig, ServerConfig, ServiceConfig};
pub use errors::{ConfigError, ServiceError, WebhookHandlerError};
pub use responses::{HealthResponse, WebhookResponse};

use axum::{
    extract::{DefaultBodyLimit, Query, State},
    http::{HeaderMap, Method},
    response::Json,
    routing::get,
    Router,
};
use bytes::Bytes;
use meta_webhooks_core::{DispatchContext, SubscriptionQuery, WebhookRequest, Webhooks};
use std::{collections::HashMap, future::{Future, IntoFuture}, sync::Arc, time::Duration};
use tokio::sync::Notify;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{info, instrument, warn};
use uuid::Uuid;

// ============================================================================
// Application State
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Configuration for the service
    pub config: Arc<ServiceConfig>,

    /// Pipeline every delivery runs through
    pub webhooks: Arc<Webhooks>,
}

impl AppState {
    /// Create new application state
    pub fn new(config: ServiceConfig, webhooks: Webhooks) -> Self {
        Self {
            config: Arc::new(config),
            webhooks: Arc::new(webhooks),
        }
    }
}

// ============================================================================
// HTTP Server
// ============================================================================

/// Create HTTP router with all endpoints
pub fn create_router(state: AppState) -> Router {
    let webhook_routes = Router::new().route(
        &state.config.server.webhook_path,
        get(handle_subscription).post(handle_webhook),
    );

    let health_routes = Router::new().route("/health", get(handle_health_check));

    Router::new()
        .merge(webhook_routes)
        .merge(health_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(DefaultBodyLimit::max(state.config.server.max_body_size))
                .into_inner(),
        )
        .with_state(state)
}

/// Start HTTP server
pub async fn start_server(config: ServiceConfig, webhooks: Webhooks) -> Result<(), ServiceError> {
    config.validate()?;

    let address = format!("{}:{}", config.server.host, config.server.port);
    let shutdown_timeout = Duration::from_secs(config.server.shutdown_timeout_seconds);

    let state = AppState::new(config, webhooks);
    let app = create_router(state);

    let listener =
        tokio::net::TcpListener::bind(&address)
            .await
            .map_err(|e| ServiceError::BindFailed {
                address: address.clone(),
                message: e.to_string(),
            })?;

    info!(address = %address, "Starting HTTP server");

    serve(listener, app, shutdown_signal(), shutdown_timeout).await?;

    info!("HTTP server shutdown complete");
    Ok(())
}

/// Serve `app` until `signal` resolves, then give in-flight requests at most
/// `shutdown_timeout` to finish.
async fn serve<S>(
    listener: tokio::net::TcpListener,
    app: Router,
    signal: S,
    shutdown_timeout: Duration,
) -> Result<(), ServiceError>
where
    S: Future<Output = ()> + Send + 'static,
{
    let signalled = Arc::new(Notify::new());
    let notify = Arc::clone(&signalled);
    let graceful = async move {
        signal.await;
        info!(
            timeout_seconds = shutdown_timeout.as_secs_f64(),
            "Initiating graceful shutdown"
        );
        notify.notify_one();
    };

    let server = axum::serve(listener, app)
        .with_graceful_shutdown(graceful)
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => return result.map_err(|e| ServiceError::ServerFailed {
            message: e.to_string(),
        }),
        _ = signalled.notified() => {}
    }

    match tokio::time::timeout(shutdown_timeout, server).await {
        Ok(result) => result.map_err(|e| ServiceError::ServerFailed {
            message: e.to_string(),
        }),
        Err(_) => {
            warn!(
                timeout_seconds = shutdown_timeout.as_secs_f64(),
                "In-flight requests did not finish before the shutdown timeout"
            );
            Err(ServiceError::ServerFailed {
                message: format!(
                    "graceful shutdown did not complete within {}s",
                    shutdown_timeout.as_secs_f64()
                ),
            })
        }
    }
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C signal handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT (Ctrl+C)"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

// ============================================================================
// Webhook Handlers
// ============================================================================

/// Answer the subscription handshake with the challenge as plain text.
#[instrument(skip(state, query))]
pub async fn handle_subscription(
    State(state): State<AppState>,
    Query(query): Query<SubscriptionQuery>,
) -> Result<String, WebhookHandlerError> {
    let challenge = state
        .webhooks
        .verify_subscription(Method::GET.as_str(), &query)?;
    Ok(challenge)
}

/// Verify, decode and dispatch one delivery.
///
/// The response is sent after every handler has returned, or once the
/// configured dispatch timeout expires.
#[instrument(skip(state, headers, body), fields(delivery_id = tracing::field::Empty))]
pub async fn handle_webhook(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>, WebhookHandlerError> {
    let delivery_id = Uuid::new_v4();
    tracing::Span::current().record("delivery_id", tracing::field::display(delivery_id));
    info!(body_len = body.len(), "Received webhook request");

    // A repeated header keeps its first value.
    let mut header_map: HashMap<String, String> = HashMap::new();
    for (name, value) in headers.iter() {
        header_map
            .entry(name.as_str().to_lowercase())
            .or_insert_with(|| value.to_str().unwrap_or("").to_string());
    }

    let request = WebhookRequest::new(method.as_str(), header_map, body);
    let ctx = DispatchContext::with_timeout(Duration::from_millis(
        state.config.server.dispatch_timeout_ms,
    ));

    let event = state.webhooks.handle_request(&ctx, &request).await?;

    info!(
        subject = %event.subject,
        entries = event.entries.len(),
        "Successfully processed webhook"
    );

    Ok(Json(WebhookResponse {
        status: "processed".to_string(),
        delivery_id,
        subject: event.subject.to_string(),
        entries: event.entries.len(),
    }))
}

// ============================================================================
// Health Check Handlers
// ============================================================================

/// Basic health check endpoint
async fn handle_health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
