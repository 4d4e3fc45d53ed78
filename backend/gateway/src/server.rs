//! Main HTTP gateway server.
//!
//! Owns the process-wide presence registry and the routing table.

use anyhow::{Context, Result};
use axum::{
    http::{header, HeaderValue, Method},
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, instrument};

use chatrelay_core::RelayError;

use crate::health_api;
use crate::presence::PresenceRegistry;
use crate::ws_server;

/// Largest inbound WebSocket message. A bigger frame is a protocol error and
/// ends the connection, which releases the sender's presence entry.
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 1024 * 1024;

/// Settings the gateway needs from the outer configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub addr: SocketAddr,
    /// Browser origin allowed by CORS, e.g. `http://localhost:3000`.
    pub frontend_url: String,
}

/// Application state shared across routes.
#[derive(Clone)]
pub struct GatewayState {
    pub registry: PresenceRegistry,
    pub started_at: DateTime<Utc>,
    pub max_message_bytes: usize,
}

impl GatewayState {
    pub fn new(registry: PresenceRegistry) -> Self {
        Self {
            registry,
            started_at: Utc::now(),
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
        }
    }

    pub fn with_max_message_bytes(mut self, max_message_bytes: usize) -> Self {
        self.max_message_bytes = max_message_bytes;
        self
    }
}

/// CORS restricted to the front-end origin, with credentials.
pub fn cors_layer(frontend_url: &str) -> Result<CorsLayer, RelayError> {
    let origin = frontend_url
        .trim_end_matches('/')
        .parse::<HeaderValue>()
        .map_err(|_| RelayError::ConfigError(format!("invalid frontend origin: {frontend_url}")))?;

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]))
}

pub fn build_router(state: GatewayState, cors: CorsLayer) -> Router {
    Router::new()
        .route("/ws", get(ws_server::ws_handler))
        .route("/ping", get(health_api::ping))
        .route("/api/health", get(health_api::get_health))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Starts the relay and serves until Ctrl-C or SIGTERM.
#[instrument(skip(config, state), fields(addr = %config.addr))]
pub async fn start_server(config: GatewayConfig, state: GatewayState) -> Result<()> {
    let cors = cors_layer(&config.frontend_url)?;
    let app = build_router(state, cors);

    let listener = TcpListener::bind(&config.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.addr))?;
    info!(frontend = %config.frontend_url, "Chat relay listening on {}", config.addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("relay server failed")?;

    info!("Chat relay stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
