//! HTTP server implementation using Axum.

use crate::handlers::{handle_health, handle_rpc};
use axum::{
    routing::{get, post},
    Router,
};
use opdeck_core::{ConsoleConfig, ServiceController, SystemMonitor};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

/// Application state shared across handlers.
pub struct AppState {
    /// Service, application and script lifecycle
    pub controller: Arc<ServiceController>,
    /// CPU/RAM/temperature and process list readers
    pub monitor: Arc<SystemMonitor>,
    /// Client for service health probes
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(controller: ServiceController) -> Self {
        Self {
            controller: Arc::new(controller),
            monitor: Arc::new(SystemMonitor::new()),
            http: reqwest::Client::new(),
        }
    }

    /// State backed by the live process table and nvidia-smi.
    pub fn from_config(config: ConsoleConfig) -> Self {
        Self::new(opdeck_core::default_controller(config))
    }
}

/// Build the router without binding a socket.
pub fn build_router(state: AppState) -> Router {
    // The console UI is served from another origin during development
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/rpc", post(handle_rpc))
        .layer(cors)
        .with_state(Arc::new(state))
}

/// Start the JSON-RPC HTTP server.
///
/// Returns the actual address the server is bound to (useful when port=0).
pub async fn start_server(state: AppState, host: &str, port: u16) -> anyhow::Result<SocketAddr> {
    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    info!("Server listening on {}", actual_addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Server error: {}", e);
        }
    });

    Ok(actual_addr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_server_starts() {
        let state = AppState::from_config(ConsoleConfig::default());
        let addr = start_server(state, "127.0.0.1", 0).await.unwrap();
        assert!(addr.port() > 0);
    }

    #[tokio::test]
    async fn test_rejects_bad_host() {
        let state = AppState::from_config(ConsoleConfig::default());
        assert!(start_server(state, "not a host", 0).await.is_err());
    }
}
