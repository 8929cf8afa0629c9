//! Read-only discovery endpoints
//!
//! Plain request/response surface next to the real-time channel:
//! health, the public room list and the game catalogue.

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::service::app::AppState;

/// HTTP server exposing the discovery routes.
pub struct DiscoveryServer {
    addr: String,
    state: Arc<AppState>,
    shutdown_tx: broadcast::Sender<()>,
}

impl DiscoveryServer {
    pub fn new(state: Arc<AppState>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            addr: state.config.http_addr(),
            state,
            shutdown_tx,
        }
    }

    /// Start serving; returns once shut down.
    pub async fn start(&self) -> Result<()> {
        let addr: SocketAddr = self
            .addr
            .parse()
            .context("Invalid discovery server address")?;

        let app = create_router(self.state.clone());
        let listener = TcpListener::bind(addr).await?;
        info!("Discovery server listening on http://{}", addr);

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                info!("Discovery server shutdown signal received");
            })
            .await?;

        info!("Discovery server stopped");
        Ok(())
    }

    /// Signal the serving task to stop.
    pub fn stop(&self) {
        if let Err(e) = self.shutdown_tx.send(()) {
            warn!("Failed to send shutdown signal to discovery server: {}", e);
        }
    }
}

/// Build the Axum router with all discovery routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/rooms", get(rooms_handler))
        .route("/games", get(games_handler))
        .with_state(state)
}

async fn root_handler() -> impl IntoResponse {
    Json(json!({
        "service": "game-lobby",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": ["/health", "/rooms", "/games"]
    }))
}

async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    debug!("Health check requested");
    match state.manager.room_count() {
        Ok(rooms) => (
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "service": state.config.service.name,
                "version": env!("CARGO_PKG_VERSION"),
                "rooms": rooms,
            })),
        ),
        Err(e) => {
            error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unhealthy",
                    "service": state.config.service.name,
                    "version": env!("CARGO_PKG_VERSION"),
                })),
            )
        }
    }
}

/// Public room list (the original lobby's room browser).
async fn rooms_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.manager.list_rooms() {
        Ok(rooms) => (StatusCode::OK, Json(json!({ "rooms": rooms }))),
        Err(e) => {
            error!("Room listing failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "failed to list rooms" })),
            )
        }
    }
}

/// Installable game catalogue, in registration order.
async fn games_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.registry.list_available() {
        Ok(games) => (StatusCode::OK, Json(json!({ "games": games }))),
        Err(e) => {
            error!("Game catalogue listing failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "failed to list games" })),
            )
        }
    }
}
