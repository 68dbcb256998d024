//! Web server for the pairing page.
//!
//! Serves the static pairing UI, a health endpoint, and the `/ws` event
//! stream the browser uses to drive pairing. Spawned as a background task
//! from `main`, same pattern as the gateway loop.

mod ws;
#[cfg(test)]
mod tests;

use axum::{extract::State, response::Json, routing::get, Router};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tower_http::services::ServeDir;
use tracing::{error, info};
use waylink_core::config::ServerConfig;

use crate::pairing::Coordinator;

/// Shared state for HTTP and WebSocket handlers.
#[derive(Clone)]
pub struct ServerState {
    coordinator: Arc<Coordinator>,
    started: Instant,
}

impl ServerState {
    pub fn new(coordinator: Arc<Coordinator>) -> Self {
        Self {
            coordinator,
            started: Instant::now(),
        }
    }
}

/// Build the axum router: API routes first, static pairing page as fallback.
pub fn build_router(state: ServerState, public_dir: &Path) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/ws", get(ws::websocket_handler))
        .fallback_service(ServeDir::new(public_dir))
        .with_state(state)
}

/// `GET /api/health` — liveness plus the current connection state.
async fn health(State(state): State<ServerState>) -> Json<Value> {
    let snapshot = state.coordinator.snapshot().await;
    Json(json!({
        "status": "ok",
        "connection": snapshot.state,
        "uptime_secs": state.started.elapsed().as_secs(),
    }))
}

/// Bind and run the server until the process exits.
pub async fn serve(config: ServerConfig, coordinator: Arc<Coordinator>) {
    let state = ServerState::new(coordinator);
    let app = build_router(state, Path::new(&config.public_dir));
    let addr = format!("{}:{}", config.host, config.port);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("web server failed to bind to {addr}: {e}");
            return;
        }
    };

    info!("pairing page available at http://{addr}");

    if let Err(e) = axum::serve(listener, app).await {
        error!("web server error: {e}");
    }
}
