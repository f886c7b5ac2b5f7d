pub mod config;
pub mod http;
pub mod room;
pub mod signaling;

pub use config::*;
pub use room::{LeaveReason, RoomRegistry, RoomSnapshot};
pub use signaling::{SignalingOutput, SignalingService, ws_handler};

use anyhow::Context;
use axum::Router;
use axum::routing::{delete, get};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared by every handler: open sockets plus the room registry.
pub struct AppState {
    pub signaling: SignalingService,
    pub registry: RoomRegistry,
}

impl AppState {
    pub fn new() -> Self {
        let signaling = SignalingService::new();
        let registry = RoomRegistry::new(Arc::new(signaling.clone()));
        Self {
            signaling,
            registry,
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(http::status))
        .route("/ws/{user_id}", get(ws_handler))
        .route("/api/rooms", get(http::list_rooms))
        .route("/api/reset-rooms", delete(http::reset_rooms))
        .route("/api/reset-room/{room_id}", delete(http::reset_room))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Serves on an already bound listener until the future is dropped.
pub async fn serve_on(listener: TcpListener, state: Arc<AppState>) -> anyhow::Result<()> {
    axum::serve(listener, router(state))
        .await
        .context("signaling server stopped")
}

/// Binds `config.bind_addr` and serves until Ctrl-C.
pub async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    info!("Signaling server listening on http://{}", config.bind_addr);

    axum::serve(listener, router(Arc::new(AppState::new())))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down signaling server");
        })
        .await
        .context("signaling server stopped")
}
