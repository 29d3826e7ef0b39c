//! `RelayServer`: Axum HTTP + WebSocket server around the chat relay.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{ConnectInfo, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use chrono::{DateTime, Utc};
use parlor_core::ConnectionId;
use parlor_relay::{ChatService, ConnectionEvents};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::health::{self, HealthResponse};
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::{SessionSettings, run_ws_session};

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// The chat relay.
    pub relay: Arc<ChatService>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// When the server started (monotonic).
    pub start_time: Instant,
    /// When the server started (wall clock).
    pub started_at: DateTime<Utc>,
}

/// The Parlor server.
pub struct RelayServer {
    config: Arc<ServerConfig>,
    relay: Arc<ChatService>,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
    started_at: DateTime<Utc>,
}

impl RelayServer {
    /// Create a new server with an empty relay.
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config: Arc::new(config),
            relay: Arc::new(ChatService::new()),
            shutdown: Arc::new(ShutdownCoordinator::new()),
            start_time: Instant::now(),
            started_at: Utc::now(),
        }
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            relay: self.relay.clone(),
            config: self.config.clone(),
            shutdown: self.shutdown.clone(),
            start_time: self.start_time,
            started_at: self.started_at,
        };

        Router::new()
            .route("/health", get(health_handler))
            .route("/ws", get(ws_handler))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// Bind the configured address and serve until shutdown.
    ///
    /// Returns the bound address (useful with port `0`) and the serve task.
    pub async fn listen(&self) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
        let listener = TcpListener::bind(self.config.bind_addr()).await?;
        let addr = listener.local_addr()?;
        info!(%addr, "parlor server listening");

        let app = self.router();
        let token = self.shutdown.token();
        let handle = tokio::spawn(async move {
            let result = axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(token.cancelled_owned())
            .await;
            if let Err(e) = result {
                error!(error = %e, "server error");
            }
            debug!("listener stopped");
        });

        Ok((addr, handle))
    }

    /// The chat relay.
    pub fn relay(&self) -> &Arc<ChatService> {
        &self.relay
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let registry = state.relay.registry();
    Json(health::health_check(
        state.start_time,
        state.started_at,
        registry.len(),
        registry.named_count(),
    ))
}

/// GET /ws
async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> Response {
    if state.shutdown.is_shutting_down() {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    let conn_id = ConnectionId::new();
    info!(conn_id = %conn_id, %peer, "websocket upgrade requested");

    let events: Arc<dyn ConnectionEvents> = state.relay.clone();
    let settings = SessionSettings::from(state.config.as_ref());
    let token = state.shutdown.token();
    let sessions = state.shutdown.sessions().clone();

    ws.max_message_size(state.config.max_message_size)
        .on_failed_upgrade(move |e| warn!(%peer, error = %e, "websocket upgrade failed"))
        .on_upgrade(move |socket| {
            sessions.track_future(async move {
                let _ = run_ws_session(socket, conn_id, peer, events, settings, token).await;
            })
        })
}
