//! # parlor-server
//!
//! Axum WebSocket transport for the Parlor chat relay.
//!
//! - `GET /ws`: one relay session per upgraded connection, with Ping/Pong
//!   heartbeat and a per-connection bounded send queue
//! - `GET /health`: liveness plus connection counters
//! - Layered configuration via `figment`
//! - Graceful shutdown via `CancellationToken` and a session `TaskTracker`

#![deny(unsafe_code)]

pub mod config;
pub mod health;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use config::{ConfigError, ServerConfig};
pub use server::RelayServer;
pub use shutdown::ShutdownCoordinator;
