//! WebSocket transport: per-connection outbound queue, heartbeat and the
//! session loop that drives the relay.

pub mod connection;
pub mod session;

pub use connection::ClientConnection;
pub use session::{DisconnectReason, SessionSettings, run_ws_session};
