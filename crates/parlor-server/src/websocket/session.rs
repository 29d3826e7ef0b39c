//! WebSocket session lifecycle: handles a single connected client from
//! upgrade through disconnect.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, Utf8Bytes, WebSocket};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use parlor_core::ConnectionId;
use parlor_relay::ConnectionEvents;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::connection::ClientConnection;
use crate::config::ServerConfig;

/// How long the writer gets to flush a Close frame once the session ends.
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Per-session transport settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionSettings {
    /// Outbound frames buffered before sends fail.
    pub send_queue_capacity: usize,
    /// Time between server Ping frames.
    pub heartbeat_interval: Duration,
    /// Idle time after which the client is dropped.
    pub heartbeat_timeout: Duration,
}

impl From<&ServerConfig> for SessionSettings {
    fn from(config: &ServerConfig) -> Self {
        Self {
            send_queue_capacity: config.send_queue_capacity,
            heartbeat_interval: config.heartbeat_interval(),
            heartbeat_timeout: config.heartbeat_timeout(),
        }
    }
}

/// Why a session ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The client sent a Close frame.
    ClientClosed,
    /// The stream ended without a Close frame.
    StreamEnded,
    /// Reading from the socket failed.
    SocketError,
    /// Writing to the socket failed.
    WriteFailed,
    /// No inbound traffic within the heartbeat timeout.
    HeartbeatTimeout,
    /// The server is shutting down.
    Shutdown,
    /// The relay refused the connection identity.
    Rejected,
}

impl DisconnectReason {
    /// Stable label for log fields.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ClientClosed => "client_closed",
            Self::StreamEnded => "stream_ended",
            Self::SocketError => "socket_error",
            Self::WriteFailed => "write_failed",
            Self::HeartbeatTimeout => "heartbeat_timeout",
            Self::Shutdown => "shutdown",
            Self::Rejected => "rejected",
        }
    }
}

/// Run a WebSocket session for a connected client.
///
/// 1. Registers the connection with the relay (`on_connect`)
/// 2. Feeds inbound Text (and UTF-8 Binary) frames to `on_receive`
/// 3. Forwards queued outbound frames and sends periodic Ping frames
/// 4. Closes clients that stay silent past the heartbeat timeout
/// 5. Calls `on_disconnect` exactly once, whatever ended the session
#[instrument(skip_all, fields(conn_id = %conn_id, peer = %peer))]
pub async fn run_ws_session(
    ws: WebSocket,
    conn_id: ConnectionId,
    peer: SocketAddr,
    events: Arc<dyn ConnectionEvents>,
    settings: SessionSettings,
    shutdown: CancellationToken,
) -> DisconnectReason {
    let (mut ws_tx, mut ws_rx) = ws.split();

    let (send_tx, mut send_rx) = mpsc::channel::<Arc<str>>(settings.send_queue_capacity);
    let connection = Arc::new(ClientConnection::new(conn_id.clone(), send_tx));

    if let Err(e) = events.on_connect(conn_id.clone(), connection.clone()) {
        warn!(error = %e, error_kind = e.kind().as_str(), "connection rejected by relay");
        let _ = ws_tx.send(Message::Close(None)).await;
        return DisconnectReason::Rejected;
    }
    info!("client connected");

    // Cancelled by server shutdown, or by either half finishing.
    let session_token = shutdown.child_token();

    let outbound_token = session_token.clone();
    let outbound_conn = connection.clone();
    let outbound = tokio::spawn(async move {
        let reason = forward_outbound(
            &mut ws_tx,
            &mut send_rx,
            &outbound_conn,
            settings,
            &outbound_token,
        )
        .await;
        outbound_token.cancel();
        reason
    });

    let inbound_reason = loop {
        tokio::select! {
            biased;
            () = session_token.cancelled() => break None,
            frame = ws_rx.next() => {
                let msg = match frame {
                    Some(Ok(msg)) => msg,
                    Some(Err(e)) => {
                        debug!(error = %e, "socket read failed");
                        break Some(DisconnectReason::SocketError);
                    }
                    None => break Some(DisconnectReason::StreamEnded),
                };
                connection.mark_alive();

                // Accept text from either Text or Binary frames
                match msg {
                    Message::Text(text) => events.on_receive(&conn_id, text.as_str()),
                    Message::Binary(data) => match std::str::from_utf8(&data) {
                        Ok(text) => events.on_receive(&conn_id, text),
                        Err(_) => debug!(len = data.len(), "ignoring non-UTF8 binary frame"),
                    },
                    Message::Close(_) => {
                        debug!("client sent close frame");
                        break Some(DisconnectReason::ClientClosed);
                    }
                    Message::Ping(_) | Message::Pong(_) => {}
                }
            }
        }
    };

    session_token.cancel();
    let abort = outbound.abort_handle();
    let outbound_reason = match tokio::time::timeout(CLOSE_GRACE, outbound).await {
        Ok(Ok(reason)) => reason,
        _ => {
            abort.abort();
            DisconnectReason::WriteFailed
        }
    };
    let reason = inbound_reason.unwrap_or(outbound_reason);

    events.on_disconnect(&conn_id);
    info!(
        reason = reason.as_str(),
        duration_secs = connection.age().as_secs(),
        dropped_frames = connection.drop_count(),
        "client disconnected"
    );
    reason
}

/// Writer half: queued frames out, Pings on the heartbeat interval.
async fn forward_outbound(
    ws_tx: &mut SplitSink<WebSocket, Message>,
    send_rx: &mut mpsc::Receiver<Arc<str>>,
    connection: &ClientConnection,
    settings: SessionSettings,
    cancel: &CancellationToken,
) -> DisconnectReason {
    let mut ping_interval = tokio::time::interval(settings.heartbeat_interval);
    // Skip the immediate first tick
    let _ = ping_interval.tick().await;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                let _ = ws_tx.send(Message::Close(None)).await;
                return DisconnectReason::Shutdown;
            }
            frame = send_rx.recv() => {
                let Some(frame) = frame else {
                    return DisconnectReason::StreamEnded;
                };
                if ws_tx.send(Message::Text(Utf8Bytes::from(&*frame))).await.is_err() {
                    return DisconnectReason::WriteFailed;
                }
            }
            _ = ping_interval.tick() => {
                if !connection.check_alive() && connection.last_pong_elapsed() > settings.heartbeat_timeout {
                    warn!(
                        timeout_secs = settings.heartbeat_timeout.as_secs(),
                        "client unresponsive, disconnecting"
                    );
                    let _ = ws_tx.send(Message::Close(None)).await;
                    return DisconnectReason::HeartbeatTimeout;
                }
                if ws_tx.send(Message::Ping(vec![].into())).await.is_err() {
                    return DisconnectReason::WriteFailed;
                }
            }
        }
    }
}
