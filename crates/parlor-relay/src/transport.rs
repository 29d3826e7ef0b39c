//! Capability interface between a socket transport and the relay.
//!
//! A transport adapter owns the sockets. For every connection it hands the
//! relay a [`FrameSink`] (the outbound half) and reports lifecycle events
//! through [`ConnectionEvents`]. The relay never touches transport framing.

use std::sync::Arc;

use parlor_core::{ConnectionId, RegistryError, SendError};

/// Outbound half of one connection.
///
/// `send` must hand the frame off without blocking (e.g. `try_send` on a
/// bounded queue); it is called while fanning out to many connections.
pub trait FrameSink: Send + Sync {
    /// Queue an encoded frame for delivery to this connection.
    fn send(&self, frame: Arc<str>) -> Result<(), SendError>;
}

/// Inbound lifecycle callbacks driven by a transport adapter.
///
/// Events for different connections may arrive concurrently. Events for the
/// same connection must be delivered sequentially: connect, then any number
/// of receives, then disconnect.
pub trait ConnectionEvents: Send + Sync {
    /// A connection was accepted. Fails if the identity is already live.
    fn on_connect(&self, id: ConnectionId, sink: Arc<dyn FrameSink>) -> Result<(), RegistryError>;

    /// A text frame arrived on a connection.
    fn on_receive(&self, id: &ConnectionId, frame: &str);

    /// A connection went away. Repeated calls for the same identity are tolerated.
    fn on_disconnect(&self, id: &ConnectionId);
}

impl<F> FrameSink for F
where
    F: Fn(Arc<str>) -> Result<(), SendError> + Send + Sync,
{
    fn send(&self, frame: Arc<str>) -> Result<(), SendError> {
        self(frame)
    }
}
