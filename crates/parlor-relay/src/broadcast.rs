//! Response fan-out to live sessions.
//!
//! A response is encoded once, the target sessions are copied out of the
//! registry, and the lock is released before any frame is handed to a sink.
//! A failed send is logged and counted; it never stops delivery to the
//! remaining targets.

use std::ops::AddAssign;
use std::sync::Arc;

use parlor_core::{ConnectionId, Response};
use tracing::{debug, warn};

use crate::registry::{Session, SessionRegistry};

/// Who receives a response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Target {
    /// Every live session.
    All,
    /// One session (typically the sender).
    Only(ConnectionId),
    /// An explicit set of sessions, delivered in registry order.
    Subset(Vec<ConnectionId>),
}

/// A response paired with its recipients.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Outgoing {
    /// Recipients.
    pub target: Target,
    /// Payload.
    pub response: Response,
}

impl Outgoing {
    /// Send `response` to every live session.
    pub fn all(response: Response) -> Self {
        Self {
            target: Target::All,
            response,
        }
    }

    /// Send `response` to one session.
    pub fn only(id: ConnectionId, response: Response) -> Self {
        Self {
            target: Target::Only(id),
            response,
        }
    }

    /// Send `response` to the listed sessions.
    pub fn subset(ids: Vec<ConnectionId>, response: Response) -> Self {
        Self {
            target: Target::Subset(ids),
            response,
        }
    }
}

/// Outcome of one fan-out.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Frames accepted by a sink.
    pub delivered: usize,
    /// Frames a sink refused.
    pub failed: usize,
}

impl AddAssign for DeliveryReport {
    fn add_assign(&mut self, rhs: Self) {
        self.delivered += rhs.delivered;
        self.failed += rhs.failed;
    }
}

/// Fans encoded responses out to registry sessions.
pub struct Broadcaster {
    registry: Arc<SessionRegistry>,
}

impl Broadcaster {
    /// Create a broadcaster over a registry.
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }

    /// Deliver one outgoing response to its target set.
    pub fn deliver(&self, outgoing: &Outgoing) -> DeliveryReport {
        match &outgoing.target {
            Target::All => self.broadcast(&outgoing.response, None),
            Target::Only(id) => self.send_to(id, &outgoing.response),
            Target::Subset(ids) => self.broadcast(&outgoing.response, Some(ids.as_slice())),
        }
    }

    /// Send to all live sessions, or to those listed in `targets`.
    pub fn broadcast(&self, response: &Response, targets: Option<&[ConnectionId]>) -> DeliveryReport {
        let sessions = match targets {
            None => self.registry.snapshot(),
            Some(ids) => self.registry.select(ids),
        };
        debug!(
            response_type = ?response.response_type(),
            recipients = sessions.len(),
            "broadcast response"
        );
        fan_out(&sessions, response)
    }

    /// Send to a single session. Silently skipped if it is gone.
    pub fn send_to(&self, id: &ConnectionId, response: &Response) -> DeliveryReport {
        match self.registry.lookup(id) {
            Some(session) => fan_out(std::slice::from_ref(&session), response),
            None => {
                debug!(conn_id = %id, response_type = ?response.response_type(), "recipient gone, dropping response");
                DeliveryReport::default()
            }
        }
    }
}

fn fan_out(sessions: &[Session], response: &Response) -> DeliveryReport {
    let mut report = DeliveryReport::default();
    if sessions.is_empty() {
        return report;
    }

    let frame: Arc<str> = Arc::from(response.encode());
    for session in sessions {
        match session.send(frame.clone()) {
            Ok(()) => {
                report.delivered += 1;
                debug!(conn_id = %session.id(), "frame sent");
            }
            Err(e) => {
                report.failed += 1;
                warn!(
                    conn_id = %session.id(),
                    error = %e,
                    error_kind = e.kind().as_str(),
                    "failed to send frame to client"
                );
            }
        }
    }
    report
}
