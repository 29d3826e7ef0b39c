//! Lifecycle glue: transport events in, registry mutations and broadcasts out.

use std::sync::Arc;

use parking_lot::Mutex;
use parlor_core::{Command, ConnectionId, RegistryError};
use tracing::{debug, instrument, warn};

use crate::broadcast::{Broadcaster, DeliveryReport, Outgoing};
use crate::handlers::CommandHandlers;
use crate::registry::SessionRegistry;
use crate::transport::{ConnectionEvents, FrameSink};

/// The chat relay. One instance per server; shared by every connection task.
///
/// Handling an event and delivering its responses happen under one lock, so
/// every session receives broadcasts in the same order and the last roster a
/// session sees always matches the registry.
pub struct ChatService {
    registry: Arc<SessionRegistry>,
    handlers: CommandHandlers,
    broadcaster: Broadcaster,
    dispatch: Mutex<()>,
}

impl ChatService {
    /// Create a relay with an empty registry.
    pub fn new() -> Self {
        let registry = Arc::new(SessionRegistry::new());
        Self {
            handlers: CommandHandlers::new(registry.clone()),
            broadcaster: Broadcaster::new(registry.clone()),
            registry,
            dispatch: Mutex::new(()),
        }
    }

    /// The live session registry.
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    fn deliver_all(&self, plan: &[Outgoing]) -> DeliveryReport {
        let mut total = DeliveryReport::default();
        for outgoing in plan {
            total += self.broadcaster.deliver(outgoing);
        }
        total
    }
}

impl Default for ChatService {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionEvents for ChatService {
    #[instrument(skip(self, sink), fields(conn_id = %id))]
    fn on_connect(&self, id: ConnectionId, sink: Arc<dyn FrameSink>) -> Result<(), RegistryError> {
        if let Err(e) = self.handlers.connect(id, sink) {
            warn!(error = %e, error_kind = e.kind().as_str(), "rejected connection");
            return Err(e);
        }
        debug!(live = self.registry.len(), "connection joined relay");
        Ok(())
    }

    #[instrument(skip(self, frame), fields(conn_id = %id, len = frame.len()))]
    fn on_receive(&self, id: &ConnectionId, frame: &str) {
        let _dispatch = self.dispatch.lock();
        let plan = match Command::decode(frame) {
            Ok(command) => {
                debug!(command_type = ?command.command_type(), "received command");
                self.handlers.handle(id, command)
            }
            Err(e) => self.handlers.malformed(id, &e),
        };
        let report = self.deliver_all(&plan);
        debug!(
            responses = plan.len(),
            delivered = report.delivered,
            failed = report.failed,
            "command handled"
        );
    }

    #[instrument(skip(self), fields(conn_id = %id))]
    fn on_disconnect(&self, id: &ConnectionId) {
        let _dispatch = self.dispatch.lock();
        let plan = self.handlers.disconnect(id);
        let report = self.deliver_all(&plan);
        debug!(
            live = self.registry.len(),
            delivered = report.delivered,
            failed = report.failed,
            "connection left relay"
        );
    }
}
