//! Command handlers: the relay's decision logic.
//!
//! Each handler applies its registry mutation and returns the responses it
//! produced, in delivery order, paired with their recipients. Handlers never
//! send anything themselves.
//!
//! Per-session state machine:
//!
//! ```text
//! Anonymous --Register(valid)--> Named --Rename(valid)--> Named
//! ```
//!
//! An invalid name in either state leaves the session unchanged and yields an
//! `Error` for the sender only. `Message` is accepted in both states; an
//! anonymous sender's name is sent as `""`. Events for a connection that is
//! not in the registry produce nothing.

use std::sync::Arc;

use parlor_core::names::{INVALID_NAME_MESSAGE, validate_name};
use parlor_core::{Command, ConnectionId, DecodeError, RegistryError, Response};
use tracing::{debug, info, warn};

use crate::broadcast::Outgoing;
use crate::registry::SessionRegistry;
use crate::transport::FrameSink;

/// Turns commands and lifecycle events into registry mutations and outgoing responses.
pub struct CommandHandlers {
    registry: Arc<SessionRegistry>,
}

impl CommandHandlers {
    /// Create handlers over a registry.
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }

    /// Add an anonymous session. Nothing is broadcast until it registers.
    pub fn connect(&self, id: ConnectionId, sink: Arc<dyn FrameSink>) -> Result<(), RegistryError> {
        let _ = self.registry.add(id, sink)?;
        Ok(())
    }

    /// Dispatch a decoded command.
    pub fn handle(&self, id: &ConnectionId, command: Command) -> Vec<Outgoing> {
        match command {
            Command::Register { name } => self.register(id, name),
            Command::Message { text } => self.message(id, text),
            Command::Rename { new_name } => self.rename(id, new_name),
        }
    }

    /// Set the session's name, announce it, then broadcast the roster.
    pub fn register(&self, id: &ConnectionId, name: String) -> Vec<Outgoing> {
        if !self.registry.contains(id) {
            return unknown_connection(id, "register");
        }
        if let Err(e) = validate_name(&name) {
            debug!(conn_id = %id, error_kind = e.kind().as_str(), "rejected name on register");
            return vec![invalid_name(id)];
        }
        if !self.registry.set_name(id, name.clone()) {
            return unknown_connection(id, "register");
        }

        info!(conn_id = %id, name = %name, "user registered");
        vec![Outgoing::all(Response::connection(name)), self.roster()]
    }

    /// Broadcast chat text under the sender's current name.
    pub fn message(&self, id: &ConnectionId, text: String) -> Vec<Outgoing> {
        let Some(session) = self.registry.lookup(id) else {
            return unknown_connection(id, "message");
        };
        vec![Outgoing::all(Response::message(session.display_name(), text))]
    }

    /// Announce the rename under the old name, apply it, then broadcast the roster.
    pub fn rename(&self, id: &ConnectionId, new_name: String) -> Vec<Outgoing> {
        let Some(session) = self.registry.lookup(id) else {
            return unknown_connection(id, "rename");
        };
        if let Err(e) = validate_name(&new_name) {
            debug!(conn_id = %id, error_kind = e.kind().as_str(), "rejected name on rename");
            return vec![invalid_name(id)];
        }

        let notice = Response::name_change(session.display_name(), &new_name);
        if !self.registry.set_name(id, new_name.clone()) {
            return unknown_connection(id, "rename");
        }

        info!(conn_id = %id, old_name = session.display_name(), new_name = %new_name, "user renamed");
        vec![Outgoing::all(notice), self.roster()]
    }

    /// Remove the session, announce a named departure, then broadcast the roster.
    pub fn disconnect(&self, id: &ConnectionId) -> Vec<Outgoing> {
        let Some(session) = self.registry.remove(id) else {
            return unknown_connection(id, "disconnect");
        };

        let mut out = Vec::with_capacity(2);
        if session.is_named() {
            info!(conn_id = %id, name = session.display_name(), "user left");
            out.push(Outgoing::all(Response::disconnect(session.display_name())));
        }
        out.push(self.roster());
        out
    }

    /// Report an undecodable frame to its sender only.
    pub fn malformed(&self, id: &ConnectionId, error: &DecodeError) -> Vec<Outgoing> {
        warn!(conn_id = %id, error = %error, error_kind = error.kind().as_str(), "rejected frame");
        vec![Outgoing::only(id.clone(), Response::error(error.to_string()))]
    }

    fn roster(&self) -> Outgoing {
        Outgoing::all(Response::user_count(self.registry.roster()))
    }
}

fn invalid_name(id: &ConnectionId) -> Outgoing {
    Outgoing::only(id.clone(), Response::error(INVALID_NAME_MESSAGE))
}

fn unknown_connection(id: &ConnectionId, event: &'static str) -> Vec<Outgoing> {
    debug!(conn_id = %id, event, "event for unknown connection ignored");
    Vec::new()
}
