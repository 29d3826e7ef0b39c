//! Session registry: the authoritative store of live connections.
//!
//! One [`Session`] per connection identity, kept in insertion order. All
//! mutations take the single write lock; [`SessionRegistry::snapshot`] copies
//! the sessions out under the read lock so callers can fan out without
//! holding it. The registry knows nothing about the chat protocol.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use parlor_core::errors::Result;
use parlor_core::{ConnectionId, RegistryError, SendError};
use tracing::debug;

use crate::transport::FrameSink;

/// Server-side record of one live connection.
///
/// Cloning is cheap (the sink is shared); clones are point-in-time copies
/// and do not observe later renames.
#[derive(Clone)]
pub struct Session {
    id: ConnectionId,
    name: Option<String>,
    sink: Arc<dyn FrameSink>,
}

impl Session {
    fn new(id: ConnectionId, sink: Arc<dyn FrameSink>) -> Self {
        Self {
            id,
            name: None,
            sink,
        }
    }

    /// Connection identity.
    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    /// Display name, if registered.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Display name, or `""` for anonymous sessions.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or_default()
    }

    /// Whether the session has a non-empty display name.
    pub fn is_named(&self) -> bool {
        self.name.as_deref().is_some_and(|n| !n.is_empty())
    }

    /// Hand an encoded frame to this connection.
    pub fn send(&self, frame: Arc<str>) -> std::result::Result<(), SendError> {
        self.sink.send(frame)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Synchronized map `ConnectionId -> Session`.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<IndexMap<ConnectionId, Session>>,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an anonymous session. Rejects an identity that is already live.
    pub fn add(&self, id: ConnectionId, sink: Arc<dyn FrameSink>) -> Result<Session> {
        let mut sessions = self.sessions.write();
        if sessions.contains_key(&id) {
            return Err(RegistryError::DuplicateConnection(id));
        }
        let session = Session::new(id.clone(), sink);
        let _ = sessions.insert(id, session.clone());
        debug!(conn_id = %session.id, live = sessions.len(), "session added");
        Ok(session)
    }

    /// Remove and return a session. `None` if it is already gone.
    pub fn remove(&self, id: &ConnectionId) -> Option<Session> {
        let mut sessions = self.sessions.write();
        let removed = sessions.shift_remove(id);
        if removed.is_some() {
            debug!(conn_id = %id, live = sessions.len(), "session removed");
        }
        removed
    }

    /// Copy of one session, if present.
    pub fn lookup(&self, id: &ConnectionId) -> Option<Session> {
        self.sessions.read().get(id).cloned()
    }

    /// Whether a session with this identity is live.
    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.sessions.read().contains_key(id)
    }

    /// Set a session's display name. Returns `false` if the session is gone.
    pub fn set_name(&self, id: &ConnectionId, name: impl Into<String>) -> bool {
        match self.sessions.write().get_mut(id) {
            Some(session) => {
                session.name = Some(name.into());
                true
            }
            None => false,
        }
    }

    /// Consistent copy of all sessions in insertion order.
    pub fn snapshot(&self) -> Vec<Session> {
        self.sessions.read().values().cloned().collect()
    }

    /// Sessions whose identity is in `ids`, in registry order.
    ///
    /// Identities that are not live are skipped.
    pub fn select(&self, ids: &[ConnectionId]) -> Vec<Session> {
        self.sessions
            .read()
            .values()
            .filter(|s| ids.contains(&s.id))
            .cloned()
            .collect()
    }

    /// Display names of all named sessions, in insertion order.
    pub fn roster(&self) -> Vec<String> {
        self.sessions
            .read()
            .values()
            .filter(|s| s.is_named())
            .map(|s| s.display_name().to_owned())
            .collect()
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    /// Whether no sessions are live.
    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Number of sessions with a display name.
    pub fn named_count(&self) -> usize {
        self.sessions.read().values().filter(|s| s.is_named()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::test_helpers::RecordingSink;

    fn sink() -> Arc<dyn FrameSink> {
        RecordingSink::new()
    }

    fn ids(sessions: &[Session]) -> Vec<&str> {
        sessions.iter().map(|s| s.id().as_str()).collect()
    }

    #[test]
    fn add_creates_anonymous_session() {
        let reg = SessionRegistry::new();
        let session = reg.add("c1".into(), sink()).unwrap();
        assert_eq!(session.id().as_str(), "c1");
        assert!(session.name().is_none());
        assert_eq!(session.display_name(), "");
        assert!(!session.is_named());
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn add_rejects_duplicate_identity() {
        let reg = SessionRegistry::new();
        let _ = reg.add("c1".into(), sink()).unwrap();
        assert!(reg.set_name(&"c1".into(), "Alice"));

        let err = reg.add("c1".into(), sink()).unwrap_err();
        assert_eq!(err, RegistryError::DuplicateConnection("c1".into()));
        // existing session untouched
        assert_eq!(reg.lookup(&"c1".into()).unwrap().name(), Some("Alice"));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn remove_returns_session_once() {
        let reg = SessionRegistry::new();
        let _ = reg.add("c1".into(), sink()).unwrap();
        assert!(reg.set_name(&"c1".into(), "Alice"));

        let removed = reg.remove(&"c1".into()).unwrap();
        assert_eq!(removed.name(), Some("Alice"));
        assert!(reg.remove(&"c1".into()).is_none());
        assert!(reg.is_empty());
    }

    #[test]
    fn lookup_missing_is_none() {
        let reg = SessionRegistry::new();
        assert!(reg.lookup(&"ghost".into()).is_none());
        assert!(!reg.contains(&"ghost".into()));
    }

    #[test]
    fn set_name_on_missing_is_noop() {
        let reg = SessionRegistry::new();
        assert!(!reg.set_name(&"ghost".into(), "Alice"));
        assert!(reg.is_empty());
    }

    #[test]
    fn set_name_replaces_previous() {
        let reg = SessionRegistry::new();
        let _ = reg.add("c1".into(), sink()).unwrap();
        assert!(reg.set_name(&"c1".into(), "Alice"));
        assert!(reg.set_name(&"c1".into(), "Bobby"));
        assert_eq!(reg.roster(), vec!["Bobby".to_string()]);
    }

    #[test]
    fn lookup_returns_point_in_time_copy() {
        let reg = SessionRegistry::new();
        let _ = reg.add("c1".into(), sink()).unwrap();
        let before = reg.lookup(&"c1".into()).unwrap();
        assert!(reg.set_name(&"c1".into(), "Alice"));
        assert!(before.name().is_none());
        assert_eq!(reg.lookup(&"c1".into()).unwrap().name(), Some("Alice"));
    }

    #[test]
    fn snapshot_preserves_insertion_order_across_removal() {
        let reg = SessionRegistry::new();
        for id in ["c1", "c2", "c3", "c4"] {
            let _ = reg.add(id.into(), sink()).unwrap();
        }
        let _ = reg.remove(&"c2".into());
        let _ = reg.add("c5".into(), sink()).unwrap();

        assert_eq!(ids(&reg.snapshot()), vec!["c1", "c3", "c4", "c5"]);
    }

    #[test]
    fn roster_skips_anonymous_sessions() {
        let reg = SessionRegistry::new();
        for id in ["c1", "c2", "c3"] {
            let _ = reg.add(id.into(), sink()).unwrap();
        }
        assert!(reg.set_name(&"c3".into(), "Carol"));
        assert!(reg.set_name(&"c1".into(), "Alice"));

        // insertion order, not naming order
        assert_eq!(reg.roster(), vec!["Alice".to_string(), "Carol".to_string()]);
        assert_eq!(reg.named_count(), 2);
        assert_eq!(reg.len(), 3);
    }

    #[test]
    fn roster_allows_duplicate_names() {
        let reg = SessionRegistry::new();
        let _ = reg.add("c1".into(), sink()).unwrap();
        let _ = reg.add("c2".into(), sink()).unwrap();
        assert!(reg.set_name(&"c1".into(), "Alice"));
        assert!(reg.set_name(&"c2".into(), "Alice"));
        assert_eq!(reg.roster(), vec!["Alice".to_string(), "Alice".to_string()]);
    }

    #[test]
    fn select_keeps_registry_order_and_skips_missing() {
        let reg = SessionRegistry::new();
        for id in ["c1", "c2", "c3"] {
            let _ = reg.add(id.into(), sink()).unwrap();
        }
        let picked = reg.select(&["c3".into(), "ghost".into(), "c1".into()]);
        assert_eq!(ids(&picked), vec!["c1", "c3"]);
    }

    #[test]
    fn session_send_uses_sink() {
        let reg = SessionRegistry::new();
        let rec = RecordingSink::new();
        let session = reg.add("c1".into(), rec.clone()).unwrap();
        session.send(Arc::from("frame")).unwrap();
        assert_eq!(rec.frames(), vec!["frame".to_string()]);
    }

    #[test]
    fn debug_omits_sink() {
        let reg = SessionRegistry::new();
        let session = reg.add("c1".into(), sink()).unwrap();
        let dbg = format!("{session:?}");
        assert!(dbg.contains("c1"));
        assert!(!dbg.contains("sink"));
    }

    #[test]
    fn concurrent_adds_are_all_recorded() {
        let reg = Arc::new(SessionRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let reg = reg.clone();
                std::thread::spawn(move || {
                    for i in 0..50 {
                        let id = ConnectionId::from(format!("t{t}_{i}"));
                        let _ = reg.add(id.clone(), RecordingSink::new()).unwrap();
                        assert!(reg.set_name(&id, format!("user{t}_{i}")));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(reg.len(), 400);
        assert_eq!(reg.named_count(), 400);
    }
}
