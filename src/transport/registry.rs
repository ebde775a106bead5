//! Active-session registry.
//!
//! Tracks live sessions keyed by [`SessionId`] and which one receives
//! injected commands.
//!
//! # Selection Policy
//!
//! Most recent wins:
//!
//! - [`SessionRegistry::register`] makes the new session current,
//!   replacing whichever session was current before
//! - when the current session closes, the most recently opened survivor
//!   becomes current, or none if no session is left
//!
//! Sessions can also be looked up directly by id.
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │          SessionRegistry             │
//! │  SessionId=1 → Session (guest A)     │
//! │  SessionId=2 → Session (guest B)  ◄──┼── current
//! └──────────────────────────────────────┘
//! ```

// ============================================================================
// Imports
// ============================================================================

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::{debug, info};

use crate::identifiers::SessionId;

use super::Session;

// ============================================================================
// SessionRegistry
// ============================================================================

#[derive(Debug, Default)]
struct RegistryState {
    sessions: FxHashMap<SessionId, Session>,
    current: Option<SessionId>,
}

/// Live sessions plus the current injection target.
///
/// Thread-safe; every method takes the lock for a short critical section.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    state: RwLock<RegistryState>,
}

impl SessionRegistry {
    /// Creates an empty registry.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a session and makes it current.
    pub fn register(&self, session: Session) {
        let id = session.id();
        let previous = {
            let mut state = self.state.write();
            state.sessions.insert(id, session);
            state.current.replace(id)
        };

        match previous {
            Some(previous) => {
                info!(session_id = %id, previous = %previous, "Active session replaced");
            }
            None => info!(session_id = %id, "Active session set"),
        }
    }

    /// Removes a session.
    ///
    /// If it was current, the most recently opened remaining session
    /// becomes current.
    pub fn unregister(&self, id: SessionId) -> Option<Session> {
        let mut state = self.state.write();
        let removed = state.sessions.remove(&id);

        if state.current == Some(id) {
            state.current = state.sessions.keys().max().copied();
            debug!(session_id = %id, next = ?state.current, "Active session removed");
        }

        removed
    }

    /// Returns the current session.
    #[must_use]
    pub fn current(&self) -> Option<Session> {
        let state = self.state.read();
        state
            .current
            .and_then(|id| state.sessions.get(&id))
            .cloned()
    }

    /// Returns the current session's id.
    #[inline]
    #[must_use]
    pub fn current_id(&self) -> Option<SessionId> {
        self.state.read().current
    }

    /// Returns the session with `id`.
    #[must_use]
    pub fn get(&self, id: SessionId) -> Option<Session> {
        self.state.read().sessions.get(&id).cloned()
    }

    /// Returns the ids of all live sessions, oldest first.
    #[must_use]
    pub fn ids(&self) -> Vec<SessionId> {
        let mut ids: Vec<_> = self.state.read().sessions.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Returns the number of live sessions.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().sessions.len()
    }

    /// Returns `true` if no session is live.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.read().sessions.is_empty()
    }

    /// Asks every live session to close.
    pub fn shutdown_all(&self) {
        let sessions: Vec<_> = self.state.read().sessions.values().cloned().collect();
        for session in sessions {
            session.shutdown();
            debug!(session_id = %session.id(), "Session shutdown requested");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_registry() {
        let registry = SessionRegistry::new();
        assert!(registry.current().is_none());
        assert!(registry.current_id().is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_last_registered_is_current() {
        let registry = SessionRegistry::new();
        let (first, _rx1) = Session::detached("first");
        let (second, _rx2) = Session::detached("second");

        registry.register(first.clone());
        assert_eq!(registry.current_id(), Some(first.id()));

        registry.register(second.clone());
        assert_eq!(registry.current_id(), Some(second.id()));
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.current().map(|s| s.peer().to_string()), Some("second".into()));
    }

    #[test]
    fn test_unregister_current_falls_back_to_newest_survivor() {
        let registry = SessionRegistry::new();
        let (a, _rx_a) = Session::detached("a");
        let (b, _rx_b) = Session::detached("b");
        let (c, _rx_c) = Session::detached("c");
        registry.register(a.clone());
        registry.register(b.clone());
        registry.register(c.clone());

        registry.unregister(c.id());
        assert_eq!(registry.current_id(), Some(b.id()));

        registry.unregister(a.id());
        assert_eq!(registry.current_id(), Some(b.id()));

        registry.unregister(b.id());
        assert!(registry.current_id().is_none());
    }

    #[test]
    fn test_unregister_non_current_keeps_current() {
        let registry = SessionRegistry::new();
        let (a, _rx_a) = Session::detached("a");
        let (b, _rx_b) = Session::detached("b");
        registry.register(a.clone());
        registry.register(b.clone());

        assert!(registry.unregister(a.id()).is_some());
        assert!(registry.unregister(a.id()).is_none());
        assert_eq!(registry.current_id(), Some(b.id()));
        assert_eq!(registry.ids(), vec![b.id()]);
    }

    #[test]
    fn test_get_by_id() {
        let registry = SessionRegistry::new();
        let (a, _rx_a) = Session::detached("a");
        registry.register(a.clone());

        assert_eq!(registry.get(a.id()).map(|s| s.id()), Some(a.id()));
        assert!(registry.get(SessionId::next()).is_none());
    }

    #[tokio::test]
    async fn test_shutdown_all_signals_writers() {
        let registry = SessionRegistry::new();
        let (a, mut rx_a) = Session::detached("a");
        registry.register(a);

        registry.shutdown_all();
        assert!(matches!(
            rx_a.recv().await,
            Some(crate::transport::session::SessionCommand::Shutdown)
        ));
    }
}
