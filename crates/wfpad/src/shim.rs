//! Deriving browsing sessions from the connections an application opens.
//!
//! A session lasts for as long as at least one of its connections is open.
//! The first connection opened while none are open starts a new session, and
//! closing the last one ends it.

use std::collections::HashSet;

use crate::padder::TriggerEvent;
use crate::session::SessionId;

/// Opaque identifier of an application connection.
pub type ConnectionId = u64;

#[derive(Debug, Default, Clone)]
pub struct SessionTracker {
    open: HashSet<ConnectionId>,
    sessions: u64,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an opened connection. Returns the start of a new session if
    /// no other connection was open.
    pub fn on_connect(&mut self, id: ConnectionId) -> Option<TriggerEvent> {
        let first = self.open.is_empty();
        if !self.open.insert(id) {
            log::warn!("connection {id} registered twice");
            return None;
        }
        if !first {
            return None;
        }
        self.sessions += 1;
        log::debug!("connection {id} starts session {}", self.sessions);
        Some(TriggerEvent::SessionStarts {
            session: SessionId::from_raw(self.sessions),
        })
    }

    /// Register a closed connection. Returns the end of the current session
    /// if it was the last open connection.
    pub fn on_disconnect(&mut self, id: ConnectionId) -> Option<TriggerEvent> {
        if !self.open.remove(&id) {
            log::warn!("unknown connection {id} closed");
            return None;
        }
        if !self.open.is_empty() {
            return None;
        }
        log::debug!("connection {id} ends session {}", self.sessions);
        Some(TriggerEvent::SessionEnds {
            session: SessionId::from_raw(self.sessions),
        })
    }

    /// The number of sessions started so far, also the id of the current or
    /// last session.
    pub fn sessions(&self) -> u64 {
        self.sessions
    }

    pub fn open_connections(&self) -> usize {
        self.open.len()
    }
}
