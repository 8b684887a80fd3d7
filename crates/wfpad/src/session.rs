//! Per-session traffic statistics.

use enum_map::{Enum, EnumMap};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::message::Message;

/// An opaque token identifying one browsing session. Sessions are numbered
/// by the [`SessionTracker`](crate::shim::SessionTracker).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(u64);

impl SessionId {
    /// Create a session identifier from a raw integer. Intended for testing
    /// and for peers that number sessions themselves.
    pub fn from_raw(raw: u64) -> Self {
        SessionId(raw)
    }

    pub fn into_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session {}", self.0)
    }
}

/// The direction of a frame relative to this endpoint.
#[derive(Debug, Enum, Eq, Hash, PartialEq, Clone, Copy)]
pub enum Direction {
    Sent,
    Received,
}

/// Counters of a session. Every frame is counted with its full wire size;
/// data counters only count DATA frames and their payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    id: Option<SessionId>,
    visiting: bool,
    messages: EnumMap<Direction, u64>,
    data_messages: EnumMap<Direction, u64>,
    bytes: EnumMap<Direction, u64>,
    data_bytes: EnumMap<Direction, u64>,
}

impl Session {
    pub fn new(id: Option<SessionId>) -> Self {
        Session {
            id,
            ..Default::default()
        }
    }

    /// Count a frame going in `direction`.
    pub fn record(&mut self, direction: Direction, msg: &Message) {
        self.messages[direction] += 1;
        self.bytes[direction] += msg.wire_len() as u64;
        if msg.is_data() {
            self.data_messages[direction] += 1;
            self.data_bytes[direction] += msg.payload().len() as u64;
        }
    }

    /// Clear all counters and the visiting flag.
    pub fn reset(&mut self) {
        *self = Session::new(self.id);
    }

    pub fn id(&self) -> Option<SessionId> {
        self.id
    }

    pub fn visiting(&self) -> bool {
        self.visiting
    }

    pub fn set_visiting(&mut self, visiting: bool) {
        self.visiting = visiting;
    }

    pub fn messages(&self, direction: Direction) -> u64 {
        self.messages[direction]
    }

    pub fn data_messages(&self, direction: Direction) -> u64 {
        self.data_messages[direction]
    }

    pub fn bytes(&self, direction: Direction) -> u64 {
        self.bytes[direction]
    }

    pub fn data_bytes(&self, direction: Direction) -> u64 {
        self.data_bytes[direction]
    }
}
