//! Session registry
//!
//! The single source of truth for connection identity and current room
//! membership. Entries are created when the transport hands over a new
//! connection and destroyed exactly once on transport close.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::protocol::ServerEnvelope;

/// Opaque session identifier, unique for the connection's lifetime
pub type SessionId = String;

/// Caller-supplied room key
pub type RoomKey = String;

/// Outbound channel half for a connected session
pub type OutboundSender = mpsc::UnboundedSender<ServerEnvelope>;

/// Live connection state owned by the registry
pub struct SessionEntry {
    /// Participant display name, if it gave one on join
    pub display_name: Option<String>,

    /// Unix timestamp of the transport handshake
    pub connected_at: u64,

    /// Current room membership; `None` while idle
    pub room: Option<RoomKey>,

    /// Channel draining into this session's WebSocket
    pub sender: OutboundSender,
}

/// Process-wide table of live sessions
pub struct SessionRegistry {
    sessions: HashMap<SessionId, SessionEntry>,
    max_sessions: usize,
}

impl SessionRegistry {
    /// Create an empty registry bounded at `max_sessions` live entries
    pub fn new(max_sessions: usize) -> Self {
        Self {
            sessions: HashMap::new(),
            max_sessions,
        }
    }

    /// Assign an identity to a new connection.
    ///
    /// Fails only when the session table is exhausted; the caller treats
    /// that as fatal to the connection, never the process.
    pub fn register(&mut self, sender: OutboundSender) -> Result<SessionId> {
        if self.sessions.len() >= self.max_sessions {
            return Err(Error::SessionLimit(self.sessions.len()));
        }

        let session_id = Uuid::new_v4().to_string();
        self.sessions.insert(
            session_id.clone(),
            SessionEntry {
                display_name: None,
                connected_at: current_timestamp(),
                room: None,
                sender,
            },
        );
        debug!(
            session_id = %session_id,
            live = self.sessions.len(),
            "session registered"
        );
        Ok(session_id)
    }

    /// Remove the entry. Safe to call when the session is already gone.
    pub fn unregister(&mut self, session_id: &str) -> Option<SessionEntry> {
        let removed = self.sessions.remove(session_id);
        if removed.is_some() {
            debug!(
                session_id = %session_id,
                live = self.sessions.len(),
                "session unregistered"
            );
        }
        removed
    }

    /// Look up a live session
    pub fn lookup(&self, session_id: &str) -> Option<&SessionEntry> {
        self.sessions.get(session_id)
    }

    /// Record the session's display name
    pub fn set_display_name(&mut self, session_id: &str, display_name: Option<String>) {
        if let Some(entry) = self.sessions.get_mut(session_id) {
            entry.display_name = display_name;
        }
    }

    /// Record room membership. Idempotent: clearing an unset room is a
    /// no-op.
    pub fn set_room(&mut self, session_id: &str, room: Option<RoomKey>) {
        if let Some(entry) = self.sessions.get_mut(session_id) {
            entry.room = room;
        }
    }

    /// The session's current room key, if any
    pub fn room_of(&self, session_id: &str) -> Option<RoomKey> {
        self.sessions.get(session_id).and_then(|e| e.room.clone())
    }

    /// Iterate over all live sessions
    pub fn iter(&self) -> impl Iterator<Item = (&SessionId, &SessionEntry)> {
        self.sessions.iter()
    }

    /// Number of live sessions
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether the registry holds no sessions
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// Current Unix timestamp in seconds
pub(crate) fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
