//! Room bookkeeping for call sessions
//!
//! Rooms are created lazily on the first join for an unseen key and
//! deleted synchronously when their member list empties: a room exists
//! if and only if it has at least one member. The table stores session
//! ids only; connection state lives in the session registry.

use std::collections::HashMap;

use tracing::debug;

use crate::registry::{current_timestamp, RoomKey, SessionId};

/// One call session's membership, in join order
pub struct Room {
    members: Vec<SessionId>,

    /// Unix timestamp of the first join
    pub created_at: u64,
}

impl Room {
    fn new() -> Self {
        Self {
            members: Vec::new(),
            created_at: current_timestamp(),
        }
    }

    /// Members in join order
    pub fn members(&self) -> &[SessionId] {
        &self.members
    }
}

/// Outcome of a join attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    /// The session was appended to the member list
    Accepted,
    /// The room is at capacity; membership unchanged
    RoomFull,
    /// The session is already a member; membership unchanged
    AlreadyMember,
}

/// Table of live rooms, keyed by caller-supplied room key
pub struct RoomTable {
    rooms: HashMap<RoomKey, Room>,
    capacity: usize,
}

impl RoomTable {
    /// Create an empty table with the given per-room capacity
    pub fn new(capacity: usize) -> Self {
        Self {
            rooms: HashMap::new(),
            capacity,
        }
    }

    /// Add `session_id` to the room at `key`, creating the room if absent.
    pub fn join(&mut self, key: &str, session_id: &str) -> JoinOutcome {
        let room = self.rooms.entry(key.to_string()).or_insert_with(|| {
            debug!(room_key = %key, "room created");
            Room::new()
        });

        if room.members.iter().any(|m| m == session_id) {
            return JoinOutcome::AlreadyMember;
        }
        if room.members.len() >= self.capacity {
            return JoinOutcome::RoomFull;
        }

        room.members.push(session_id.to_string());
        debug!(
            room_key = %key,
            session_id = %session_id,
            members = room.members.len(),
            "room member added"
        );
        JoinOutcome::Accepted
    }

    /// Remove `session_id` from the room at `key`.
    ///
    /// Returns the members remaining after removal, or `None` when the
    /// session was not a member (idempotent). An emptied room is deleted
    /// before this returns.
    pub fn leave(&mut self, key: &str, session_id: &str) -> Option<Vec<SessionId>> {
        let room = self.rooms.get_mut(key)?;
        let position = room.members.iter().position(|m| m == session_id)?;
        room.members.remove(position);

        let remaining = room.members.clone();
        if remaining.is_empty() {
            self.rooms.remove(key);
            debug!(room_key = %key, "room deleted");
        } else {
            debug!(
                room_key = %key,
                session_id = %session_id,
                members = remaining.len(),
                "room member removed"
            );
        }
        Some(remaining)
    }

    /// Members of the room at `key` in join order; empty when the room
    /// does not exist.
    pub fn members(&self, key: &str) -> Vec<SessionId> {
        self.rooms
            .get(key)
            .map(|room| room.members.clone())
            .unwrap_or_default()
    }

    /// Whether a room exists for `key`
    pub fn contains(&self, key: &str) -> bool {
        self.rooms.contains_key(key)
    }

    /// Number of live rooms
    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    /// Whether the table holds no rooms
    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}
