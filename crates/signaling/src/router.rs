//! Signaling router
//!
//! Interprets inbound envelopes and relays handshake payloads between
//! room peers. Each connection moves through a two-state lifecycle,
//! idle or in-room, represented by its registry entry's room field:
//! `join` is the only action accepted while idle, relays require a
//! room, and explicit `leave` and transport disconnect converge on the
//! same departure routine.

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::config::SignalingConfig;
use crate::error::Result;
use crate::protocol::{ClientEnvelope, ErrorCode, PeerInfo, ServerEnvelope};
use crate::registry::{OutboundSender, SessionId, SessionRegistry};
use crate::room::{JoinOutcome, RoomTable};

/// Registry and room tables behind one lock.
///
/// Every multi-step operation (membership check, mutation, notification
/// fan-out) runs as a single critical section, so two concurrent joins
/// can never both observe a room below capacity. Outbound sends are
/// synchronous channel pushes; no `.await` is held across the lock.
struct RelayState {
    sessions: SessionRegistry,
    rooms: RoomTable,
}

/// Dispatches signaling envelopes for all live connections
pub struct SignalingRouter {
    state: Mutex<RelayState>,
}

impl SignalingRouter {
    /// Create a router with the configured room capacity and session limit
    pub fn new(config: &SignalingConfig) -> Self {
        Self {
            state: Mutex::new(RelayState {
                sessions: SessionRegistry::new(config.max_sessions),
                rooms: RoomTable::new(config.room_capacity),
            }),
        }
    }

    /// Admit a new transport connection and assign its session id.
    ///
    /// Fails only on session-table exhaustion; the transport closes the
    /// connection in that case.
    pub fn connect(&self, sender: OutboundSender) -> Result<SessionId> {
        self.state.lock().sessions.register(sender)
    }

    /// Terminal cleanup for a connection, graceful or abrupt.
    ///
    /// Departs the session's room (notifying any remaining peer exactly
    /// once) and removes the registry entry. Safe to call for an unknown
    /// session.
    pub fn disconnect(&self, session_id: &str) {
        let mut state = self.state.lock();
        Self::depart_room(&mut state, session_id);
        if state.sessions.unregister(session_id).is_some() {
            info!(
                session_id = %session_id,
                live = state.sessions.len(),
                "session disconnected"
            );
        }
    }

    /// Dispatch one inbound envelope from `session_id`
    pub fn handle(&self, session_id: &str, envelope: ClientEnvelope) {
        let mut state = self.state.lock();
        match envelope {
            ClientEnvelope::Join {
                room_key,
                display_name,
            } => Self::handle_join(&mut state, session_id, room_key, display_name),
            ClientEnvelope::Leave => Self::depart_room(&mut state, session_id),
            ClientEnvelope::Offer { target_id, payload } => Self::relay(
                &state,
                session_id,
                target_id,
                ServerEnvelope::Offer {
                    sender_id: session_id.to_string(),
                    payload,
                },
            ),
            ClientEnvelope::Answer { target_id, payload } => Self::relay(
                &state,
                session_id,
                target_id,
                ServerEnvelope::Answer {
                    sender_id: session_id.to_string(),
                    payload,
                },
            ),
            ClientEnvelope::IceCandidate { target_id, payload } => Self::relay(
                &state,
                session_id,
                target_id,
                ServerEnvelope::IceCandidate {
                    sender_id: session_id.to_string(),
                    payload,
                },
            ),
        }
    }

    /// Push an envelope to every live session (out-of-band broadcast)
    pub fn broadcast(&self, envelope: ServerEnvelope) {
        let state = self.state.lock();
        for (session_id, entry) in state.sessions.iter() {
            if entry.sender.send(envelope.clone()).is_err() {
                debug!(session_id = %session_id, "outbound channel closed, dropping broadcast");
            }
        }
    }

    /// Number of live sessions
    pub fn session_count(&self) -> usize {
        self.state.lock().sessions.len()
    }

    /// Number of live rooms
    pub fn room_count(&self) -> usize {
        self.state.lock().rooms.len()
    }

    fn handle_join(
        state: &mut RelayState,
        session_id: &str,
        room_key: String,
        display_name: Option<String>,
    ) {
        if state.sessions.lookup(session_id).is_none() {
            return;
        }
        if let Some(current) = state.sessions.room_of(session_id) {
            send_to(
                &state.sessions,
                session_id,
                ServerEnvelope::error(
                    ErrorCode::AlreadyInRoom,
                    format!("already in room {current}"),
                ),
            );
            return;
        }

        match state.rooms.join(&room_key, session_id) {
            JoinOutcome::Accepted => {
                state
                    .sessions
                    .set_display_name(session_id, display_name.clone());
                state.sessions.set_room(session_id, Some(room_key.clone()));

                let members = state.rooms.members(&room_key);
                let peers: Vec<PeerInfo> = members
                    .iter()
                    .filter(|m| m.as_str() != session_id)
                    .map(|m| PeerInfo {
                        id: m.clone(),
                        display_name: state
                            .sessions
                            .lookup(m)
                            .and_then(|e| e.display_name.clone()),
                    })
                    .collect();

                info!(
                    session_id = %session_id,
                    room_key = %room_key,
                    members = members.len(),
                    "session joined room"
                );

                send_to(
                    &state.sessions,
                    session_id,
                    ServerEnvelope::Joined {
                        room_key: room_key.clone(),
                        session_id: session_id.to_string(),
                        peers,
                    },
                );

                // The pre-existing peer initiates the offer, so it needs
                // to learn the newcomer's id.
                let notification = ServerEnvelope::PeerJoined {
                    peer_id: session_id.to_string(),
                    display_name,
                };
                for member in members.iter().filter(|m| m.as_str() != session_id) {
                    send_to(&state.sessions, member, notification.clone());
                }
            }
            JoinOutcome::RoomFull => {
                info!(
                    session_id = %session_id,
                    room_key = %room_key,
                    "join refused, room full"
                );
                send_to(
                    &state.sessions,
                    session_id,
                    ServerEnvelope::error(ErrorCode::RoomFull, format!("room {room_key} is full")),
                );
            }
            JoinOutcome::AlreadyMember => {
                send_to(
                    &state.sessions,
                    session_id,
                    ServerEnvelope::error(
                        ErrorCode::AlreadyInRoom,
                        format!("already in room {room_key}"),
                    ),
                );
            }
        }
    }

    /// Shared departure routine for explicit `leave` and transport loss.
    /// A no-op when the session is idle or unknown.
    fn depart_room(state: &mut RelayState, session_id: &str) {
        let Some(room_key) = state.sessions.room_of(session_id) else {
            return;
        };
        state.sessions.set_room(session_id, None);

        if let Some(remaining) = state.rooms.leave(&room_key, session_id) {
            info!(
                session_id = %session_id,
                room_key = %room_key,
                remaining = remaining.len(),
                "session left room"
            );
            if !remaining.is_empty() {
                let notification = ServerEnvelope::PeerLeft {
                    peer_id: session_id.to_string(),
                };
                for member in &remaining {
                    send_to(&state.sessions, member, notification.clone());
                }
            }
        }
    }

    /// Relay a handshake envelope to its target, or to all other room
    /// members when no target is declared.
    fn relay(
        state: &RelayState,
        sender_id: &str,
        target_id: Option<String>,
        envelope: ServerEnvelope,
    ) {
        let Some(room_key) = state.sessions.room_of(sender_id) else {
            send_to(
                &state.sessions,
                sender_id,
                ServerEnvelope::error(
                    ErrorCode::NotInRoom,
                    format!("cannot relay {}: join a room first", envelope.kind()),
                ),
            );
            return;
        };

        let members = state.rooms.members(&room_key);
        match target_id {
            Some(target) => {
                if target != sender_id && members.iter().any(|m| *m == target) {
                    send_to(&state.sessions, &target, envelope);
                } else {
                    // Stale target: the peer left or never existed. The
                    // sender's own timeout is the recovery mechanism.
                    debug!(
                        sender_id = %sender_id,
                        target_id = %target,
                        room_key = %room_key,
                        kind = envelope.kind(),
                        "relay target not in room, dropping"
                    );
                }
            }
            None => {
                for member in members.iter().filter(|m| m.as_str() != sender_id) {
                    send_to(&state.sessions, member, envelope.clone());
                }
            }
        }
    }
}

/// Deliver an envelope to a live session, dropping it with a log entry
/// when the session is gone or its connection already closed.
fn send_to(sessions: &SessionRegistry, session_id: &str, envelope: ServerEnvelope) {
    match sessions.lookup(session_id) {
        Some(entry) => {
            if entry.sender.send(envelope).is_err() {
                debug!(session_id = %session_id, "outbound channel closed, dropping envelope");
            }
        }
        None => {
            debug!(session_id = %session_id, "no live session for envelope, dropping");
        }
    }
}
