//! Signaling envelope types
//!
//! Closed tagged enums over the wire protocol: clients send `join`,
//! `leave`, `offer`, `answer` and `ice-candidate`; the relay answers with
//! acks, peer notifications, relayed handshake envelopes and typed errors.
//! Handshake payloads (SDP blobs, ICE candidates) are opaque
//! [`serde_json::Value`]s the relay never inspects.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// Envelope sent by a client to the relay
///
/// The `kind` tag selects the variant; fields ride alongside it in
/// camelCase, e.g. `{"kind":"join","roomKey":"abc"}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ClientEnvelope {
    /// Enter a room, creating it if this is the first join for its key
    #[serde(rename_all = "camelCase")]
    Join {
        /// Caller-supplied room key
        room_key: String,
        /// Optional participant display name
        #[serde(default, skip_serializing_if = "Option::is_none")]
        display_name: Option<String>,
    },

    /// Leave the current room; a no-op when not in one
    Leave,

    /// SDP offer for a room peer
    #[serde(rename_all = "camelCase")]
    Offer {
        /// Explicit recipient; all other room members when absent
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target_id: Option<String>,
        /// Opaque SDP blob, relayed unchanged
        payload: Value,
    },

    /// SDP answer for a room peer
    #[serde(rename_all = "camelCase")]
    Answer {
        /// Explicit recipient; all other room members when absent
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target_id: Option<String>,
        /// Opaque SDP blob, relayed unchanged
        payload: Value,
    },

    /// ICE candidate for a room peer
    #[serde(rename_all = "camelCase")]
    IceCandidate {
        /// Explicit recipient; all other room members when absent
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target_id: Option<String>,
        /// Opaque candidate structure, relayed unchanged
        payload: Value,
    },
}

/// Envelope sent by the relay to a client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ServerEnvelope {
    /// Join ack: the caller's assigned session id and the peers already
    /// in the room
    #[serde(rename_all = "camelCase")]
    Joined {
        /// Room the caller just entered
        room_key: String,
        /// The caller's own session id
        session_id: String,
        /// Members that were in the room before this join
        peers: Vec<PeerInfo>,
    },

    /// A new member entered the caller's room
    #[serde(rename_all = "camelCase")]
    PeerJoined {
        /// The new member's session id
        peer_id: String,
        /// The new member's display name, if it gave one
        #[serde(default, skip_serializing_if = "Option::is_none")]
        display_name: Option<String>,
    },

    /// A member left the caller's room (explicit leave or transport loss)
    #[serde(rename_all = "camelCase")]
    PeerLeft {
        /// The departed member's session id
        peer_id: String,
    },

    /// Relayed SDP offer
    #[serde(rename_all = "camelCase")]
    Offer {
        /// Originating session id
        sender_id: String,
        /// Opaque SDP blob, unchanged from the sender
        payload: Value,
    },

    /// Relayed SDP answer
    #[serde(rename_all = "camelCase")]
    Answer {
        /// Originating session id
        sender_id: String,
        /// Opaque SDP blob, unchanged from the sender
        payload: Value,
    },

    /// Relayed ICE candidate
    #[serde(rename_all = "camelCase")]
    IceCandidate {
        /// Originating session id
        sender_id: String,
        /// Opaque candidate structure, unchanged from the sender
        payload: Value,
    },

    /// Typed error, reported only to the offending connection
    Error {
        /// Machine-readable error category
        code: ErrorCode,
        /// Human-readable detail
        message: String,
    },
}

/// Wire-level error categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCode {
    /// Join refused: the room is at capacity
    RoomFull,

    /// Relay attempted before joining a room
    NotInRoom,

    /// Join attempted while already in a room
    AlreadyInRoom,

    /// Unparseable JSON or unknown envelope kind
    MalformedEnvelope,

    /// Session table exhausted; the relay closes the connection
    SessionLimit,
}

/// Identity of a room member as reported in a [`ServerEnvelope::Joined`] ack
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PeerInfo {
    /// The member's session id
    pub id: String,

    /// The member's display name, if it gave one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl ClientEnvelope {
    /// Parse an envelope from JSON text
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Convert the envelope to JSON text
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// The envelope's kind tag, for logging
    pub fn kind(&self) -> &'static str {
        match self {
            ClientEnvelope::Join { .. } => "join",
            ClientEnvelope::Leave => "leave",
            ClientEnvelope::Offer { .. } => "offer",
            ClientEnvelope::Answer { .. } => "answer",
            ClientEnvelope::IceCandidate { .. } => "ice-candidate",
        }
    }
}

impl ServerEnvelope {
    /// Build a typed error envelope
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        ServerEnvelope::Error {
            code,
            message: message.into(),
        }
    }

    /// Parse an envelope from JSON text
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Convert the envelope to JSON text
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// The envelope's kind tag, for logging
    pub fn kind(&self) -> &'static str {
        match self {
            ServerEnvelope::Joined { .. } => "joined",
            ServerEnvelope::PeerJoined { .. } => "peer-joined",
            ServerEnvelope::PeerLeft { .. } => "peer-left",
            ServerEnvelope::Offer { .. } => "offer",
            ServerEnvelope::Answer { .. } => "answer",
            ServerEnvelope::IceCandidate { .. } => "ice-candidate",
            ServerEnvelope::Error { .. } => "error",
        }
    }
}
