//! Peer-signaling relay for PeerLink 1:1 calls
//!
//! Lets two browser clients discover each other in a shared room and
//! exchange the opaque handshake payloads (SDP offers/answers, ICE
//! candidates) needed to establish a direct WebRTC media channel. The
//! relay carries no media, keeps no state across restarts, and treats
//! every handshake payload as an unparsed blob.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │  Browser clients (WebSocket, origin-gated upgrade)   │
//! │  ↓                                                   │
//! │  SignalingServer / ServerHandle                      │
//! │  ├─ transport: reader loop + forwarder per socket    │
//! │  └─ SignalingRouter (one lock, atomic dispatch)      │
//! │     ├─ SessionRegistry (identity, room membership)   │
//! │     └─ RoomTable (room key → ordered members)        │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use peerlink_signaling::SignalingConfig;
//!
//! let config = SignalingConfig::default();
//! assert!(config.validate().is_ok());
//! assert_eq!(config.room_capacity, 2);
//! ```
//!
//! ## Async usage
//!
//! ```no_run
//! use peerlink_signaling::{SignalingConfig, SignalingServer};
//!
//! # async fn example() -> peerlink_signaling::Result<()> {
//! let config = SignalingConfig {
//!     bind_addr: "127.0.0.1:9030".to_string(),
//!     ..Default::default()
//! };
//! let handle = SignalingServer::new(config)?.start().await?;
//! println!("relay listening on {}", handle.local_addr());
//! # Ok(())
//! # }
//! ```

#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod room;
pub mod router;
mod server;

// Re-exports for public API
pub use config::SignalingConfig;
pub use error::{Error, Result};
pub use protocol::{ClientEnvelope, ErrorCode, PeerInfo, ServerEnvelope};
pub use registry::{RoomKey, SessionId, SessionRegistry};
pub use room::{JoinOutcome, RoomTable};
pub use router::SignalingRouter;
pub use server::{ServerHandle, SignalingServer};

/// Get the version of this crate
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
