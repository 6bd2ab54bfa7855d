//! End-to-end relay tests over real WebSocket connections
//!
//! Each test binds a relay to an ephemeral port, connects plain
//! `tokio-tungstenite` clients the way a browser would, and drives the
//! signaling flow: join, peer notification, handshake relay, disconnect
//! cleanup, and origin gating at the upgrade.

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use peerlink_signaling::{
    ClientEnvelope, ErrorCode, ServerEnvelope, ServerHandle, SignalingConfig, SignalingServer,
};
use serde_json::json;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

// =============================================================================
// Test Setup Helpers
// =============================================================================

/// Initialize tracing for tests (call once per test)
fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("info")
        .try_init();
}

async fn start_relay() -> ServerHandle {
    let config = SignalingConfig {
        bind_addr: "127.0.0.1:0".to_string(),
        ..Default::default()
    };
    SignalingServer::new(config)
        .expect("config should validate")
        .start()
        .await
        .expect("relay should bind an ephemeral port")
}

async fn connect_client(addr: SocketAddr) -> WsClient {
    let (client, _) = connect_async(format!("ws://{addr}"))
        .await
        .expect("client handshake should succeed");
    client
}

async fn send(client: &mut WsClient, envelope: &ClientEnvelope) {
    let json = envelope.to_json().expect("envelope should encode");
    client
        .send(Message::Text(json))
        .await
        .expect("send should succeed");
}

async fn join(client: &mut WsClient, room_key: &str, display_name: Option<&str>) {
    send(
        client,
        &ClientEnvelope::Join {
            room_key: room_key.to_string(),
            display_name: display_name.map(|n| n.to_string()),
        },
    )
    .await;
}

/// Wait for the next server envelope, skipping non-text frames
async fn recv(client: &mut WsClient) -> ServerEnvelope {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let msg = client
                .next()
                .await
                .expect("connection should stay open")
                .expect("websocket read should succeed");
            if let Message::Text(text) = msg {
                return ServerEnvelope::from_json(&text).expect("server envelope should parse");
            }
        }
    })
    .await
    .expect("timed out waiting for a server envelope")
}

// =============================================================================
// Join / room lifecycle
// =============================================================================

#[tokio::test]
async fn test_join_ack_and_peer_notification() {
    init_test_tracing();
    let relay = start_relay().await;
    let addr = relay.local_addr();

    let mut x = connect_client(addr).await;
    join(&mut x, "abc", Some("Asha")).await;
    let x_id = match recv(&mut x).await {
        ServerEnvelope::Joined {
            room_key,
            session_id,
            peers,
        } => {
            assert_eq!(room_key, "abc");
            assert!(peers.is_empty());
            session_id
        }
        other => panic!("expected joined ack, got {}", other.kind()),
    };

    let mut y = connect_client(addr).await;
    join(&mut y, "abc", None).await;
    match recv(&mut y).await {
        ServerEnvelope::Joined { peers, .. } => {
            assert_eq!(peers.len(), 1);
            assert_eq!(peers[0].id, x_id);
            assert_eq!(peers[0].display_name.as_deref(), Some("Asha"));
        }
        other => panic!("expected joined ack, got {}", other.kind()),
    }

    // The pre-existing member learns the newcomer's identity.
    match recv(&mut x).await {
        ServerEnvelope::PeerJoined { peer_id, .. } => assert_ne!(peer_id, x_id),
        other => panic!("expected peer-joined, got {}", other.kind()),
    }

    relay.shutdown().await;
}

#[tokio::test]
async fn test_third_join_rejected_room_full() {
    init_test_tracing();
    let relay = start_relay().await;
    let addr = relay.local_addr();

    let mut x = connect_client(addr).await;
    let mut y = connect_client(addr).await;
    let mut z = connect_client(addr).await;

    join(&mut x, "abc", None).await;
    recv(&mut x).await;
    join(&mut y, "abc", None).await;
    recv(&mut y).await;

    join(&mut z, "abc", None).await;
    match recv(&mut z).await {
        ServerEnvelope::Error { code, .. } => assert_eq!(code, ErrorCode::RoomFull),
        other => panic!("expected room-full error, got {}", other.kind()),
    }

    relay.shutdown().await;
}

// =============================================================================
// Handshake relay
// =============================================================================

#[tokio::test]
async fn test_offer_relays_with_sender_identity() {
    init_test_tracing();
    let relay = start_relay().await;
    let addr = relay.local_addr();

    let mut x = connect_client(addr).await;
    join(&mut x, "abc", None).await;
    let x_id = match recv(&mut x).await {
        ServerEnvelope::Joined { session_id, .. } => session_id,
        other => panic!("expected joined ack, got {}", other.kind()),
    };

    let mut y = connect_client(addr).await;
    join(&mut y, "abc", None).await;
    let y_id = match recv(&mut y).await {
        ServerEnvelope::Joined { session_id, .. } => session_id,
        other => panic!("expected joined ack, got {}", other.kind()),
    };
    recv(&mut x).await; // peer-joined

    let payload = json!({"type": "offer", "sdp": "v=0\r\no=- 46117 2 IN IP4 127.0.0.1\r\n"});
    send(
        &mut y,
        &ClientEnvelope::Offer {
            target_id: Some(x_id),
            payload: payload.clone(),
        },
    )
    .await;

    match recv(&mut x).await {
        ServerEnvelope::Offer {
            sender_id,
            payload: relayed,
        } => {
            assert_eq!(sender_id, y_id);
            assert_eq!(relayed, payload);
        }
        other => panic!("expected relayed offer, got {}", other.kind()),
    }

    relay.shutdown().await;
}

#[tokio::test]
async fn test_relay_before_join_is_typed_error() {
    init_test_tracing();
    let relay = start_relay().await;

    let mut client = connect_client(relay.local_addr()).await;
    send(
        &mut client,
        &ClientEnvelope::Offer {
            target_id: None,
            payload: json!({"sdp": "v=0"}),
        },
    )
    .await;

    match recv(&mut client).await {
        ServerEnvelope::Error { code, .. } => assert_eq!(code, ErrorCode::NotInRoom),
        other => panic!("expected not-in-room error, got {}", other.kind()),
    }

    relay.shutdown().await;
}

#[tokio::test]
async fn test_malformed_envelope_reported_not_fatal() {
    init_test_tracing();
    let relay = start_relay().await;

    let mut client = connect_client(relay.local_addr()).await;
    client
        .send(Message::Text("{\"kind\":\"mute\"}".to_string()))
        .await
        .expect("send should succeed");

    match recv(&mut client).await {
        ServerEnvelope::Error { code, .. } => assert_eq!(code, ErrorCode::MalformedEnvelope),
        other => panic!("expected malformed-envelope error, got {}", other.kind()),
    }

    // The connection survives the protocol error.
    join(&mut client, "abc", None).await;
    match recv(&mut client).await {
        ServerEnvelope::Joined { room_key, .. } => assert_eq!(room_key, "abc"),
        other => panic!("expected joined ack, got {}", other.kind()),
    }

    relay.shutdown().await;
}

// =============================================================================
// Disconnect cleanup
// =============================================================================

#[tokio::test]
async fn test_disconnect_notifies_remaining_peer() {
    init_test_tracing();
    let relay = start_relay().await;
    let addr = relay.local_addr();

    let mut x = connect_client(addr).await;
    join(&mut x, "abc", None).await;
    let x_id = match recv(&mut x).await {
        ServerEnvelope::Joined { session_id, .. } => session_id,
        other => panic!("expected joined ack, got {}", other.kind()),
    };

    let mut y = connect_client(addr).await;
    join(&mut y, "abc", None).await;
    recv(&mut y).await;
    recv(&mut x).await; // peer-joined

    x.close(None).await.expect("close should succeed");

    match recv(&mut y).await {
        ServerEnvelope::PeerLeft { peer_id } => assert_eq!(peer_id, x_id),
        other => panic!("expected peer-left, got {}", other.kind()),
    }

    relay.shutdown().await;
}

// =============================================================================
// Origin gating
// =============================================================================

#[tokio::test]
async fn test_disallowed_origin_refused_at_upgrade() {
    init_test_tracing();
    let relay = start_relay().await;

    let mut request = format!("ws://{}", relay.local_addr())
        .into_client_request()
        .expect("request should build");
    request.headers_mut().insert(
        "Origin",
        HeaderValue::from_static("http://evil.example.com"),
    );

    match connect_async(request).await {
        Err(WsError::Http(response)) => assert_eq!(response.status(), 403),
        Err(other) => panic!("expected an HTTP 403 refusal, got {other}"),
        Ok(_) => panic!("handshake from a disallowed origin should fail"),
    }

    relay.shutdown().await;
}

#[tokio::test]
async fn test_allowed_origin_accepted() {
    init_test_tracing();
    let relay = start_relay().await;

    let mut request = format!("ws://{}", relay.local_addr())
        .into_client_request()
        .expect("request should build");
    request
        .headers_mut()
        .insert("Origin", HeaderValue::from_static("http://localhost:5173"));

    let (mut client, _) = connect_async(request)
        .await
        .expect("allow-listed origin should connect");

    join(&mut client, "abc", None).await;
    match recv(&mut client).await {
        ServerEnvelope::Joined { room_key, .. } => assert_eq!(room_key, "abc"),
        other => panic!("expected joined ack, got {}", other.kind()),
    }

    relay.shutdown().await;
}
