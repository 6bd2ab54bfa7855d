//! WebSocket transport and server lifecycle
//!
//! Accepts HTTP-upgrade connections, gates them on the configured origin
//! allow-list, and bridges each socket to the signaling router: one
//! reader loop and one outbound-forwarder task per connection. The
//! transport guarantees exactly one registration per connection and one
//! terminal cleanup, whether the close is graceful or abrupt.

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch, RwLock};
use tokio::task::{JoinHandle, JoinSet};
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::config::SignalingConfig;
use crate::error::Result;
use crate::protocol::{ClientEnvelope, ErrorCode, ServerEnvelope};
use crate::router::SignalingRouter;

/// The signaling relay, ready to be started
pub struct SignalingServer {
    config: SignalingConfig,
    router: Arc<SignalingRouter>,
}

impl SignalingServer {
    /// Create a relay from a validated configuration
    pub fn new(config: SignalingConfig) -> Result<Self> {
        config.validate()?;
        let router = Arc::new(SignalingRouter::new(&config));
        Ok(Self { config, router })
    }

    /// Bind the listener and start accepting connections.
    ///
    /// The returned handle is the only way to reach the running relay;
    /// other subsystems receive it explicitly rather than through a
    /// process-global.
    pub async fn start(self) -> Result<ServerHandle> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        let local_addr = listener.local_addr()?;
        info!(%local_addr, "signaling relay listening");

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let router = Arc::clone(&self.router);
        let config = Arc::new(self.config);
        let accept_task = tokio::spawn(accept_loop(
            listener,
            Arc::clone(&router),
            config,
            shutdown_rx,
        ));

        Ok(ServerHandle {
            local_addr,
            router,
            shutdown_tx,
            accept_task,
        })
    }
}

/// Handle to a running relay
pub struct ServerHandle {
    local_addr: SocketAddr,
    router: Arc<SignalingRouter>,
    shutdown_tx: watch::Sender<bool>,
    accept_task: JoinHandle<()>,
}

impl ServerHandle {
    /// The address the listener actually bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The router, for inspection and out-of-band pushes
    pub fn router(&self) -> Arc<SignalingRouter> {
        Arc::clone(&self.router)
    }

    /// Push an envelope to every connected client
    pub fn broadcast(&self, envelope: ServerEnvelope) {
        self.router.broadcast(envelope);
    }

    /// Stop accepting connections and tear down the live ones
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.accept_task.await {
            debug!("accept loop ended abnormally: {}", e);
        }
        info!("signaling relay stopped");
    }
}

async fn accept_loop(
    listener: TcpListener,
    router: Arc<SignalingRouter>,
    config: Arc<SignalingConfig>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut connections = JoinSet::new();
    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    connections.spawn(handle_connection(
                        stream,
                        addr,
                        Arc::clone(&router),
                        Arc::clone(&config),
                    ));
                }
                Err(e) => {
                    warn!("accept failed: {}", e);
                }
            },
        }
    }

    info!(
        live = connections.len(),
        "accept loop stopped, closing live connections"
    );
    connections.shutdown().await;
}

/// Handle a single WebSocket connection from handshake to disconnect
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    router: Arc<SignalingRouter>,
    config: Arc<SignalingConfig>,
) {
    let gate_config = Arc::clone(&config);
    let origin_gate = move |request: &Request, response: Response| {
        let origin = request
            .headers()
            .get("Origin")
            .and_then(|value| value.to_str().ok());
        match origin {
            Some(origin) if !gate_config.origin_allowed(origin) => {
                warn!(%addr, %origin, "rejecting upgrade from disallowed origin");
                let mut refusal = ErrorResponse::new(Some("origin not allowed".to_string()));
                *refusal.status_mut() = StatusCode::FORBIDDEN;
                Err(refusal)
            }
            // Requests without an Origin header come from non-browser
            // clients and pass, matching browser-CORS semantics.
            _ => Ok(response),
        }
    };

    let ws_stream = match accept_hdr_async(stream, origin_gate).await {
        Ok(ws) => ws,
        Err(e) => {
            debug!(%addr, "websocket handshake failed: {}", e);
            return;
        }
    };
    info!(%addr, "websocket connection established");

    let (ws_tx, mut ws_rx) = ws_stream.split();
    let ws_tx = Arc::new(RwLock::new(ws_tx));

    // Channel for envelopes destined to this connection.
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEnvelope>();

    let session_id = match router.connect(tx.clone()) {
        Ok(id) => id,
        Err(e) => {
            // Connection-fatal, never process-fatal: refuse and close.
            warn!(%addr, "rejecting connection: {}", e);
            let refusal = ServerEnvelope::error(ErrorCode::SessionLimit, e.to_string());
            if let Ok(json) = refusal.to_json() {
                let mut sink = ws_tx.write().await;
                let _ = sink.send(Message::Text(json)).await;
                let _ = sink.close().await;
            }
            return;
        }
    };

    // Forward router output to the socket.
    let forward_sink = Arc::clone(&ws_tx);
    let forward_session = session_id.clone();
    let forward_task = tokio::spawn(async move {
        while let Some(envelope) = rx.recv().await {
            let json = match envelope.to_json() {
                Ok(json) => json,
                Err(e) => {
                    error!(
                        session_id = %forward_session,
                        kind = envelope.kind(),
                        "failed to encode outbound envelope: {}",
                        e
                    );
                    continue;
                }
            };
            let mut sink = forward_sink.write().await;
            if let Err(e) = sink.send(Message::Text(json)).await {
                debug!(session_id = %forward_session, "outbound send failed: {}", e);
                break;
            }
        }
    });

    while let Some(msg) = ws_rx.next().await {
        match msg {
            Ok(Message::Text(text)) => match ClientEnvelope::from_json(&text) {
                Ok(envelope) => router.handle(&session_id, envelope),
                Err(e) => {
                    debug!(session_id = %session_id, "malformed envelope: {}", e);
                    let _ = tx.send(ServerEnvelope::error(
                        ErrorCode::MalformedEnvelope,
                        format!("unparseable signaling envelope: {e}"),
                    ));
                }
            },
            Ok(Message::Close(_)) => {
                info!(session_id = %session_id, "connection closed by client");
                break;
            }
            Ok(Message::Ping(data)) => {
                let mut sink = ws_tx.write().await;
                let _ = sink.send(Message::Pong(data)).await;
            }
            Err(e) => {
                debug!(session_id = %session_id, "websocket error: {}", e);
                break;
            }
            _ => {}
        }
    }

    // Terminal cleanup, shared by graceful and abrupt closes: departs
    // the room (one peer-left to any remaining member) and unregisters.
    router.disconnect(&session_id);
    forward_task.abort();
}
