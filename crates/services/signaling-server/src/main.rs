//! Signaling relay binary entry point
//!
//! Starts the PeerLink signaling relay for WebRTC call setup.
//!
//! # Usage
//!
//! ```bash
//! # Start on the default address (0.0.0.0:8080)
//! cargo run -p peerlink-signaling-server
//!
//! # Bind elsewhere and allow the deployed frontend origin
//! cargo run -p peerlink-signaling-server -- \
//!   --bind 0.0.0.0:9030 \
//!   --frontend-url https://app.example.com
//!
//! # Raise the room size for group-call experiments
//! cargo run -p peerlink-signaling-server -- --room-capacity 4
//! ```

use clap::Parser;
use peerlink_signaling::{SignalingConfig, SignalingServer};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// PeerLink signaling relay
///
/// Stands between browser clients and relays the WebRTC handshake
/// (SDP offers/answers, ICE candidates) needed to start a direct call.
/// Media never flows through this process.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address the WebSocket listener binds to
    #[arg(long, default_value = "0.0.0.0:8080", env = "SIGNALING_BIND_ADDR")]
    bind: String,

    /// Maximum participants per room
    #[arg(long, default_value_t = 2, env = "SIGNALING_ROOM_CAPACITY")]
    room_capacity: usize,

    /// Maximum live sessions before new connections are refused
    #[arg(long, default_value_t = 1024, env = "SIGNALING_MAX_SESSIONS")]
    max_sessions: usize,

    /// Deployed frontend base URL, allowed as a cross-origin caller
    #[arg(long, env = "FRONTEND_URL")]
    frontend_url: Option<String>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Ctrl+C: first signal requests graceful shutdown, a second forces
    // immediate exit.
    let shutdown_flag = Arc::new(AtomicBool::new(false));
    let shutdown_flag_handler = Arc::clone(&shutdown_flag);

    ctrlc::set_handler(move || {
        let was_already_set = shutdown_flag_handler.swap(true, Ordering::SeqCst);
        if was_already_set {
            eprintln!("shutdown already in progress, forcing immediate exit");
            std::process::exit(0);
        }
        eprintln!("shutdown requested...");

        // Bound the graceful-shutdown window.
        std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_secs(3));
            eprintln!("graceful shutdown timeout (3s), forcing exit");
            std::process::exit(0);
        });
    })
    .expect("Failed to set Ctrl+C handler");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(num_cpus::get())
        .thread_name("signaling-worker")
        .enable_all()
        .build()?;

    runtime.block_on(async_main(args, shutdown_flag))
}

async fn async_main(
    args: Args,
    shutdown_flag: Arc<AtomicBool>,
) -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "PeerLink signaling relay starting"
    );

    let config = SignalingConfig {
        bind_addr: args.bind,
        room_capacity: args.room_capacity,
        max_sessions: args.max_sessions,
        frontend_url: args.frontend_url,
    };

    info!(
        bind_addr = %config.bind_addr,
        room_capacity = config.room_capacity,
        max_sessions = config.max_sessions,
        allowed_origins = config.allowed_origins().len(),
        "configuration loaded"
    );

    let server = SignalingServer::new(config)?;
    let handle = server.start().await?;
    info!(local_addr = %handle.local_addr(), "relay ready to accept connections");

    // Keep running until the shutdown signal arrives.
    while !shutdown_flag.load(Ordering::SeqCst) {
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    }

    info!("shutdown signal received, stopping relay...");
    handle.shutdown().await;
    info!("relay shut down gracefully");

    Ok(())
}

fn init_tracing() {
    // EnvFilter for RUST_LOG support, defaulting to info.
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
