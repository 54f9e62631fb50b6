//! Echo demo for the resilient WebSocket client
//!
//! Opens `RESOCKET_URL`, sends one greeting after every successful open,
//! and logs each connection event until Ctrl+C.
//!
//! Usage:
//!   RESOCKET_URL=ws://127.0.0.1:9001 cargo run --bin ws_echo
//!   cargo run --bin ws_echo -- ws://127.0.0.1:9001 [protocol]
//!
//! Optional: `RESOCKET_PROTOCOL`, `RESOCKET_OPTIONS` (JSON, e.g.
//! `{"backoff": {"kind": "fixed", "delay_ms": 2000}}`), `RESOCKET_GREETING`,
//! `RUST_LOG`.

use anyhow::{Context, Result};
use resocket_demo::bin_common::{init_tracing, parse_args, DemoSettings};
use resocket_demo::resocket::{
    Connection, ConnectionEvent, ConnectionState, ListenerResult, WsMessage,
};
use std::time::Duration;
use tracing::{info, warn};

/// How long to wait for the close handshake before exiting
const SHUTDOWN_GRACE: Duration = Duration::from_secs(3);

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let settings = DemoSettings::from_env()?.with_args(&parse_args());
    info!("Starting ws_echo against {}", settings.url);
    info!("Press Ctrl+C to stop");

    let connection = Connection::builder()
        .tungstenite()
        .options(settings.options.clone())
        .build()
        .context("failed to build connection")?;

    let handle = connection.clone();
    let greeting = settings.greeting.clone();
    connection.add_listener(move |event: &ConnectionEvent| -> ListenerResult {
        match event {
            ConnectionEvent::Opened => {
                info!("Connected, sending greeting");
                handle.send(WsMessage::from(greeting.as_str()))?;
            }
            ConnectionEvent::Message(WsMessage::Text(text)) => info!("<- {}", text),
            ConnectionEvent::Message(WsMessage::Binary(bytes)) => {
                info!("<- {} bytes of binary data", bytes.len())
            }
            ConnectionEvent::Error(detail) => warn!("Transport error: {}", detail),
            ConnectionEvent::Closed(close) => info!(
                "Closed (clean: {}, code: {:?}, reason: {:?})",
                close.was_clean, close.code, close.reason
            ),
            ConnectionEvent::Reconnecting { attempt, delay } => {
                info!("Reconnect attempt {} in {:?}", attempt, delay)
            }
        }
        Ok(())
    });

    connection
        .open(settings.url.as_str(), settings.protocol.as_deref())
        .context("failed to open connection")?;

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl+C")?;

    info!("Shutting down");
    let events = connection.subscribe();
    connection.close()?;

    if connection.state() != ConnectionState::Closed {
        let closed = tokio::task::spawn_blocking(move || loop {
            match events.recv_timeout(SHUTDOWN_GRACE) {
                Ok(ConnectionEvent::Closed(_)) => return true,
                Ok(_) => continue,
                Err(_) => return false,
            }
        })
        .await
        .context("shutdown wait failed")?;
        if !closed {
            warn!("No close confirmation within {:?}", SHUTDOWN_GRACE);
        }
    }

    // Drops the listener, which holds a handle to this connection
    connection.dispose();

    let metrics = connection.metrics();
    info!(
        "ws_echo stopped: sent {}, received {}, reconnects {}",
        metrics.messages_sent, metrics.messages_received, metrics.reconnect_count
    );
    Ok(())
}
