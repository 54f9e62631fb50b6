//! # Resocket Core
//!
//! The connection state machine and everything it is built from.
//!
//! - **connection**: `Connection`, the state machine, and `TransportEvents`
//! - **reconnect**: `ReconnectionScheduler`, attempt counting and retry timers
//! - **timer**: `TokioTimer` for production, `ManualTimer` for virtual time
//! - **tungstenite**: default transport over `tokio-tungstenite`
//! - **dispatcher** / **monitor**: listener fan-out and error monitoring
//! - **config** / **builder**: immutable configuration and type-state builder
//!
//! ## Example
//!
//! ```rust,ignore
//! use resocket::{Connection, ConnectionEvent, ExponentialBackoff};
//!
//! #[tokio::main]
//! async fn main() -> resocket::Result<()> {
//!     let connection = Connection::builder()
//!         .tungstenite()
//!         .backoff(ExponentialBackoff::default())
//!         .build()?;
//!
//!     let events = connection.subscribe();
//!     connection.open("wss://api.example.com/ws", Some("v1.json"))?;
//!
//!     // Receive events
//!     while let Ok(event) = events.recv() {
//!         println!("Event: {:?}", event);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod builder;
pub mod config;
pub mod connection;
pub mod connection_state;
pub mod dispatcher;
pub mod monitor;
pub mod reconnect;
pub mod timer;
pub mod tungstenite;

// Re-export main types
pub use builder::{states, ConnectionBuilder};
pub use config::{BackoffOptions, ConnectionConfig, ConnectionOptions};
pub use connection::{Connection, TransportEvents};
pub use connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState, Metrics};
pub use dispatcher::{EventDispatcher, ListenerId};
pub use monitor::{DiagnosticSink, ListenerFailure, Monitored, TracingDiagnostics};
pub use reconnect::{ReconnectionScheduler, ScheduledRetry};
pub use timer::{ManualTimer, TokioTimer};
pub use tungstenite::TungsteniteFactory;

/// Create a new connection builder
///
/// Convenience for [`Connection::builder`].
pub fn builder() -> ConnectionBuilder<builder::states::NoTransport> {
    ConnectionBuilder::new()
}
