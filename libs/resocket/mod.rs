//! # Resocket
//!
//! A resilient WebSocket client: one stable handle that opens, sends,
//! receives and closes a connection, and transparently reconnects after
//! unexpected disconnects on a pluggable backoff schedule.
//!
//! ## Features
//!
//! - **Explicit state machine**: CLOSED → CONNECTING → OPEN → CLOSING → CLOSED,
//!   with misuse (double open, send while closed) reported as errors
//! - **Intent-aware reconnection**: only unexpected closes are retried; an
//!   explicit `close()` cancels any pending retry
//! - **Pluggable backoff**: any `Fn(u32) -> Option<Duration>` is a strategy
//! - **Generation guard**: late events from superseded transports are ignored
//! - **Virtual time**: `ManualTimer` makes retry timing testable

pub mod core;
pub mod traits;

// Re-export all traits
pub use traits::*;

// Re-export core functionality
pub use crate::core::{
    builder, config, connection, connection_state, dispatcher, monitor, reconnect, timer,
    tungstenite,
    builder::{states, ConnectionBuilder},
    config::{BackoffOptions, ConnectionConfig, ConnectionOptions},
    connection::{Connection, TransportEvents},
    connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState, Metrics},
    dispatcher::{EventDispatcher, ListenerId},
    monitor::{DiagnosticSink, ListenerFailure, Monitored, TracingDiagnostics},
    reconnect::{ReconnectionScheduler, ScheduledRetry},
    timer::{ManualTimer, TokioTimer},
    tungstenite::TungsteniteFactory,
};

// Convenience function
pub use crate::core::builder as connection_builder;
