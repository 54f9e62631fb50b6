//! # Resocket Traits
//!
//! Shared types and collaborator seams used by the connection core:
//!
//! - **WsMessage**: Opaque text/binary payloads
//! - **ConnectionEvent**: Notifications delivered to listeners
//! - **EventListener**: Receives notifications
//! - **BackoffStrategy**: Maps a retry attempt to a delay
//! - **TransportFactory**: Creates the underlying socket
//! - **Timer**: Cancellable deferred callbacks
//!
//! ## Example
//!
//! ```rust,ignore
//! use resocket::traits::*;
//! use std::time::Duration;
//!
//! // Any closure is a backoff strategy
//! let linear = |attempt: u32| Some(Duration::from_millis(attempt as u64 * 1000 + 1000));
//! assert_eq!(linear.delay(1), Some(Duration::from_millis(2000)));
//! ```

pub mod backoff;
pub mod error;
pub mod event;
pub mod message;
pub mod timer;
pub mod transport;

// Re-export commonly used types
pub use backoff::{BackoffStrategy, ExponentialBackoff, FixedDelay, LinearBackoff, NeverReconnect};
pub use error::{ResocketError, Result};
pub use event::{CloseInfo, ConnectionEvent, EventListener, ListenerError, ListenerResult};
pub use message::WsMessage;
pub use timer::{Timer, TimerCallback, TimerHandle};
pub use transport::{ConnectRequest, Transport, TransportFactory};
