use crate::core::connection::TransportEvents;
use crate::traits::error::Result;
use crate::traits::message::WsMessage;
use std::sync::Arc;

/// Target and options for one transport instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    /// WebSocket URL (wss:// or ws://)
    pub url: String,
    /// Optional subprotocol to negotiate
    pub protocol: Option<String>,
    /// Deliver every inbound data frame as binary
    pub binary_mode: bool,
}

/// A live socket created by a [`TransportFactory`]
///
/// A transport reports connect, message, error and disconnect through the
/// [`TransportEvents`] handle it was created with. Each transport instance
/// is used for exactly one connection cycle and is never reused.
pub trait Transport: Send + Sync {
    /// Send a payload, unchanged
    fn send(&self, message: WsMessage) -> Result<()>;

    /// Start an orderly close
    ///
    /// The transport is expected to follow with `disconnected` once the
    /// socket is actually closed. Must not raise events synchronously.
    fn close(&self, code: u16, reason: &str) -> Result<()>;
}

/// Constructs transports for a connection
///
/// # Example
///
/// ```ignore
/// struct MyFactory;
///
/// impl TransportFactory for MyFactory {
///     fn is_supported(&self) -> bool { true }
///
///     fn connect(&self, request: &ConnectRequest, events: TransportEvents) -> Result<Arc<dyn Transport>> {
///         // Start connecting, keep `events` to report progress
///     }
/// }
/// ```
pub trait TransportFactory: Send + Sync {
    /// Whether the environment can create transports at all
    fn is_supported(&self) -> bool;

    /// Create a transport targeting `request.url`
    ///
    /// Returning `Err` means the transport could not even be created (bad
    /// URL, no runtime). Connect failures after creation must be reported
    /// through `events` instead.
    ///
    /// `events` may be used before this returns (a transport that connects
    /// synchronously); such events are held until the returned transport
    /// has been stored, then delivered in order. If `Err` is returned they
    /// are discarded.
    fn connect(&self, request: &ConnectRequest, events: TransportEvents)
        -> Result<Arc<dyn Transport>>;
}
