use crate::traits::message::WsMessage;
use std::time::Duration;

/// Close code reported when a socket ends without a close handshake
pub const ABNORMAL_CLOSURE: u16 = 1006;

/// Close code used for caller-initiated closes
pub const NORMAL_CLOSURE: u16 = 1000;

/// Details of a disconnect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseInfo {
    /// Whether the transport reported an orderly shutdown
    pub was_clean: bool,
    /// Close code, if the transport reported one
    pub code: Option<u16>,
    /// Close reason, if the transport reported one
    pub reason: Option<String>,
}

impl CloseInfo {
    /// Orderly close with the given code and reason
    pub fn clean(code: u16, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            was_clean: true,
            code: Some(code),
            reason: (!reason.is_empty()).then_some(reason),
        }
    }

    /// Abrupt close (connect failure, reset, dropped TCP stream)
    pub fn abnormal() -> Self {
        Self {
            was_clean: false,
            code: Some(ABNORMAL_CLOSURE),
            reason: None,
        }
    }
}

/// Notification emitted by a connection
///
/// Delivered to every registered listener in emission order. By the time a
/// listener sees an event, the state transition that produced it has
/// already been committed.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    /// The transport finished connecting
    Opened,
    /// The transport closed, cleanly or not
    Closed(CloseInfo),
    /// A payload arrived, verbatim
    Message(WsMessage),
    /// The transport reported an error; a `Closed` usually follows
    Error(String),
    /// A retry was scheduled after an unexpected close
    Reconnecting { attempt: u32, delay: Duration },
}

impl ConnectionEvent {
    /// Short name of the event kind, used in logs and diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            ConnectionEvent::Opened => "opened",
            ConnectionEvent::Closed(_) => "closed",
            ConnectionEvent::Message(_) => "message",
            ConnectionEvent::Error(_) => "error",
            ConnectionEvent::Reconnecting { .. } => "reconnecting",
        }
    }
}

/// Error a listener may return from its callback
pub type ListenerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result of a listener callback
pub type ListenerResult = std::result::Result<(), ListenerError>;

/// Receives connection notifications
///
/// Listeners are invoked synchronously, after the connection has released
/// its internal lock, so a listener may call back into the connection
/// (`send`, `close`, even `open` from a `Closed` notification).
///
/// # Example
///
/// ```ignore
/// connection.add_listener(|event: &ConnectionEvent| {
///     if let ConnectionEvent::Message(msg) = event {
///         println!("got {:?}", msg);
///     }
///     Ok(())
/// });
/// ```
pub trait EventListener: Send + Sync + 'static {
    /// Handle one notification
    ///
    /// Errors are not handled by the connection beyond logging; wrap the
    /// listener in [`Monitored`](crate::core::monitor::Monitored) to route
    /// them to a diagnostic sink.
    fn on_event(&self, event: &ConnectionEvent) -> ListenerResult;
}

impl<F> EventListener for F
where
    F: Fn(&ConnectionEvent) -> ListenerResult + Send + Sync + 'static,
{
    fn on_event(&self, event: &ConnectionEvent) -> ListenerResult {
        self(event)
    }
}
