//! Error monitoring for listener callbacks
//!
//! [`Monitored`] is a decorator applied where a listener is registered. It
//! intercepts errors and panics raised by the wrapped listener and forwards
//! them to a [`DiagnosticSink`]. The connection's own transitions are never
//! affected: they are committed before any listener runs.

use crate::traits::{ConnectionEvent, EventListener, ListenerResult};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::error;

/// A listener failure captured by [`Monitored`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerFailure {
    /// Name of the monitored listener
    pub listener: String,
    /// Kind of event being delivered when it failed
    pub event_kind: &'static str,
    /// Error or panic message
    pub message: String,
    /// Whether the listener panicked rather than returning an error
    pub panicked: bool,
}

/// Destination for captured listener failures
pub trait DiagnosticSink: Send + Sync + 'static {
    fn report(&self, failure: ListenerFailure);
}

impl<F> DiagnosticSink for F
where
    F: Fn(ListenerFailure) + Send + Sync + 'static,
{
    fn report(&self, failure: ListenerFailure) {
        self(failure)
    }
}

/// Logs failures through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDiagnostics;

impl DiagnosticSink for TracingDiagnostics {
    fn report(&self, failure: ListenerFailure) {
        error!(
            listener = %failure.listener,
            event = failure.event_kind,
            panicked = failure.panicked,
            "Listener failed: {}",
            failure.message
        );
    }
}

/// Listener decorator that routes failures to a diagnostic sink
///
/// # Example
/// ```ignore
/// connection.add_listener(Monitored::new("ui", my_listener, TracingDiagnostics));
/// ```
pub struct Monitored<L, S = TracingDiagnostics> {
    name: String,
    inner: L,
    sink: S,
}

impl<L, S> Monitored<L, S>
where
    L: EventListener,
    S: DiagnosticSink,
{
    pub fn new(name: impl Into<String>, inner: L, sink: S) -> Self {
        Self {
            name: name.into(),
            inner,
            sink,
        }
    }

    fn report(&self, event: &ConnectionEvent, message: String, panicked: bool) {
        self.sink.report(ListenerFailure {
            listener: self.name.clone(),
            event_kind: event.kind(),
            message,
            panicked,
        });
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

impl<L, S> EventListener for Monitored<L, S>
where
    L: EventListener,
    S: DiagnosticSink,
{
    fn on_event(&self, event: &ConnectionEvent) -> ListenerResult {
        match catch_unwind(AssertUnwindSafe(|| self.inner.on_event(event))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => self.report(event, e.to_string(), false),
            Err(payload) => self.report(event, panic_message(payload.as_ref()), true),
        }
        Ok(())
    }
}
