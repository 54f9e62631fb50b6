use std::time::Duration;

/// Callback run when a timer fires
pub type TimerCallback = Box<dyn FnOnce() + Send + 'static>;

/// Source of one-shot deferred callbacks
///
/// The reconnection scheduler arms at most one timer at a time through
/// this trait. Implementations must not run the callback synchronously
/// from inside `schedule`.
pub trait Timer: Send + Sync {
    /// Run `callback` once after `delay` has elapsed
    fn schedule(&self, delay: Duration, callback: TimerCallback) -> Box<dyn TimerHandle>;
}

/// Handle to a scheduled callback
pub trait TimerHandle: Send {
    /// Prevent the callback from running; no-op if it already ran
    fn cancel(&self);
}
