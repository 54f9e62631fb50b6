use crate::traits::{BackoffStrategy, Timer, TimerHandle};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// A retry that has been armed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledRetry {
    /// Attempt number after incrementing (1 for the first retry)
    pub attempt: u32,
    /// Delay before the retry fires
    pub delay: Duration,
}

struct PendingRetry {
    ticket: u64,
    handle: Box<dyn TimerHandle>,
}

/// Decides and times retries after unexpected disconnects
///
/// Owns the attempt counter and at most one pending timer. Each armed
/// timer carries a ticket; when it fires, the owner must [`claim`] the
/// ticket before acting, so a timer that raced with a cancel is ignored.
///
/// [`claim`]: ReconnectionScheduler::claim
pub struct ReconnectionScheduler {
    backoff: Arc<dyn BackoffStrategy>,
    timer: Arc<dyn Timer>,
    attempt: u32,
    pending: Option<PendingRetry>,
    next_ticket: u64,
}

impl ReconnectionScheduler {
    pub fn new(backoff: Arc<dyn BackoffStrategy>, timer: Arc<dyn Timer>) -> Self {
        Self {
            backoff,
            timer,
            attempt: 0,
            pending: None,
            next_ticket: 0,
        }
    }

    /// Consecutive retries scheduled since the last successful open
    #[inline]
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    #[inline]
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Arm a retry timer
    ///
    /// The delay comes from the backoff strategy, fed the zero-indexed
    /// attempt number. On success the attempt counter is incremented and
    /// `fire` will be called with the retry's ticket when the delay
    /// elapses. Returns `None` when the strategy says to stop; nothing is
    /// armed and the counter is unchanged.
    pub fn schedule_retry<F>(&mut self, fire: F) -> Option<ScheduledRetry>
    where
        F: FnOnce(u64) + Send + 'static,
    {
        let delay = self.backoff.delay(self.attempt)?;

        self.cancel_pending();
        self.attempt += 1;

        let ticket = self.next_ticket;
        self.next_ticket += 1;

        let handle = self.timer.schedule(delay, Box::new(move || fire(ticket)));
        self.pending = Some(PendingRetry { ticket, handle });

        Some(ScheduledRetry {
            attempt: self.attempt,
            delay,
        })
    }

    /// Take ownership of a fired timer
    ///
    /// Returns `true` and clears the pending slot if `ticket` is the
    /// currently armed retry; `false` for stale or cancelled tickets.
    pub fn claim(&mut self, ticket: u64) -> bool {
        match &self.pending {
            Some(pending) if pending.ticket == ticket => {
                self.pending = None;
                true
            }
            _ => false,
        }
    }

    /// Cancel the pending retry, if any
    pub fn cancel_pending(&mut self) {
        if let Some(pending) = self.pending.take() {
            debug!("Cancelling pending reconnect (ticket {})", pending.ticket);
            pending.handle.cancel();
        }
    }

    /// Called after a successful connect
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

impl Drop for ReconnectionScheduler {
    fn drop(&mut self) {
        self.cancel_pending();
    }
}
