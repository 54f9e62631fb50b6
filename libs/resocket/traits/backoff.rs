use std::time::Duration;

/// Default first retry delay of [`ExponentialBackoff`]
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(1);

/// Default delay cap of [`ExponentialBackoff`]
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(60);

/// Maps a retry attempt to the delay before the next connection attempt
///
/// Strategies are pure: the reconnection scheduler owns the attempt
/// counter and passes it in. Any `Fn(u32) -> Option<Duration>` closure is
/// a strategy.
pub trait BackoffStrategy: Send + Sync {
    /// Get the delay before the next reconnection attempt
    ///
    /// # Arguments
    /// * `attempt` - Number of consecutive retries already scheduled (0-indexed)
    ///
    /// # Returns
    /// * `Some(duration)` - Wait this long before reconnecting
    /// * `None` - Stop reconnecting
    fn delay(&self, attempt: u32) -> Option<Duration>;
}

impl<F> BackoffStrategy for F
where
    F: Fn(u32) -> Option<Duration> + Send + Sync,
{
    fn delay(&self, attempt: u32) -> Option<Duration> {
        self(attempt)
    }
}

fn within_limit(max_attempts: Option<u32>, attempt: u32) -> bool {
    max_attempts.map_or(true, |max| attempt < max)
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Exponential backoff reconnection strategy
///
/// Delays between reconnection attempts grow exponentially:
/// initial_delay * 2^attempt, capped at max_delay.
///
/// The default (1s initial, 60s cap, unlimited attempts) yields
/// 1s, 2s, 4s, 8s, 16s, 32s and then 60s for every attempt from 6 on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExponentialBackoff {
    initial_delay: Duration,
    max_delay: Duration,
    max_attempts: Option<u32>,
}

impl ExponentialBackoff {
    /// Create a new exponential backoff strategy
    ///
    /// # Arguments
    /// * `initial_delay` - The delay before the first reconnect
    /// * `max_delay` - The maximum delay between reconnects
    /// * `max_attempts` - Maximum number of attempts (None = unlimited)
    pub fn new(initial_delay: Duration, max_delay: Duration, max_attempts: Option<u32>) -> Self {
        Self {
            initial_delay,
            max_delay,
            max_attempts,
        }
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(DEFAULT_INITIAL_DELAY, DEFAULT_MAX_DELAY, None)
    }
}

impl BackoffStrategy for ExponentialBackoff {
    fn delay(&self, attempt: u32) -> Option<Duration> {
        if !within_limit(self.max_attempts, attempt) {
            return None;
        }

        let delay = 2u64
            .checked_pow(attempt)
            .and_then(|factor| millis(self.initial_delay).checked_mul(factor))
            .unwrap_or(u64::MAX);
        Some(Duration::from_millis(delay.min(millis(self.max_delay))))
    }
}

/// Linear backoff reconnection strategy
///
/// Delay is initial_delay + step * attempt, optionally capped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinearBackoff {
    initial_delay: Duration,
    step: Duration,
    max_delay: Option<Duration>,
    max_attempts: Option<u32>,
}

impl LinearBackoff {
    pub fn new(initial_delay: Duration, step: Duration) -> Self {
        Self {
            initial_delay,
            step,
            max_delay: None,
            max_attempts: None,
        }
    }

    /// Cap every delay at `max_delay`
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = Some(max_delay);
        self
    }

    /// Give up after `max_attempts` retries
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }
}

impl BackoffStrategy for LinearBackoff {
    fn delay(&self, attempt: u32) -> Option<Duration> {
        if !within_limit(self.max_attempts, attempt) {
            return None;
        }

        let delay = millis(self.step)
            .saturating_mul(u64::from(attempt))
            .saturating_add(millis(self.initial_delay));
        let delay = match self.max_delay {
            Some(max) => delay.min(millis(max)),
            None => delay,
        };
        Some(Duration::from_millis(delay))
    }
}

/// Fixed delay reconnection strategy
///
/// Always waits the same amount of time between reconnection attempts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedDelay {
    delay: Duration,
    max_attempts: Option<u32>,
}

impl FixedDelay {
    /// Create a new fixed delay strategy
    ///
    /// # Arguments
    /// * `delay` - The fixed delay between reconnects
    /// * `max_attempts` - Maximum number of attempts (None = unlimited)
    pub fn new(delay: Duration, max_attempts: Option<u32>) -> Self {
        Self { delay, max_attempts }
    }
}

impl BackoffStrategy for FixedDelay {
    fn delay(&self, attempt: u32) -> Option<Duration> {
        within_limit(self.max_attempts, attempt).then_some(self.delay)
    }
}

/// Never reconnect strategy
///
/// Every unexpected close is final
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NeverReconnect;

impl BackoffStrategy for NeverReconnect {
    fn delay(&self, _attempt: u32) -> Option<Duration> {
        None
    }
}
