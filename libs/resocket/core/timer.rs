use crate::traits::{ResocketError, Result, Timer, TimerCallback, TimerHandle};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Timer backed by the tokio runtime
///
/// Each scheduled callback runs in its own task after a
/// `tokio::time::sleep`. Cancelling aborts the task.
#[derive(Debug, Clone)]
pub struct TokioTimer {
    handle: Handle,
}

impl TokioTimer {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Bind to the runtime of the calling context
    pub fn from_current() -> Result<Self> {
        Handle::try_current().map(Self::new).map_err(|e| {
            ResocketError::UnsupportedEnvironment(format!("no tokio runtime available: {}", e))
        })
    }
}

impl Timer for TokioTimer {
    fn schedule(&self, delay: Duration, callback: TimerCallback) -> Box<dyn TimerHandle> {
        let task = self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            callback();
        });
        Box::new(TokioTimerHandle(task))
    }
}

struct TokioTimerHandle(JoinHandle<()>);

impl TimerHandle for TokioTimerHandle {
    fn cancel(&self) {
        self.0.abort();
    }
}

struct Entry {
    id: u64,
    deadline: Duration,
    callback: TimerCallback,
}

#[derive(Default)]
struct ManualClock {
    now: Duration,
    next_id: u64,
    entries: Vec<Entry>,
}

/// Virtual-time timer for deterministic tests
///
/// Time only moves when [`advance`](ManualTimer::advance) is called.
/// Callbacks run on the caller's thread, outside the timer's lock, so they
/// may schedule or cancel other timers.
///
/// # Example
/// ```ignore
/// let timer = ManualTimer::new();
/// let connection = Connection::builder()
///     .transport(factory)
///     .timer(timer.clone())
///     .build()?;
///
/// // ... trigger a disconnect ...
/// timer.advance(Duration::from_millis(999)); // not yet
/// timer.advance(Duration::from_millis(1));   // retry fires here
/// ```
#[derive(Clone, Default)]
pub struct ManualTimer {
    clock: Arc<Mutex<ManualClock>>,
}

impl ManualTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Virtual time elapsed since creation
    pub fn now(&self) -> Duration {
        self.clock.lock().now
    }

    /// Number of callbacks waiting to fire
    pub fn pending(&self) -> usize {
        self.clock.lock().entries.len()
    }

    /// Deadline of the earliest pending callback
    pub fn next_deadline(&self) -> Option<Duration> {
        self.clock.lock().entries.iter().map(|e| e.deadline).min()
    }

    /// Move virtual time forward, firing every callback that falls due
    ///
    /// Callbacks fire in deadline order (ties in scheduling order), each
    /// with the clock set to its own deadline. Returns how many fired.
    pub fn advance(&self, by: Duration) -> usize {
        let target = self.clock.lock().now + by;
        let mut fired = 0;

        loop {
            let due = {
                let mut clock = self.clock.lock();
                let next = clock
                    .entries
                    .iter()
                    .enumerate()
                    .filter(|(_, e)| e.deadline <= target)
                    .min_by_key(|(_, e)| (e.deadline, e.id))
                    .map(|(index, _)| index);

                match next {
                    Some(index) => {
                        let entry = clock.entries.remove(index);
                        clock.now = entry.deadline;
                        Some(entry.callback)
                    }
                    None => {
                        clock.now = target;
                        None
                    }
                }
            };

            match due {
                Some(callback) => {
                    callback();
                    fired += 1;
                }
                None => break,
            }
        }

        fired
    }
}

impl Timer for ManualTimer {
    fn schedule(&self, delay: Duration, callback: TimerCallback) -> Box<dyn TimerHandle> {
        let mut clock = self.clock.lock();
        let id = clock.next_id;
        clock.next_id += 1;
        let deadline = clock.now + delay;
        clock.entries.push(Entry {
            id,
            deadline,
            callback,
        });

        Box::new(ManualTimerHandle {
            id,
            clock: Arc::downgrade(&self.clock),
        })
    }
}

struct ManualTimerHandle {
    id: u64,
    clock: Weak<Mutex<ManualClock>>,
}

impl TimerHandle for ManualTimerHandle {
    fn cancel(&self) {
        if let Some(clock) = self.clock.upgrade() {
            clock.lock().entries.retain(|e| e.id != self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter_callback(counter: &Arc<AtomicUsize>) -> TimerCallback {
        let counter = Arc::clone(counter);
        Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn manual_timer_fires_exactly_at_deadline() {
        let timer = ManualTimer::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let _handle = timer.schedule(Duration::from_millis(1000), counter_callback(&fired));

        assert_eq!(timer.advance(Duration::from_millis(999)), 0);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(timer.advance(Duration::from_millis(1)), 1);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(timer.now(), Duration::from_millis(1000));
        assert_eq!(timer.pending(), 0);
    }

    #[test]
    fn cancelled_callback_never_fires() {
        let timer = ManualTimer::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let handle = timer.schedule(Duration::from_millis(10), counter_callback(&fired));

        handle.cancel();
        handle.cancel();
        timer.advance(Duration::from_secs(60));
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn callbacks_may_schedule_more_work() {
        let timer = ManualTimer::new();
        let fired = Arc::new(AtomicUsize::new(0));

        let inner_timer = timer.clone();
        let inner_fired = Arc::clone(&fired);
        let _handle = timer.schedule(
            Duration::from_millis(5),
            Box::new(move || {
                inner_fired.fetch_add(1, Ordering::SeqCst);
                let counter = Arc::clone(&inner_fired);
                // Handle dropped on purpose; dropping does not cancel
                let _ = inner_timer.schedule(
                    Duration::from_millis(5),
                    Box::new(move || {
                        counter.fetch_add(1, Ordering::SeqCst);
                    }),
                );
            }),
        );

        assert_eq!(timer.advance(Duration::from_millis(10)), 2);
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn tokio_timer_cancel_prevents_callback() {
        let timer = TokioTimer::from_current().unwrap();
        let fired = Arc::new(AtomicUsize::new(0));

        let cancelled = timer.schedule(Duration::from_millis(20), counter_callback(&fired));
        cancelled.cancel();
        let _kept = timer.schedule(Duration::from_millis(20), counter_callback(&fired));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn tokio_timer_requires_runtime() {
        assert!(matches!(
            TokioTimer::from_current(),
            Err(ResocketError::UnsupportedEnvironment(_))
        ));
    }
}
