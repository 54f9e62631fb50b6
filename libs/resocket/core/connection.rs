use crate::config::ConnectionConfig;
use crate::connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState, Metrics};
use crate::dispatcher::{EventDispatcher, ListenerId};
use crate::reconnect::{ReconnectionScheduler, ScheduledRetry};
use crate::traits::event::NORMAL_CLOSURE;
use crate::traits::*;
use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

/// Last-used connection target, reused by reconnects
#[derive(Debug, Clone, PartialEq, Eq)]
struct Target {
    url: String,
    protocol: Option<String>,
}

/// Transport notification, held back while the transport is being created
#[derive(Debug)]
enum Signal {
    Connected,
    Message(WsMessage),
    Error(String),
    Disconnected(CloseInfo),
}

/// Mutable part of the state machine, guarded by one lock
struct ConnectionInner {
    target: Option<Target>,
    /// Bumped on every open; events from older transports are ignored
    generation: u64,
    /// Set by `close()`, cleared by the next open
    closing_intentionally: bool,
    transport: Option<Arc<dyn Transport>>,
    /// Signals raised by the current generation before its transport was stored
    attaching: Option<Vec<Signal>>,
    reconnect: ReconnectionScheduler,
}

struct Shared {
    config: ConnectionConfig,
    factory: Arc<dyn TransportFactory>,
    /// Written only while `inner` is locked
    state: AtomicConnectionState,
    inner: Mutex<ConnectionInner>,
    dispatcher: EventDispatcher,
    metrics: AtomicMetrics,
}

/// Resilient handle to one logical WebSocket connection
///
/// Owns the connection state machine: validates caller operations,
/// translates transport events into [`ConnectionEvent`]s and, after an
/// unexpected disconnect, arms a retry through its reconnection
/// scheduler.
///
/// Cloning yields another handle to the same connection.
///
/// # Example
/// ```ignore
/// let connection = Connection::builder().tungstenite().build()?;
/// let events = connection.subscribe();
///
/// connection.open("wss://api.example.com/ws", None)?;
/// while let Ok(event) = events.recv() {
///     if event == ConnectionEvent::Opened {
///         connection.send("hello".into())?;
///     }
/// }
/// ```
#[derive(Clone)]
pub struct Connection {
    shared: Arc<Shared>,
}

impl Connection {
    pub(crate) fn new(
        config: ConnectionConfig,
        factory: Arc<dyn TransportFactory>,
        timer: Arc<dyn Timer>,
    ) -> Self {
        let reconnect = ReconnectionScheduler::new(Arc::clone(&config.backoff), timer);
        Self {
            shared: Arc::new(Shared {
                config,
                factory,
                state: AtomicConnectionState::new(ConnectionState::Closed),
                inner: Mutex::new(ConnectionInner {
                    target: None,
                    generation: 0,
                    closing_intentionally: false,
                    transport: None,
                    attaching: None,
                    reconnect,
                }),
                dispatcher: EventDispatcher::new(),
                metrics: AtomicMetrics::new(),
            }),
        }
    }

    /// Start connecting to `url`
    ///
    /// Returns once the transport has been created; the outcome of the
    /// connect arrives later as `Opened` or `Closed`.
    ///
    /// # Errors
    /// * `UnsupportedEnvironment` - the transport factory cannot run here
    /// * `InvalidState` - not CLOSED (double open is a programming error)
    /// * `InvalidUrl` / `Transport` - the transport could not be created;
    ///   the connection stays CLOSED
    pub fn open(&self, url: impl Into<String>, protocol: Option<&str>) -> Result<()> {
        if !self.shared.factory.is_supported() {
            return Err(ResocketError::UnsupportedEnvironment(
                "transport factory is not supported in this environment".to_string(),
            ));
        }

        let target = Target {
            url: url.into(),
            protocol: protocol.map(str::to_string),
        };

        let generation = {
            let mut inner = self.shared.inner.lock();
            let state = self.shared.state.get();
            if state != ConnectionState::Closed {
                return Err(ResocketError::invalid_state("open", state));
            }
            // A caller open supersedes any retry still waiting
            inner.reconnect.cancel_pending();
            self.shared.begin_cycle(&mut inner, target.clone())
        };

        info!("Opening connection to {}", target.url);
        if let Err(e) = self.shared.attach(generation, &target) {
            let mut inner = self.shared.inner.lock();
            if inner.generation == generation
                && self.shared.state.get() == ConnectionState::Connecting
            {
                inner.transport = None;
                inner.attaching = None;
                self.shared.state.set(ConnectionState::Closed);
            }
            return Err(e);
        }
        Ok(())
    }

    /// Send a payload, unchanged
    ///
    /// # Errors
    /// * `InvalidState` - the connection is not OPEN
    /// * `Transport` - the transport refused the payload
    pub fn send(&self, message: WsMessage) -> Result<()> {
        let transport = {
            let inner = self.shared.inner.lock();
            let state = self.shared.state.get();
            match (&inner.transport, state) {
                (Some(transport), ConnectionState::Open) => Arc::clone(transport),
                _ => return Err(ResocketError::invalid_state("send", state)),
            }
        };

        transport.send(message)?;
        self.shared.metrics.increment_sent();
        Ok(())
    }

    /// Close with code 1000 and no reason
    pub fn close(&self) -> Result<()> {
        self.close_with(NORMAL_CLOSURE, "")
    }

    /// Close intentionally; no retry happens afterwards
    ///
    /// No-op when already CLOSED or CLOSING, except that a retry still
    /// waiting to fire is cancelled and none is armed until the next open.
    pub fn close_with(&self, code: u16, reason: &str) -> Result<()> {
        let transport = {
            let mut inner = self.shared.inner.lock();
            inner.reconnect.cancel_pending();
            inner.closing_intentionally = true;

            match self.shared.state.get() {
                ConnectionState::Closed | ConnectionState::Closing => return Ok(()),
                ConnectionState::Connecting | ConnectionState::Open => {}
            }

            self.shared.state.set(ConnectionState::Closing);
            inner.transport.clone()
        };

        info!("Closing connection (code {})", code);
        match transport {
            Some(transport) => transport.close(code, reason),
            None => Ok(()),
        }
    }

    /// Close, cancel any retry, drop the transport and every listener
    ///
    /// The connection ends up CLOSED immediately and ignores anything the
    /// old transport reports afterwards. It can still be opened again.
    pub fn dispose(&self) {
        self.shared.dispatcher.clear();
        if let Err(e) = self.close() {
            debug!("Close during dispose failed: {}", e);
        }

        let mut inner = self.shared.inner.lock();
        inner.reconnect.cancel_pending();
        inner.transport = None;
        inner.attaching = None;
        inner.generation += 1;
        self.shared.state.set(ConnectionState::Closed);
    }

    /// True iff the state is OPEN
    #[inline]
    pub fn is_open(&self) -> bool {
        self.shared.state.is_open()
    }

    #[inline]
    pub fn state(&self) -> ConnectionState {
        self.shared.state.get()
    }

    /// URL of the last open, reused by reconnects
    pub fn url(&self) -> Option<String> {
        self.shared.inner.lock().target.as_ref().map(|t| t.url.clone())
    }

    pub fn protocol(&self) -> Option<String> {
        self.shared
            .inner
            .lock()
            .target
            .as_ref()
            .and_then(|t| t.protocol.clone())
    }

    /// Consecutive retries since the last successful open
    pub fn reconnect_attempt(&self) -> u32 {
        self.shared.inner.lock().reconnect.attempt()
    }

    pub fn has_pending_retry(&self) -> bool {
        self.shared.inner.lock().reconnect.has_pending()
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.shared.config
    }

    pub fn metrics(&self) -> Metrics {
        self.shared.metrics.snapshot(self.shared.state.get())
    }

    pub fn add_listener(&self, listener: impl EventListener) -> ListenerId {
        self.shared.dispatcher.add(Arc::new(listener))
    }

    pub(crate) fn add_shared_listener(&self, listener: Arc<dyn EventListener>) -> ListenerId {
        self.shared.dispatcher.add(listener)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.shared.dispatcher.remove(id)
    }

    /// Receive every subsequent event over a channel
    pub fn subscribe(&self) -> Receiver<ConnectionEvent> {
        self.shared.dispatcher.subscribe().1
    }
}

impl Shared {
    /// Start a new generation in CONNECTING; the previous transport is dropped
    fn begin_cycle(&self, inner: &mut ConnectionInner, target: Target) -> u64 {
        inner.generation += 1;
        inner.target = Some(target);
        inner.closing_intentionally = false;
        inner.transport = None;
        inner.attaching = Some(Vec::new());
        self.state.set(ConnectionState::Connecting);
        inner.generation
    }

    /// Create the transport for `generation`, outside the state lock
    ///
    /// Signals the transport raises before it is stored are replayed
    /// afterwards, in order.
    fn attach(self: &Arc<Self>, generation: u64, target: &Target) -> Result<()> {
        let request = ConnectRequest {
            url: target.url.clone(),
            protocol: target.protocol.clone(),
            binary_mode: self.config.binary_mode,
        };
        let events = TransportEvents {
            generation,
            shared: Arc::downgrade(self),
        };

        let transport = match self.factory.connect(&request, events) {
            Ok(transport) => transport,
            Err(e) => {
                let mut inner = self.inner.lock();
                if inner.generation == generation {
                    inner.attaching = None;
                }
                return Err(e);
            }
        };

        let (superseded, closing) = {
            let mut inner = self.inner.lock();
            if inner.generation == generation {
                inner.transport = Some(Arc::clone(&transport));
                (false, self.state.get() == ConnectionState::Closing)
            } else {
                (true, false)
            }
        };

        if superseded {
            debug!("Transport for generation {} superseded before attach", generation);
            let _ = transport.close(NORMAL_CLOSURE, "superseded");
        } else if closing {
            // close() ran while the transport was being created
            if let Err(e) = transport.close(NORMAL_CLOSURE, "") {
                self.replay(generation);
                return Err(e);
            }
        }
        self.replay(generation);
        Ok(())
    }

    /// Handle signals held back during `attach`
    ///
    /// Signals raised while replaying are queued behind the current batch,
    /// so delivery order matches the order the transport raised them.
    fn replay(self: &Arc<Self>, generation: u64) {
        loop {
            let batch = {
                let mut inner = self.inner.lock();
                if inner.generation != generation {
                    return;
                }
                match inner.attaching.as_mut() {
                    Some(pending) if !pending.is_empty() => std::mem::take(pending),
                    _ => {
                        inner.attaching = None;
                        return;
                    }
                }
            };

            for signal in batch {
                self.handle(generation, signal);
            }
        }
    }

    /// Route a signal, holding it back while the transport is being stored
    fn deliver(self: &Arc<Self>, generation: u64, signal: Signal) {
        {
            let mut inner = self.inner.lock();
            if inner.generation == generation {
                if let Some(pending) = inner.attaching.as_mut() {
                    pending.push(signal);
                    return;
                }
            }
        }
        self.handle(generation, signal);
    }

    fn handle(self: &Arc<Self>, generation: u64, signal: Signal) {
        match signal {
            Signal::Connected => self.on_connected(generation),
            Signal::Message(message) => self.on_message(generation, message),
            Signal::Error(detail) => self.on_error(generation, detail),
            Signal::Disconnected(info) => self.on_disconnected(generation, info),
        }
    }

    fn retry(self: &Arc<Self>, ticket: u64) {
        let (generation, target) = {
            let mut inner = self.inner.lock();
            if !inner.reconnect.claim(ticket) {
                debug!("Ignoring stale reconnect timer (ticket {})", ticket);
                return;
            }
            if self.state.get() != ConnectionState::Closed {
                debug!("Connection no longer closed, skipping reconnect");
                return;
            }
            let Some(target) = inner.target.clone() else {
                return;
            };
            let generation = self.begin_cycle(&mut inner, target.clone());
            (generation, target)
        };

        self.metrics.increment_reconnects();
        info!("Reconnecting to {}", target.url);

        if let Err(e) = self.attach(generation, &target) {
            warn!("Reconnect could not create transport: {}", e);
            self.on_error(generation, e.to_string());
            self.on_disconnected(generation, CloseInfo::abnormal());
        }
    }

    fn arm_retry(self: &Arc<Self>, inner: &mut ConnectionInner) -> Option<ScheduledRetry> {
        let weak = Arc::downgrade(self);
        let scheduled = inner.reconnect.schedule_retry(move |ticket| {
            if let Some(shared) = weak.upgrade() {
                shared.retry(ticket);
            }
        });

        match scheduled {
            Some(retry) => info!(
                "Reconnecting in {:?} (attempt {})",
                retry.delay, retry.attempt
            ),
            None => warn!(
                "Reconnection strategy exhausted after {} attempts, stopping",
                inner.reconnect.attempt()
            ),
        }
        scheduled
    }

    fn on_connected(&self, generation: u64) {
        {
            let mut inner = self.inner.lock();
            if inner.generation != generation {
                debug!("Ignoring connect from stale generation {}", generation);
                return;
            }
            let state = self.state.get();
            if state != ConnectionState::Connecting {
                debug!("Ignoring connect while {}", state);
                return;
            }
            self.state.set(ConnectionState::Open);
            inner.reconnect.reset();
        }

        info!("Connection open");
        self.dispatcher.dispatch(&ConnectionEvent::Opened);
    }

    fn on_message(&self, generation: u64, message: WsMessage) {
        {
            let inner = self.inner.lock();
            if inner.generation != generation {
                return;
            }
            match self.state.get() {
                ConnectionState::Open | ConnectionState::Connecting => {}
                state => {
                    debug!("Dropping message received while {}", state);
                    return;
                }
            }
        }

        self.metrics.increment_received();
        self.dispatcher.dispatch(&ConnectionEvent::Message(message));
    }

    fn on_error(&self, generation: u64, detail: String) {
        {
            let inner = self.inner.lock();
            if inner.generation != generation || self.state.get() == ConnectionState::Closed {
                debug!("Ignoring error from finished transport: {}", detail);
                return;
            }
        }

        warn!("Transport error: {}", detail);
        self.dispatcher.dispatch(&ConnectionEvent::Error(detail));
    }

    fn on_disconnected(self: &Arc<Self>, generation: u64, info: CloseInfo) {
        {
            let inner = self.inner.lock();
            if inner.generation != generation || self.state.get() == ConnectionState::Closed {
                debug!("Ignoring duplicate or stale disconnect");
                return;
            }
            self.state.set(ConnectionState::Closed);
        }

        info!(
            "Connection closed (clean: {}, code: {:?})",
            info.was_clean, info.code
        );
        self.dispatcher.dispatch(&ConnectionEvent::Closed(info));

        // Armed only after Closed is delivered, so the next cycle cannot
        // overtake it. A Closed listener may already have reopened or closed.
        let retry = {
            let mut inner = self.inner.lock();
            let wanted = inner.generation == generation
                && self.state.get() == ConnectionState::Closed
                && !inner.closing_intentionally
                && self.config.auto_reconnect;
            if wanted {
                self.arm_retry(&mut inner)
            } else {
                None
            }
        };

        if let Some(ScheduledRetry { attempt, delay }) = retry {
            self.dispatcher
                .dispatch(&ConnectionEvent::Reconnecting { attempt, delay });
        }
    }
}

/// Event sink handed to one transport instance
///
/// Bound to the generation that created it: once the connection has moved
/// on to a newer transport, every call on an older handle is ignored.
/// Holds only a weak reference, so a transport cannot keep its
/// connection alive.
#[derive(Clone)]
pub struct TransportEvents {
    generation: u64,
    shared: Weak<Shared>,
}

impl TransportEvents {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The socket finished connecting
    pub fn connected(&self) {
        self.deliver(Signal::Connected);
    }

    /// A payload arrived
    pub fn message(&self, message: WsMessage) {
        self.deliver(Signal::Message(message));
    }

    /// The socket reported an error; `disconnected` should follow
    pub fn error(&self, detail: impl Into<String>) {
        self.deliver(Signal::Error(detail.into()));
    }

    /// The socket is closed
    pub fn disconnected(&self, info: CloseInfo) {
        self.deliver(Signal::Disconnected(info));
    }

    fn deliver(&self, signal: Signal) {
        if let Some(shared) = self.shared.upgrade() {
            shared.deliver(self.generation, signal);
        }
    }
}
