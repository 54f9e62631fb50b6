pub mod states;

use crate::config::{ConnectionConfig, ConnectionOptions};
use crate::connection::Connection;
use crate::timer::TokioTimer;
use crate::traits::*;
use crate::tungstenite::TungsteniteFactory;
use states::*;
use std::sync::Arc;

/// Type-state builder for [`Connection`]
///
/// A transport factory must be chosen before the connection can be
/// built. Everything else has a default: auto-reconnect on, exponential
/// backoff (1s doubling to a 60s cap), text mode, tokio timer.
pub struct ConnectionBuilder<T>
where
    T: TransportState,
{
    _state: TypeState<T>,
    factory: Option<Arc<dyn TransportFactory>>,
    timer: Option<Arc<dyn Timer>>,
    auto_reconnect: bool,
    backoff: Option<Arc<dyn BackoffStrategy>>,
    binary_mode: bool,
    listeners: Vec<Arc<dyn EventListener>>,
}

impl ConnectionBuilder<NoTransport> {
    /// Create a new builder instance
    pub fn new() -> Self {
        Self {
            _state: TypeState::new(),
            factory: None,
            timer: None,
            auto_reconnect: true,
            backoff: None,
            binary_mode: false,
            listeners: Vec::new(),
        }
    }

    /// Use a custom transport factory
    pub fn transport(
        self,
        factory: impl TransportFactory + 'static,
    ) -> ConnectionBuilder<HasTransport> {
        self.with_factory(Arc::new(factory))
    }

    /// Use the `tokio-tungstenite` transport
    pub fn tungstenite(self) -> ConnectionBuilder<HasTransport> {
        self.with_factory(Arc::new(TungsteniteFactory::new()))
    }

    fn with_factory(self, factory: Arc<dyn TransportFactory>) -> ConnectionBuilder<HasTransport> {
        ConnectionBuilder {
            _state: TypeState::new(),
            factory: Some(factory),
            timer: self.timer,
            auto_reconnect: self.auto_reconnect,
            backoff: self.backoff,
            binary_mode: self.binary_mode,
            listeners: self.listeners,
        }
    }
}

impl Default for ConnectionBuilder<NoTransport> {
    fn default() -> Self {
        Self::new()
    }
}

// Optional configuration methods
impl<T> ConnectionBuilder<T>
where
    T: TransportState,
{
    /// Retry after unexpected disconnects (default: true)
    pub fn auto_reconnect(mut self, enabled: bool) -> Self {
        self.auto_reconnect = enabled;
        self
    }

    /// Delay schedule for retries
    ///
    /// Accepts any strategy, including closures:
    /// ```ignore
    /// .backoff(|attempt: u32| Some(Duration::from_millis(attempt as u64 * 1000 + 1000)))
    /// ```
    pub fn backoff(mut self, strategy: impl BackoffStrategy + 'static) -> Self {
        self.backoff = Some(Arc::new(strategy));
        self
    }

    /// Deliver every inbound data frame as binary (default: false)
    pub fn binary_mode(mut self, enabled: bool) -> Self {
        self.binary_mode = enabled;
        self
    }

    /// Apply deserialized options, replacing the three settings above
    pub fn options(mut self, options: ConnectionOptions) -> Self {
        let config = options.into_config();
        self.auto_reconnect = config.auto_reconnect;
        self.backoff = Some(config.backoff);
        self.binary_mode = config.binary_mode;
        self
    }

    /// Timer used for retry delays (default: [`TokioTimer`] on the current runtime)
    pub fn timer(mut self, timer: impl Timer + 'static) -> Self {
        self.timer = Some(Arc::new(timer));
        self
    }

    /// Register a listener before the connection exists
    pub fn listener(mut self, listener: impl EventListener) -> Self {
        self.listeners.push(Arc::new(listener));
        self
    }
}

// Build method - only available once a transport is set
impl ConnectionBuilder<HasTransport> {
    /// Build the connection, CLOSED until `open` is called
    ///
    /// # Errors
    /// * `UnsupportedEnvironment` - no timer was given and there is no
    ///   tokio runtime to create the default one
    pub fn build(self) -> Result<Connection> {
        let factory = self
            .factory
            .ok_or_else(|| ResocketError::Configuration("transport factory not set".to_string()))?;

        let timer = match self.timer {
            Some(timer) => timer,
            None => Arc::new(TokioTimer::from_current()?),
        };

        let mut config = ConnectionConfig {
            auto_reconnect: self.auto_reconnect,
            binary_mode: self.binary_mode,
            ..ConnectionConfig::default()
        };
        if let Some(backoff) = self.backoff {
            config.backoff = backoff;
        }

        let connection = Connection::new(config, factory, timer);
        for listener in self.listeners {
            connection.add_shared_listener(listener);
        }
        Ok(connection)
    }
}

impl Connection {
    /// Start building a connection
    pub fn builder() -> ConnectionBuilder<NoTransport> {
        ConnectionBuilder::new()
    }
}
