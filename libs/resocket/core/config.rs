use crate::traits::*;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Immutable connection configuration
///
/// Built by [`ConnectionBuilder`](crate::core::builder::ConnectionBuilder)
/// and fixed for the life of the connection.
#[derive(Clone)]
pub struct ConnectionConfig {
    /// Retry after unexpected disconnects
    pub(crate) auto_reconnect: bool,

    /// Delay schedule for retries
    pub(crate) backoff: Arc<dyn BackoffStrategy>,

    /// Deliver every inbound data frame as binary
    pub(crate) binary_mode: bool,
}

impl ConnectionConfig {
    pub fn auto_reconnect(&self) -> bool {
        self.auto_reconnect
    }

    pub fn backoff(&self) -> &Arc<dyn BackoffStrategy> {
        &self.backoff
    }

    pub fn binary_mode(&self) -> bool {
        self.binary_mode
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            auto_reconnect: true,
            backoff: Arc::new(ExponentialBackoff::default()),
            binary_mode: false,
        }
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("auto_reconnect", &self.auto_reconnect)
            .field("binary_mode", &self.binary_mode)
            .finish_non_exhaustive()
    }
}

/// Serializable backoff selection
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum BackoffOptions {
    Exponential {
        #[serde(default = "default_initial_ms")]
        initial_ms: u64,
        #[serde(default = "default_max_ms")]
        max_ms: u64,
        #[serde(default)]
        max_attempts: Option<u32>,
    },
    Linear {
        initial_ms: u64,
        step_ms: u64,
        #[serde(default)]
        max_ms: Option<u64>,
        #[serde(default)]
        max_attempts: Option<u32>,
    },
    Fixed {
        delay_ms: u64,
        #[serde(default)]
        max_attempts: Option<u32>,
    },
    Never,
}

fn default_initial_ms() -> u64 {
    1_000
}

fn default_max_ms() -> u64 {
    60_000
}

fn default_true() -> bool {
    true
}

impl Default for BackoffOptions {
    fn default() -> Self {
        BackoffOptions::Exponential {
            initial_ms: default_initial_ms(),
            max_ms: default_max_ms(),
            max_attempts: None,
        }
    }
}

impl BackoffOptions {
    pub fn into_strategy(self) -> Arc<dyn BackoffStrategy> {
        match self {
            BackoffOptions::Exponential {
                initial_ms,
                max_ms,
                max_attempts,
            } => Arc::new(ExponentialBackoff::new(
                Duration::from_millis(initial_ms),
                Duration::from_millis(max_ms),
                max_attempts,
            )),
            BackoffOptions::Linear {
                initial_ms,
                step_ms,
                max_ms,
                max_attempts,
            } => {
                let mut strategy = LinearBackoff::new(
                    Duration::from_millis(initial_ms),
                    Duration::from_millis(step_ms),
                );
                if let Some(max_ms) = max_ms {
                    strategy = strategy.with_max_delay(Duration::from_millis(max_ms));
                }
                if let Some(max_attempts) = max_attempts {
                    strategy = strategy.with_max_attempts(max_attempts);
                }
                Arc::new(strategy)
            }
            BackoffOptions::Fixed {
                delay_ms,
                max_attempts,
            } => Arc::new(FixedDelay::new(Duration::from_millis(delay_ms), max_attempts)),
            BackoffOptions::Never => Arc::new(NeverReconnect),
        }
    }
}

/// Connection options in serializable form
///
/// Unknown keys are rejected, so a misspelled option fails loudly instead
/// of silently falling back to a default.
///
/// # Example
/// ```ignore
/// let options = ConnectionOptions::from_json(r#"{
///     "auto_reconnect": true,
///     "backoff": { "kind": "linear", "initial_ms": 1000, "step_ms": 1000 }
/// }"#)?;
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionOptions {
    #[serde(default = "default_true")]
    pub auto_reconnect: bool,
    #[serde(default)]
    pub backoff: BackoffOptions,
    #[serde(default)]
    pub binary_mode: bool,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            auto_reconnect: true,
            backoff: BackoffOptions::default(),
            binary_mode: false,
        }
    }
}

impl ConnectionOptions {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| ResocketError::Configuration(e.to_string()))
    }

    pub fn into_config(self) -> ConnectionConfig {
        ConnectionConfig {
            auto_reconnect: self.auto_reconnect,
            backoff: self.backoff.into_strategy(),
            binary_mode: self.binary_mode,
        }
    }
}
