use crate::core::connection_state::ConnectionState;
use thiserror::Error;

/// Main error type for resocket
///
/// Only programmer errors and synchronous setup failures are returned as
/// errors. Network failures are delivered as [`ConnectionEvent`]s instead.
///
/// [`ConnectionEvent`]: crate::traits::ConnectionEvent
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResocketError {
    /// Operation is not legal in the current connection state
    #[error("Invalid state: cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: ConnectionState,
    },

    /// The transport capability is not available in this environment
    #[error("Unsupported environment: {0}")]
    UnsupportedEnvironment(String),

    /// The target URL could not be turned into a connection request
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The transport rejected an operation
    #[error("Transport error: {0}")]
    Transport(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ResocketError {
    pub(crate) fn invalid_state(operation: &'static str, state: ConnectionState) -> Self {
        Self::InvalidState { operation, state }
    }

    /// True for errors that signal caller misuse rather than a failed resource
    pub fn is_programmer_error(&self) -> bool {
        matches!(
            self,
            ResocketError::InvalidState { .. } | ResocketError::UnsupportedEnvironment(_)
        )
    }
}

/// Result type for resocket operations
pub type Result<T> = std::result::Result<T, ResocketError>;
