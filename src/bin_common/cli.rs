//! CLI utilities for binaries
//!
//! Handles environment variables for the demo executables.

use anyhow::{Context, Result};
use resocket::ConnectionOptions;

/// Environment variable consumed by the demo binaries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvVar {
    /// WebSocket URL to open
    Url,
    /// Optional subprotocol
    Protocol,
    /// Optional JSON `ConnectionOptions`
    Options,
    /// Greeting sent after the connection opens
    Greeting,
}

impl EnvVar {
    /// Get the environment variable name
    pub fn name(&self) -> &'static str {
        match self {
            EnvVar::Url => "RESOCKET_URL",
            EnvVar::Protocol => "RESOCKET_PROTOCOL",
            EnvVar::Options => "RESOCKET_OPTIONS",
            EnvVar::Greeting => "RESOCKET_GREETING",
        }
    }

    /// Value used when the variable is unset
    pub fn default_value(&self) -> Option<&'static str> {
        match self {
            EnvVar::Url => Some("wss://echo.websocket.org"),
            EnvVar::Greeting => Some("hello from resocket"),
            EnvVar::Protocol | EnvVar::Options => None,
        }
    }
}

/// Settings for the demo binaries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoSettings {
    pub url: String,
    pub protocol: Option<String>,
    pub options: ConnectionOptions,
    pub greeting: String,
}

impl DemoSettings {
    /// Read settings from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read settings through an arbitrary variable lookup
    ///
    /// Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: EnvVar| {
            lookup(var.name())
                .filter(|value| !value.trim().is_empty())
                .or_else(|| var.default_value().map(str::to_string))
        };

        let options = match get(EnvVar::Options) {
            Some(json) => ConnectionOptions::from_json(&json)
                .with_context(|| format!("invalid {}", EnvVar::Options.name()))?,
            None => ConnectionOptions::default(),
        };

        Ok(Self {
            url: get(EnvVar::Url).unwrap_or_default(),
            protocol: get(EnvVar::Protocol),
            options,
            greeting: get(EnvVar::Greeting).unwrap_or_default(),
        })
    }

    /// Override settings from positional arguments: `[url] [protocol]`
    pub fn with_args(mut self, args: &[String]) -> Self {
        if let Some(url) = args.first() {
            self.url = url.clone();
        }
        if let Some(protocol) = args.get(1) {
            self.protocol = Some(protocol.clone());
        }
        self
    }
}

/// Parse command line arguments for a binary
///
/// Returns a vector of arguments (excluding the program name)
pub fn parse_args() -> Vec<String> {
    std::env::args().skip(1).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_var_names() {
        assert_eq!(EnvVar::Url.name(), "RESOCKET_URL");
        assert_eq!(EnvVar::Protocol.name(), "RESOCKET_PROTOCOL");
        assert_eq!(EnvVar::Options.name(), "RESOCKET_OPTIONS");
    }

    #[test]
    fn test_defaults_when_unset() {
        let settings = DemoSettings::from_lookup(|_| None).unwrap();
        assert_eq!(settings.url, "wss://echo.websocket.org");
        assert_eq!(settings.protocol, None);
        assert_eq!(settings.options, ConnectionOptions::default());
    }
}
