//! Resocket demo - Main Library
//!
//! Shared pieces for the demo binaries built on the `resocket` client.
//!
//! ## Architecture
//!
//! - **bin_common**: Common utilities for binary executables (env settings, logging)
//! - **resocket**: Resilient WebSocket client (re-exported from workspace)
//!
//! ## Usage in Binaries
//!
//! ```rust,ignore
//! use resocket_demo::bin_common::{init_tracing, DemoSettings};
//! use resocket_demo::resocket::Connection;
//! ```

// Re-export workspace libraries for convenience
pub use resocket;

// Binary common utilities
pub mod bin_common {
    //! Common utilities for binary executables

    pub mod cli;
    pub mod logging;

    pub use cli::{parse_args, DemoSettings, EnvVar};
    pub use logging::{init_tracing, init_tracing_with_level};
}
