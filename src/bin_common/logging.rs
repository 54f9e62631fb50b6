//! Logging initialization

use tracing_subscriber::EnvFilter;

/// Initialize tracing, honouring `RUST_LOG` and defaulting to `info`
pub fn init_tracing() {
    init_tracing_with_level("info");
}

/// Initialize tracing with a fallback filter used when `RUST_LOG` is unset
pub fn init_tracing_with_level(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .init();
}
