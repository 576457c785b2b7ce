//! Diagnostics go to stderr through `tracing`; records never do.

use tracing_subscriber::{fmt, EnvFilter};

/// `RUST_LOG` wins over the verbosity flag when set.
pub fn init(verbose: bool) {
    let default_level = if verbose { "ping_monitor=debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
