use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Startup errors. Anything in here stops the process before the first tick.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("interface {0} does not exist")]
    InterfaceNotFound(String),

    #[error("cannot resolve landmark {host}: {reason}")]
    Unresolvable { host: String, reason: String },

    #[error("probe timeout ({timeout:?}) must be shorter than the poll interval ({interval:?})")]
    InvalidTiming { timeout: Duration, interval: Duration },

    #[error("debounce must be at least 1 sample")]
    InvalidDebounce,

    #[error("invalid config file {path}: {reason}")]
    Config { path: PathBuf, reason: String },

    #[error("cannot open output {path}: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
