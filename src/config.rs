use crate::cli::{Cli, switch};
use crate::error::MonitorError;
use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_LANDMARK: &str = "8.8.8.8";
pub const DEFAULT_IFACE: &str = "en0";
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(900);

/// On-disk settings. Durations are in seconds.
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub landmark: Option<String>,
    pub iface: Option<String>,
    pub interval: Option<f64>,
    pub timeout: Option<f64>,
    pub debounce: Option<u32>,
    pub live: Option<bool>,
    pub output: Option<PathBuf>,
    pub verbose: Option<bool>,
}

pub struct ConfigManager {
    config_path: Option<PathBuf>,
    pub config: Config,
}

impl ConfigManager {
    /// Loads `explicit` if given (it must exist), otherwise the default
    /// location if present. A missing default file yields an empty config.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let (config_path, required) = match explicit {
            Some(path) => (Some(path.to_path_buf()), true),
            None => (default_config_path(), false),
        };

        let config = match config_path.as_deref() {
            Some(path) if path.exists() => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                toml::from_str(&content).map_err(|e| MonitorError::Config {
                    path: path.to_path_buf(),
                    reason: e.message().to_string(),
                })?
            }
            Some(path) if required => {
                return Err(MonitorError::Config {
                    path: path.to_path_buf(),
                    reason: "file not found".into(),
                }
                .into());
            }
            _ => Config::default(),
        };

        Ok(Self {
            config_path,
            config,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".config").join("ping-monitor").join("config.toml"))
}

/// Effective settings after merging CLI, config file and defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub landmark: String,
    pub iface: String,
    pub interval: Duration,
    pub timeout: Duration,
    pub debounce: u32,
    pub live: bool,
    pub output: Option<PathBuf>,
    pub verbose: bool,
}

impl Settings {
    pub fn resolve(cli: &Cli, file: &Config) -> Result<Self> {
        let interval = match (cli.interval, file.interval) {
            (Some(d), _) => d,
            (None, Some(secs)) => seconds(secs, "interval")?,
            (None, None) => DEFAULT_INTERVAL,
        };
        let timeout = match (cli.timeout, file.timeout) {
            (Some(d), _) => d,
            (None, Some(secs)) => seconds(secs, "timeout")?,
            (None, None) => default_timeout(interval),
        };

        let settings = Self {
            landmark: cli
                .landmark
                .clone()
                .or_else(|| file.landmark.clone())
                .unwrap_or_else(|| DEFAULT_LANDMARK.to_string()),
            iface: cli
                .iface
                .clone()
                .or_else(|| file.iface.clone())
                .unwrap_or_else(|| DEFAULT_IFACE.to_string()),
            interval,
            timeout,
            debounce: cli.debounce.or(file.debounce).unwrap_or(1),
            live: switch(cli.live, cli.no_live, file.live),
            output: cli.output.clone().or_else(|| file.output.clone()),
            verbose: switch(cli.verbose, cli.no_verbose, file.verbose),
        };
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), MonitorError> {
        if self.timeout.is_zero() || self.timeout >= self.interval {
            return Err(MonitorError::InvalidTiming {
                timeout: self.timeout,
                interval: self.interval,
            });
        }
        if self.debounce == 0 {
            return Err(MonitorError::InvalidDebounce);
        }
        Ok(())
    }
}

/// The timeout used when none is configured: 0.9 s, or 90% of a shorter
/// interval.
fn default_timeout(interval: Duration) -> Duration {
    DEFAULT_TIMEOUT.min(interval.mul_f64(0.9))
}

fn seconds(value: f64, field: &str) -> Result<Duration> {
    Duration::try_from_secs_f64(value).map_err(|e| anyhow!("invalid {} {}: {}", field, value, e))
}
