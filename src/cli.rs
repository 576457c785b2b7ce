use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Options left unset fall back to the config file, then to built-in defaults.
#[derive(Parser, Debug, Clone, Default)]
#[command(author, version, about = "Monitor connectivity to a landmark host and report outages.", long_about = None)]
pub struct Cli {
    /// Host probed with ICMP echo [default: 8.8.8.8]
    #[arg(short = 'l', long)]
    pub landmark: Option<String>,

    /// Interface whose link state gates connectivity [default: en0]
    #[arg(short = 'i', long = "iface")]
    pub iface: Option<String>,

    /// Time to wait for an echo reply, in seconds [default: 0.9, capped at 90% of the period]
    #[arg(short = 't', long, value_parser = parse_duration)]
    pub timeout: Option<Duration>,

    /// Wait N seconds between samples [default: 1.0]
    #[arg(short = 'p', long = "period", value_parser = parse_duration)]
    pub interval: Option<Duration>,

    /// Consecutive samples required before accepting a state change [default: 1]
    #[arg(short = 'd', long)]
    pub debounce: Option<u32>,

    /// Also report periods of connectivity, with round-trip statistics.
    #[arg(short = 'L', long, overrides_with = "no_live")]
    pub live: bool,

    /// Do not report periods of connectivity, even if the config file asks for it.
    #[arg(long, overrides_with = "live")]
    pub no_live: bool,

    /// Append records to this file instead of stdout.
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    /// Read settings from this file instead of ~/.config/ping-monitor/config.toml
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Print every sample.
    #[arg(short = 'v', long, overrides_with = "no_verbose")]
    pub verbose: bool,

    /// Only print records, even if the config file enables verbose output.
    #[arg(long, overrides_with = "verbose")]
    pub no_verbose: bool,
}

/// Resolves an on/off flag pair. The last one given wins; neither given
/// defers to `fallback`.
pub fn switch(on: bool, off: bool, fallback: Option<bool>) -> bool {
    match (on, off) {
        (true, _) => true,
        (_, true) => false,
        _ => fallback.unwrap_or(false),
    }
}

fn parse_duration(arg: &str) -> Result<Duration, String> {
    let seconds = arg.parse::<f64>().map_err(|e| e.to_string())?;
    Duration::try_from_secs_f64(seconds).map_err(|e| e.to_string())
}
