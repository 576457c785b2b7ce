//! Outage tracking: samples in, interval records out.

pub mod debounce;
pub mod detector;
pub mod stats;

use chrono::{DateTime, TimeDelta, Utc};
use std::time::Duration;

pub use debounce::Debounced;
pub use detector::Detector;
pub use stats::RttStats;

/// Both signals taken at one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub at: DateTime<Utc>,
    pub host_reachable: bool,
    pub interface_up: bool,
    pub rtt: Option<Duration>,
}

impl Sample {
    pub fn new(at: DateTime<Utc>, host_reachable: bool, interface_up: bool) -> Self {
        Self {
            at,
            host_reachable,
            interface_up,
            rtt: None,
        }
    }

    pub fn with_rtt(mut self, rtt: Option<Duration>) -> Self {
        self.rtt = rtt;
        self
    }

    /// The interface gates the landmark: a reply over some other route
    /// still counts as down.
    pub fn effective_up(&self) -> bool {
        self.host_reachable && self.interface_up
    }
}

/// A stretch of lost connectivity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Outage {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Still ongoing when monitoring stopped; `end` is the shutdown time.
    pub open_at_shutdown: bool,
}

impl Outage {
    pub fn duration(&self) -> TimeDelta {
        self.end - self.start
    }
}

/// A stretch of connectivity, with round-trip statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct LivePeriod {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub rtt: RttStats,
    pub open_at_shutdown: bool,
}

impl LivePeriod {
    pub fn duration(&self) -> TimeDelta {
        self.end - self.start
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Outage(Outage),
    Live(LivePeriod),
}

#[cfg(test)]
impl Record {
    pub fn as_outage(&self) -> Option<&Outage> {
        match self {
            Record::Outage(outage) => Some(outage),
            Record::Live(_) => None,
        }
    }
}
