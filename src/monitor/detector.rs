use super::{LivePeriod, Outage, Record, RttStats, Sample};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Default, PartialEq)]
enum State {
    /// No sample seen yet, or monitoring finished.
    #[default]
    Unknown,
    Up {
        since: DateTime<Utc>,
        rtt: RttStats,
    },
    Down {
        since: DateTime<Utc>,
    },
}

/// Turns a stream of samples into outage and live-period records.
///
/// A single sample is enough to flip state; wrap in
/// [`Debounced`](super::Debounced) to require more. The first sample decides
/// the initial state, so a monitor started while offline opens an outage
/// right away.
#[derive(Debug, Default)]
pub struct Detector {
    state: State,
}

impl Detector {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` until the first sample.
    pub fn effective_up(&self) -> Option<bool> {
        match self.state {
            State::Unknown => None,
            State::Up { .. } => Some(true),
            State::Down { .. } => Some(false),
        }
    }

    pub fn open_outage_start(&self) -> Option<DateTime<Utc>> {
        match self.state {
            State::Down { since } => Some(since),
            _ => None,
        }
    }

    /// Feeds one sample. Returns the record closed by this sample, if any:
    /// an outage on a down-to-up flip, a live period on up-to-down.
    pub fn observe(&mut self, sample: &Sample) -> Option<Record> {
        let (next, record) = match (std::mem::take(&mut self.state), sample.effective_up()) {
            (State::Unknown, true) => (up_since(sample), None),
            (State::Unknown, false) => (State::Down { since: sample.at }, None),
            (State::Up { since, mut rtt }, true) => {
                if let Some(r) = sample.rtt {
                    rtt.record(r);
                }
                (State::Up { since, rtt }, None)
            }
            (State::Up { since, rtt }, false) => (
                State::Down { since: sample.at },
                Some(Record::Live(LivePeriod {
                    start: since,
                    end: sample.at,
                    rtt,
                    open_at_shutdown: false,
                })),
            ),
            (State::Down { since }, true) => (
                up_since(sample),
                Some(Record::Outage(Outage {
                    start: since,
                    end: sample.at,
                    open_at_shutdown: false,
                })),
            ),
            (State::Down { since }, false) => (State::Down { since }, None),
        };
        self.state = next;
        record
    }

    /// Closes whatever is open at `at` and returns to the unknown state.
    pub fn finish(&mut self, at: DateTime<Utc>) -> Option<Record> {
        match std::mem::take(&mut self.state) {
            State::Unknown => None,
            State::Down { since } => Some(Record::Outage(Outage {
                start: since,
                end: at,
                open_at_shutdown: true,
            })),
            State::Up { since, rtt } => Some(Record::Live(LivePeriod {
                start: since,
                end: at,
                rtt,
                open_at_shutdown: true,
            })),
        }
    }
}

fn up_since(sample: &Sample) -> State {
    let mut rtt = RttStats::default();
    if let Some(r) = sample.rtt {
        rtt.record(r);
    }
    State::Up {
        since: sample.at,
        rtt,
    }
}
