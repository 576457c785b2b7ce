use super::{Detector, Record, Sample};
use chrono::{DateTime, Utc};

/// Holds back state changes until `threshold` consecutive samples agree.
///
/// Held samples are replayed into the detector once confirmed, so the
/// record boundaries land on the first sample of the run rather than the
/// one that confirmed it. A threshold of 1 passes everything straight
/// through.
#[derive(Debug)]
pub struct Debounced {
    inner: Detector,
    threshold: usize,
    held: Vec<Sample>,
}

impl Debounced {
    pub fn new(inner: Detector, threshold: u32) -> Self {
        Self {
            inner,
            threshold: threshold.max(1) as usize,
            held: Vec::new(),
        }
    }

    pub fn effective_up(&self) -> Option<bool> {
        self.inner.effective_up()
    }

    pub fn open_outage_start(&self) -> Option<DateTime<Utc>> {
        self.inner.open_outage_start()
    }

    pub fn observe(&mut self, sample: &Sample) -> Option<Record> {
        match self.inner.effective_up() {
            None => return self.inner.observe(sample),
            Some(current) if current == sample.effective_up() => {
                self.held.clear();
                return self.inner.observe(sample);
            }
            Some(_) => self.held.push(*sample),
        }

        if self.held.len() < self.threshold {
            return None;
        }
        // only the first replayed sample can flip state
        let mut closed = None;
        for held in self.held.drain(..) {
            if let Some(record) = self.inner.observe(&held) {
                closed = Some(record);
            }
        }
        closed
    }

    /// Unconfirmed samples are dropped; the detector's current state is what
    /// gets closed.
    pub fn finish(&mut self, at: DateTime<Utc>) -> Option<Record> {
        self.held.clear();
        self.inner.finish(at)
    }
}
