use std::time::Duration;

/// Running round-trip statistics, in milliseconds. Welford's update keeps
/// memory constant over arbitrarily long live periods.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RttStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RttStats {
    pub fn record(&mut self, rtt: Duration) {
        let ms = rtt.as_secs_f64() * 1000.0;
        if self.count == 0 {
            self.min = ms;
            self.max = ms;
        } else {
            self.min = self.min.min(ms);
            self.max = self.max.max(ms);
        }
        self.count += 1;
        let delta = ms - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (ms - self.mean);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Sample standard deviation; zero below two samples.
    pub fn stdev(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            (self.m2 / (self.count - 1) as f64).sqrt()
        }
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_empty() {
        let stats = RttStats::default();
        assert_eq!(stats.count(), 0);
        assert_eq!(stats.mean(), 0.0);
        assert_eq!(stats.stdev(), 0.0);
        assert_eq!(stats.min(), 0.0);
        assert_eq!(stats.max(), 0.0);
    }

    #[test]
    fn test_single_sample() {
        let mut stats = RttStats::default();
        stats.record(Duration::from_millis(12));
        assert_eq!(stats.count(), 1);
        assert!(close(stats.mean(), 12.0));
        assert_eq!(stats.stdev(), 0.0);
        assert!(close(stats.min(), 12.0));
        assert!(close(stats.max(), 12.0));
    }

    #[test]
    fn test_several_samples() {
        let mut stats = RttStats::default();
        for ms in [10, 20, 30, 40] {
            stats.record(Duration::from_millis(ms));
        }
        assert_eq!(stats.count(), 4);
        assert!(close(stats.mean(), 25.0));
        // sample variance of 10,20,30,40 is 500/3
        assert!(close(stats.stdev(), (500.0f64 / 3.0).sqrt()));
        assert!(close(stats.min(), 10.0));
        assert!(close(stats.max(), 40.0));
    }
}
