use crate::error::MonitorError;
use crate::monitor::{LivePeriod, Outage, Record, Sample};
use crate::utils::{format_duration, format_timestamp};
use colored::Colorize;
use std::fs::OpenOptions;
use std::io::{self, IsTerminal, Write};
use std::path::Path;

const OPEN_MARK: &str = "(open at shutdown)";

/// Writes records, and in verbose mode every sample, one line each.
///
/// Plain mode prints outages only, as `<start> <HH:MM:SS>`. With live
/// reporting, lines are tagged `OFF`/`ON` and connected periods carry
/// `<count> <mean> <stdev> <min> <max>` round-trip times in ms.
pub struct Reporter<W: Write> {
    out: W,
    verbose: bool,
    live: bool,
    color: bool,
}

impl Reporter<Box<dyn Write + Send>> {
    pub fn stdout(verbose: bool, live: bool) -> Self {
        let color = io::stdout().is_terminal();
        Self::new(Box::new(io::stdout()), verbose, live, color)
    }

    /// Appends to `path`, creating it if needed.
    pub fn append_to(path: &Path, verbose: bool, live: bool) -> Result<Self, MonitorError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| MonitorError::Output {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self::new(Box::new(file), verbose, live, false))
    }
}

impl<W: Write> Reporter<W> {
    pub fn new(out: W, verbose: bool, live: bool, color: bool) -> Self {
        Self {
            out,
            verbose,
            live,
            color,
        }
    }

    pub fn sample(&mut self, sample: &Sample) -> io::Result<()> {
        if !self.verbose {
            return Ok(());
        }
        let line = self.sample_line(sample);
        self.emit(&line)
    }

    pub fn record(&mut self, record: &Record) -> io::Result<()> {
        let line = match record {
            Record::Outage(outage) => self.outage_line(outage),
            Record::Live(period) if self.live => self.live_line(period),
            Record::Live(_) => return Ok(()),
        };
        self.emit(&line)
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, line: &str) -> io::Result<()> {
        writeln!(self.out, "{}", line)?;
        self.out.flush()
    }

    fn sample_line(&self, sample: &Sample) -> String {
        let effective = sample.effective_up().to_string();
        let effective = match (self.color, sample.effective_up()) {
            (false, _) => effective,
            (true, true) => effective.green().to_string(),
            (true, false) => effective.red().to_string(),
        };
        let mut line = format!(
            "{} host_reachable={} interface_up={} effective_up={}",
            format_timestamp(&sample.at),
            sample.host_reachable,
            sample.interface_up,
            effective
        );
        if let Some(rtt) = sample.rtt {
            line.push_str(&format!(" rtt={:.2}ms", rtt.as_secs_f64() * 1000.0));
        }
        line
    }

    fn outage_line(&self, outage: &Outage) -> String {
        let mut line = format!(
            "{} {}",
            format_timestamp(&outage.start),
            format_duration(outage.duration())
        );
        if self.live {
            line.insert_str(0, "OFF ");
        }
        if outage.open_at_shutdown {
            line.push(' ');
            line.push_str(&self.open_mark());
        }
        if self.color {
            line = line.red().to_string();
        }
        line
    }

    fn live_line(&self, period: &LivePeriod) -> String {
        let rtt = &period.rtt;
        let mut line = format!(
            "ON {} {} {} {:.2} {:.2} {:.2} {:.2}",
            format_timestamp(&period.start),
            format_duration(period.duration()),
            rtt.count(),
            rtt.mean(),
            rtt.stdev(),
            rtt.min(),
            rtt.max()
        );
        if period.open_at_shutdown {
            line.push(' ');
            line.push_str(&self.open_mark());
        }
        line
    }

    fn open_mark(&self) -> String {
        if self.color {
            OPEN_MARK.yellow().to_string()
        } else {
            OPEN_MARK.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::RttStats;
    use chrono::{DateTime, TimeDelta, TimeZone, Utc};
    use std::time::Duration;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap() + TimeDelta::seconds(secs)
    }

    fn output(reporter: Reporter<Vec<u8>>) -> String {
        String::from_utf8(reporter.into_inner()).unwrap()
    }

    fn outage(start: i64, end: i64, open: bool) -> Record {
        Record::Outage(Outage {
            start: at(start),
            end: at(end),
            open_at_shutdown: open,
        })
    }

    #[test]
    fn test_plain_outage_line() {
        let mut reporter = Reporter::new(Vec::new(), false, false, false);
        reporter.record(&outage(0, 15, false)).unwrap();
        reporter.record(&outage(60, 65, true)).unwrap();
        assert_eq!(
            output(reporter),
            "2024-01-01T10:00:00Z 00:00:15\n2024-01-01T10:01:00Z 00:00:05 (open at shutdown)\n"
        );
    }

    #[test]
    fn test_quiet_mode_skips_samples_and_live_periods() {
        let mut reporter = Reporter::new(Vec::new(), false, false, false);
        reporter.sample(&Sample::new(at(0), true, true)).unwrap();
        reporter
            .record(&Record::Live(LivePeriod {
                start: at(0),
                end: at(10),
                rtt: RttStats::default(),
                open_at_shutdown: false,
            }))
            .unwrap();
        assert_eq!(output(reporter), "");
    }

    #[test]
    fn test_verbose_sample_line() {
        let mut reporter = Reporter::new(Vec::new(), true, false, false);
        let reachable = Sample::new(at(0), true, true).with_rtt(Some(Duration::from_micros(12346)));
        reporter.sample(&reachable).unwrap();
        reporter.sample(&Sample::new(at(1), true, false)).unwrap();
        assert_eq!(
            output(reporter),
            "2024-01-01T10:00:00Z host_reachable=true interface_up=true effective_up=true rtt=12.35ms\n\
             2024-01-01T10:00:01Z host_reachable=true interface_up=false effective_up=false\n"
        );
    }

    #[test]
    fn test_live_mode_tags_lines() {
        let mut rtt = RttStats::default();
        rtt.record(Duration::from_millis(10));
        rtt.record(Duration::from_millis(30));

        let mut reporter = Reporter::new(Vec::new(), false, true, false);
        reporter
            .record(&Record::Live(LivePeriod {
                start: at(0),
                end: at(90),
                rtt,
                open_at_shutdown: false,
            }))
            .unwrap();
        reporter.record(&outage(90, 95, false)).unwrap();
        reporter
            .record(&Record::Live(LivePeriod {
                start: at(95),
                end: at(96),
                rtt: RttStats::default(),
                open_at_shutdown: true,
            }))
            .unwrap();

        assert_eq!(
            output(reporter),
            "ON 2024-01-01T10:00:00Z 00:01:30 2 20.00 14.14 10.00 30.00\n\
             OFF 2024-01-01T10:01:30Z 00:00:05\n\
             ON 2024-01-01T10:01:35Z 00:00:01 0 0.00 0.00 0.00 0.00 (open at shutdown)\n"
        );
    }

    #[test]
    fn test_append_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("outages.log");
        std::fs::write(&path, "earlier\n").unwrap();

        let mut reporter = Reporter::append_to(&path, false, false).unwrap();
        reporter.record(&outage(0, 2, false)).unwrap();
        drop(reporter);

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "earlier\n2024-01-01T10:00:00Z 00:00:02\n");
    }

    #[test]
    fn test_unwritable_output_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("outages.log");
        assert!(matches!(
            Reporter::append_to(&path, false, false),
            Err(MonitorError::Output { .. })
        ));
    }
}
