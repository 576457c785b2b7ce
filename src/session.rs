use crate::config::Settings;
use crate::monitor::{Debounced, Detector, Record, Sample};
use crate::probe::{IcmpProbe, InterfaceProbe, LinkProbe, ReachabilityProbe};
use crate::report::Reporter;
use crate::utils::resolve_host;
use anyhow::Result;
use chrono::{DateTime, TimeDelta, Utc};
use std::future::Future;
use std::io::Write;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// The two signal sources sampled on every tick.
pub struct Probes {
    pub reachability: Box<dyn ReachabilityProbe>,
    pub link: Box<dyn InterfaceProbe>,
}

impl Probes {
    /// Probes run one after the other; a tick takes at most the probe
    /// timeout plus the (local, fast) link read.
    async fn sample(&self, at: DateTime<Utc>) -> Sample {
        let reachability = self.reachability.probe().await;
        let interface_up = self.link.is_up().await;
        Sample::new(at, reachability.is_reachable(), interface_up).with_rtt(reachability.rtt())
    }
}

/// Wall-clock timestamps that only move forward: the wall time at startup
/// plus monotonic elapsed time.
struct Clock {
    wall: DateTime<Utc>,
    mono: Instant,
}

impl Clock {
    fn start() -> Self {
        Self {
            wall: Utc::now(),
            mono: Instant::now(),
        }
    }

    fn now(&self) -> DateTime<Utc> {
        self.wall + TimeDelta::from_std(self.mono.elapsed()).unwrap_or_else(|_| TimeDelta::zero())
    }
}

pub struct Session<W: Write> {
    settings: Settings,
    probes: Probes,
    reporter: Reporter<W>,
}

impl Session<Box<dyn Write + Send>> {
    /// Checks everything that can be fatal: the interface must exist, the
    /// landmark must resolve and the output must open.
    pub async fn start(settings: Settings) -> Result<Self> {
        let link = LinkProbe::new(&settings.iface)?;
        let landmark_addr = resolve_host(&settings.landmark).await?;
        let reporter = match &settings.output {
            Some(path) => Reporter::append_to(path, settings.verbose, settings.live)?,
            None => Reporter::stdout(settings.verbose, settings.live),
        };

        info!(
            landmark = %settings.landmark,
            addr = %landmark_addr,
            iface = %link.iface(),
            interval = ?settings.interval,
            timeout = ?settings.timeout,
            debounce = settings.debounce,
            "monitoring"
        );

        let probes = Probes {
            reachability: Box::new(IcmpProbe::new(settings.landmark.clone(), settings.timeout)),
            link: Box::new(link),
        };
        Ok(Session::new(settings, probes, reporter))
    }

    /// Runs until SIGINT or SIGTERM.
    pub async fn run(mut self) -> Result<()> {
        self.run_until(shutdown_signal()).await
    }
}

impl<W: Write> Session<W> {
    pub fn new(settings: Settings, probes: Probes, reporter: Reporter<W>) -> Self {
        Self {
            settings,
            probes,
            reporter,
        }
    }

    /// Polls until `shutdown` completes, then reports whatever period is
    /// still open. A probe in flight when `shutdown` fires is abandoned.
    pub async fn run_until(&mut self, shutdown: impl Future<Output = ()>) -> Result<()> {
        let clock = Clock::start();
        let mut monitor = Debounced::new(Detector::new(), self.settings.debounce);

        let mut ticker = tokio::time::interval(self.settings.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => {
                    info!("shutting down");
                    break;
                }

                sample = next_sample(&mut ticker, &clock, &self.probes) => {
                    emit_sample(&mut self.reporter, &sample);
                    if let Some(record) = monitor.observe(&sample) {
                        emit_record(&mut self.reporter, &record);
                    }
                    debug!(
                        ?sample,
                        up = ?monitor.effective_up(),
                        outage_since = ?monitor.open_outage_start(),
                        "sample"
                    );
                }
            }
        }

        if let Some(record) = monitor.finish(clock.now()) {
            emit_record(&mut self.reporter, &record);
        }
        Ok(())
    }

    #[cfg(test)]
    fn into_reporter(self) -> Reporter<W> {
        self.reporter
    }
}

async fn next_sample(ticker: &mut Interval, clock: &Clock, probes: &Probes) -> Sample {
    ticker.tick().await;
    probes.sample(clock.now()).await
}

fn emit_sample<W: Write>(reporter: &mut Reporter<W>, sample: &Sample) {
    if let Err(e) = reporter.sample(sample) {
        warn!(error = %e, "cannot write sample");
    }
}

fn emit_record<W: Write>(reporter: &mut Reporter<W>, record: &Record) {
    if let Err(e) = reporter.record(record) {
        warn!(error = %e, ?record, "cannot write record");
    }
}

async fn shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut term = match signal(SignalKind::terminate()) {
        Ok(term) => term,
        Err(e) => {
            warn!(error = %e, "cannot listen for SIGTERM, only Ctrl-C will stop monitoring");
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "cannot listen for Ctrl-C either");
                std::future::pending::<()>().await;
            }
            return;
        }
    };

    let ctrl_c_failed = tokio::select! {
        result = tokio::signal::ctrl_c() => match result {
            Ok(()) => false,
            Err(e) => {
                warn!(error = %e, "cannot listen for Ctrl-C");
                true
            }
        },
        _ = term.recv() => false,
    };
    if ctrl_c_failed {
        term.recv().await;
    }
}
