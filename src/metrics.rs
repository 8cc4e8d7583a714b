//! Prometheus metrics for check cycles.
//!
//! Metrics live in a registry owned by [`Metrics`] rather than the process
//! default, so independent instances (and tests) never collide.

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Registry, TextEncoder,
};

use crate::report::CycleReport;

/// Connect latency buckets in seconds.
const PROBE_LATENCY_BUCKETS: &[f64] = &[0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

/// Whole-cycle duration buckets in seconds.
const CYCLE_DURATION_BUCKETS: &[f64] = &[1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0];

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    cycles_total: IntCounter,
    cycles_skipped_total: IntCounter,
    cycles_interrupted_total: IntCounter,
    accounts_probed_total: IntCounter,
    extraction_errors_total: IntCounter,
    accounts_reachable: IntGauge,
    accounts_total: IntGauge,
    last_cycle_timestamp_seconds: IntGauge,
    probe_latency_seconds: Histogram,
    cycle_duration_seconds: Histogram,
}

fn counter(registry: &Registry, name: &str, help: &str) -> prometheus::Result<IntCounter> {
    let metric = IntCounter::new(name, help)?;
    registry.register(Box::new(metric.clone()))?;
    Ok(metric)
}

fn gauge(registry: &Registry, name: &str, help: &str) -> prometheus::Result<IntGauge> {
    let metric = IntGauge::new(name, help)?;
    registry.register(Box::new(metric.clone()))?;
    Ok(metric)
}

fn histogram(
    registry: &Registry,
    name: &str,
    help: &str,
    buckets: &[f64],
) -> prometheus::Result<Histogram> {
    let metric = Histogram::with_opts(HistogramOpts::new(name, help).buckets(buckets.to_vec()))?;
    registry.register(Box::new(metric.clone()))?;
    Ok(metric)
}

impl Metrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();
        Ok(Self {
            cycles_total: counter(&registry, "vpn_checker_cycles_total", "Check cycles completed")?,
            cycles_skipped_total: counter(
                &registry,
                "vpn_checker_cycles_skipped_total",
                "Ticks skipped because a cycle was still running",
            )?,
            cycles_interrupted_total: counter(
                &registry,
                "vpn_checker_cycles_interrupted_total",
                "Cycles cut short by shutdown",
            )?,
            accounts_probed_total: counter(
                &registry,
                "vpn_checker_accounts_probed_total",
                "Accounts probed across all cycles",
            )?,
            extraction_errors_total: counter(
                &registry,
                "vpn_checker_extraction_errors_total",
                "Descriptors rejected during extraction",
            )?,
            accounts_reachable: gauge(
                &registry,
                "vpn_checker_accounts_reachable",
                "Reachable accounts in the last cycle",
            )?,
            accounts_total: gauge(
                &registry,
                "vpn_checker_accounts",
                "Accounts probed in the last cycle",
            )?,
            last_cycle_timestamp_seconds: gauge(
                &registry,
                "vpn_checker_last_cycle_timestamp_seconds",
                "Unix time the last cycle finished",
            )?,
            probe_latency_seconds: histogram(
                &registry,
                "vpn_checker_probe_latency_seconds",
                "TCP connect latency of reachable accounts",
                PROBE_LATENCY_BUCKETS,
            )?,
            cycle_duration_seconds: histogram(
                &registry,
                "vpn_checker_cycle_duration_seconds",
                "Wall-clock duration of a check cycle",
                CYCLE_DURATION_BUCKETS,
            )?,
            registry,
        })
    }

    pub fn record_cycle(&self, report: &CycleReport) {
        self.cycles_total.inc();
        if report.interrupted {
            self.cycles_interrupted_total.inc();
        }
        self.accounts_probed_total.inc_by(report.totals.total as u64);
        self.accounts_reachable.set(report.totals.successful as i64);
        self.accounts_total.set(report.totals.total as i64);
        self.last_cycle_timestamp_seconds.set(report.finished_at.timestamp());

        let extraction_errors: usize = report.sources.iter().map(|s| s.extraction_errors).sum();
        self.extraction_errors_total.inc_by(extraction_errors as u64);

        for entry in report.sources.iter().flat_map(|s| &s.ranked_accounts) {
            if let Some(ms) = entry.outcome.latency_ms {
                self.probe_latency_seconds.observe(ms as f64 / 1000.0);
            }
        }
        if let Ok(duration) = report.duration().to_std() {
            self.cycle_duration_seconds.observe(duration.as_secs_f64());
        }
    }

    pub fn record_skipped(&self) {
        self.cycles_skipped_total.inc();
    }

    pub fn cycles_total(&self) -> u64 {
        self.cycles_total.get()
    }

    pub fn cycles_skipped(&self) -> u64 {
        self.cycles_skipped_total.get()
    }

    /// Prometheus text exposition of every metric.
    pub fn render(&self) -> anyhow::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}
