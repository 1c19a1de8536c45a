//! Metrics collection and export module

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Opts, Registry, TextEncoder,
};
use std::time::Instant;

/// Global metrics registry
pub struct Metrics {
    registry: Registry,

    // Counters
    pub runs_started: IntCounter,
    pub runs_completed: IntCounter,
    pub runs_failed: IntCounter,
    pub wallets_funded: IntCounter,
    pub launches_total: IntCounter,
    pub launches_success: IntCounter,
    pub launches_failed: IntCounter,
    pub sweeps_total: IntCounter,
    pub sweeps_failed: IntCounter,
    pub swept_lamports: IntCounter,

    // Gauges
    pub active_runs: IntGauge,

    // Histograms
    pub launch_latency: Histogram,
    pub rpc_latency: Histogram,
}

impl Metrics {
    /// Create new metrics instance
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let runs_started =
            IntCounter::with_opts(Opts::new("runs_started", "Number of launch runs started"))?;

        let runs_completed = IntCounter::with_opts(Opts::new(
            "runs_completed",
            "Number of launch runs that reached Done",
        ))?;

        let runs_failed = IntCounter::with_opts(Opts::new(
            "runs_failed",
            "Number of launch runs aborted by a fatal error",
        ))?;

        let wallets_funded = IntCounter::with_opts(Opts::new(
            "wallets_funded",
            "Number of generated wallets funded",
        ))?;

        let launches_total = IntCounter::with_opts(Opts::new(
            "launches_total",
            "Number of per-wallet token launches attempted",
        ))?;

        let launches_success =
            IntCounter::with_opts(Opts::new("launches_success", "Number of tokens launched"))?;

        let launches_failed = IntCounter::with_opts(Opts::new(
            "launches_failed",
            "Number of wallets whose launch exhausted its retries",
        ))?;

        let sweeps_total = IntCounter::with_opts(Opts::new(
            "sweeps_total",
            "Number of sweep transfers confirmed",
        ))?;

        let sweeps_failed =
            IntCounter::with_opts(Opts::new("sweeps_failed", "Number of wallets not swept"))?;

        let swept_lamports = IntCounter::with_opts(Opts::new(
            "swept_lamports",
            "Lamports returned to the treasury",
        ))?;

        let active_runs =
            IntGauge::with_opts(Opts::new("active_runs", "Launch runs currently in progress"))?;

        let launch_latency = Histogram::with_opts(
            HistogramOpts::new("launch_latency_seconds", "Per-wallet launch latency")
                .buckets(vec![1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]),
        )?;

        let rpc_latency = Histogram::with_opts(
            HistogramOpts::new("rpc_latency_seconds", "RPC call latency including retries")
                .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0]),
        )?;

        // Register all metrics
        registry.register(Box::new(runs_started.clone()))?;
        registry.register(Box::new(runs_completed.clone()))?;
        registry.register(Box::new(runs_failed.clone()))?;
        registry.register(Box::new(wallets_funded.clone()))?;
        registry.register(Box::new(launches_total.clone()))?;
        registry.register(Box::new(launches_success.clone()))?;
        registry.register(Box::new(launches_failed.clone()))?;
        registry.register(Box::new(sweeps_total.clone()))?;
        registry.register(Box::new(sweeps_failed.clone()))?;
        registry.register(Box::new(swept_lamports.clone()))?;
        registry.register(Box::new(active_runs.clone()))?;
        registry.register(Box::new(launch_latency.clone()))?;
        registry.register(Box::new(rpc_latency.clone()))?;

        Ok(Self {
            registry,
            runs_started,
            runs_completed,
            runs_failed,
            wallets_funded,
            launches_total,
            launches_success,
            launches_failed,
            sweeps_total,
            sweeps_failed,
            swept_lamports,
            active_runs,
            launch_latency,
            rpc_latency,
        })
    }

    /// Prometheus text exposition of every registered metric
    pub fn render(&self) -> anyhow::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Global metrics instance
pub fn metrics() -> &'static Metrics {
    static METRICS: once_cell::sync::Lazy<Metrics> =
        once_cell::sync::Lazy::new(|| Metrics::new().expect("Failed to initialize metrics"));
    &METRICS
}

/// Timer helper for measuring operation duration
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn observe_duration(&self, histogram: &Histogram) {
        histogram.observe(self.start.elapsed().as_secs_f64());
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_contains_counters() {
        let m = Metrics::new().unwrap();
        m.launches_total.inc();
        m.swept_lamports.inc_by(1_000);

        let text = m.render().unwrap();
        assert!(text.contains("launches_total 1"));
        assert!(text.contains("swept_lamports 1000"));
    }

    #[test]
    fn test_timer_records_sample() {
        let m = Metrics::new().unwrap();
        Timer::new().observe_duration(&m.rpc_latency);
        assert_eq!(m.rpc_latency.get_sample_count(), 1);
    }
}
