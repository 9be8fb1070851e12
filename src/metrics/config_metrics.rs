//! Settings reload metrics using OpenTelemetry.

use opentelemetry::metrics::{Counter, Gauge, Histogram, Meter};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Metrics collector for settings reloads.
///
/// Tracks reload attempts, success/failure counts, fetch latency, snapshot
/// size and snapshot age using OpenTelemetry metrics.
///
/// # Examples
///
/// ```rust,no_run
/// use reloadable_sql_config::metrics::ConfigMetrics;
/// use opentelemetry::global;
///
/// let meter = global::meter("reloadable-sql-config");
/// let metrics = ConfigMetrics::new(meter);
///
/// let timer = metrics.start_reload();
/// // ... fetch rows ...
/// metrics.record_reload_success(timer, 12);
/// ```
#[derive(Clone)]
pub struct ConfigMetrics {
    reload_attempts: Counter<u64>,
    reload_success: Counter<u64>,
    reload_failures: Counter<u64>,
    reload_duration: Histogram<f64>,
    snapshot_keys: Gauge<u64>,
    snapshot_age_seconds: Gauge<i64>,
    last_publish: Arc<parking_lot::Mutex<Instant>>,
}

impl ConfigMetrics {
    /// Create a new metrics collector with the provided meter.
    pub fn new(meter: Meter) -> Self {
        let reload_attempts = meter
            .u64_counter("sql_config.reload.attempts")
            .with_description("Total number of settings reload attempts")
            .build();

        let reload_success = meter
            .u64_counter("sql_config.reload.success")
            .with_description("Number of reloads that published a snapshot")
            .build();

        let reload_failures = meter
            .u64_counter("sql_config.reload.failures")
            .with_description("Number of reloads that kept the previous snapshot")
            .build();

        let reload_duration = meter
            .f64_histogram("sql_config.reload.duration")
            .with_description("Duration of settings fetches in seconds")
            .with_unit("s")
            .build();

        let snapshot_keys = meter
            .u64_gauge("sql_config.snapshot.keys")
            .with_description("Number of keys in the current snapshot")
            .build();

        let snapshot_age_seconds = meter
            .i64_gauge("sql_config.snapshot.age")
            .with_description("Time since the last published snapshot in seconds")
            .with_unit("s")
            .build();

        Self {
            reload_attempts,
            reload_success,
            reload_failures,
            reload_duration,
            snapshot_keys,
            snapshot_age_seconds,
            last_publish: Arc::new(parking_lot::Mutex::new(Instant::now())),
        }
    }

    /// Start a reload timer.
    ///
    /// Pass the returned `Instant` to `record_reload_success` or
    /// `record_reload_failure` when the fetch completes.
    pub fn start_reload(&self) -> Instant {
        self.reload_attempts.add(1, &[]);
        Instant::now()
    }

    /// Record a reload that published a snapshot of `keys` entries.
    pub fn record_reload_success(&self, start: Instant, keys: usize) {
        let duration = start.elapsed().as_secs_f64();
        self.reload_success.add(1, &[]);
        self.reload_duration.record(duration, &[]);
        self.snapshot_keys.record(keys as u64, &[]);

        *self.last_publish.lock() = Instant::now();
    }

    /// Record a reload whose fetch failed.
    pub fn record_reload_failure(&self, start: Instant) {
        let duration = start.elapsed().as_secs_f64();
        self.reload_failures.add(1, &[]);
        self.reload_duration.record(duration, &[]);
    }

    /// Time since the last successful reload published a snapshot.
    pub fn snapshot_age(&self) -> Duration {
        self.last_publish.lock().elapsed()
    }

    /// Update the snapshot age gauge.
    ///
    /// The provider calls this after every reload; a growing age with failing
    /// reloads means it is serving stale settings.
    pub fn update_snapshot_age(&self) {
        let age_secs = self.snapshot_age().as_secs() as i64;
        self.snapshot_age_seconds.record(age_secs, &[]);
    }
}
