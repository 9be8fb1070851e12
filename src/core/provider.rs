//! The configuration provider: snapshot ownership, reloads, and the watch chain.

use crate::core::Snapshot;
use crate::error::{ConfigError, Result};
use crate::notify::{ChangeWatcher, SubscriberRegistry, SubscriptionHandle};
use crate::sources::{RowSource, SettingsQuery};
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[cfg(feature = "metrics")]
use crate::metrics::ConfigMetrics;

/// Counts of load attempts since the provider was built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadStats {
    /// Loads started (including the initial one).
    pub attempts: u64,
    /// Loads that published a new snapshot.
    pub successes: u64,
    /// Loads whose fetch failed and left the snapshot unchanged.
    pub failures: u64,
}

/// Owns the current settings snapshot and keeps it fresh.
///
/// Reads go through a lock-free [`ArcSwap`], so a reader always sees one
/// complete snapshot. Every load builds its map privately and publishes it with
/// a single atomic store; concurrent loads never produce a torn snapshot, and
/// whichever finishes last wins.
///
/// Loads fail open. If the row source errors, the previous snapshot stays
/// current, the error is logged and kept in [`last_error`](Self::last_error),
/// and nothing is raised. On a sustained outage the settings stop updating but
/// never disappear.
///
/// Providers are created by [`SqlConfigSource::build`](crate::core::SqlConfigSource::build).
/// Dropping the last handle disposes the provider.
///
/// # Examples
///
/// ```rust,no_run
/// use reloadable_sql_config::prelude::*;
/// use reloadable_sql_config::sources::SqliteRowSource;
///
/// # fn example() -> Result<()> {
/// let provider = SqlConfigSource::new(SqliteRowSource::new("settings.db")).build()?;
///
/// println!("site: {:?}", provider.get("Site:Name"));
///
/// provider.reload();
/// # Ok(())
/// # }
/// ```
pub struct SqlConfigProvider {
    /// The current snapshot, swapped atomically on each successful load
    current: ArcSwap<Snapshot>,
    query: SettingsQuery,
    row_source: Arc<dyn RowSource>,
    watcher: Option<Arc<dyn ChangeWatcher>>,
    /// Background task re-arming the watcher after every fire
    chain: Mutex<Option<JoinHandle<()>>>,
    disposed: AtomicBool,
    attempts: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    last_error: Mutex<Option<String>>,
    subscribers: SubscriberRegistry,
    #[cfg(feature = "metrics")]
    metrics: Option<ConfigMetrics>,
}

impl SqlConfigProvider {
    pub(crate) fn new(
        query: SettingsQuery,
        row_source: Arc<dyn RowSource>,
        watcher: Option<Arc<dyn ChangeWatcher>>,
    ) -> Self {
        Self {
            current: ArcSwap::from_pointee(Snapshot::default()),
            query,
            row_source,
            watcher,
            chain: Mutex::new(None),
            disposed: AtomicBool::new(false),
            attempts: AtomicU64::new(0),
            successes: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            last_error: Mutex::new(None),
            subscribers: SubscriberRegistry::new(),
            #[cfg(feature = "metrics")]
            metrics: None,
        }
    }

    #[cfg(feature = "metrics")]
    pub(crate) fn with_metrics(mut self, metrics: ConfigMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Start the watch → load → re-arm loop on `handle`.
    ///
    /// The task holds only a weak reference between fires, so it never keeps
    /// a dropped provider alive.
    pub(crate) fn spawn_reload_chain(self: &Arc<Self>, handle: &Handle) {
        let Some(watcher) = self.watcher.clone() else {
            return;
        };
        let weak = Arc::downgrade(self);
        let source_name = self.row_source.name();

        let task = handle.spawn(async move {
            loop {
                let notification = watcher.watch();
                notification.fired().await;

                let Some(provider) = weak.upgrade() else {
                    break;
                };
                if provider.is_disposed() {
                    break;
                }

                // Fetches block on I/O; keep them off the async workers
                let reload = tokio::task::spawn_blocking(move || provider.load());
                if let Err(e) = reload.await {
                    warn!(source = %source_name, error = %e, "Settings reload task failed");
                }
            }
            debug!(source = %source_name, "Reload chain stopped");
        });

        *self.chain.lock() = Some(task);
        info!(
            source = %self.row_source.name(),
            table = %self.query.qualified_table(),
            "Watching settings for changes"
        );
    }

    /// Get the current snapshot.
    ///
    /// Lock-free; the returned `Arc` stays valid and unchanged even if a
    /// reload publishes a newer snapshot meanwhile.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.current.load_full()
    }

    /// Get the current value for `key`.
    pub fn get(&self, key: &str) -> Option<String> {
        self.current.load().get(key).map(str::to_string)
    }

    /// Fetch all rows and publish them as the new snapshot, swallowing errors.
    ///
    /// On failure the previous snapshot stays current; the error is logged
    /// and recorded in [`last_error`](Self::last_error). After disposal this
    /// does nothing.
    pub fn load(&self) {
        match self.try_load() {
            Ok(()) => {}
            Err(ConfigError::Disposed) => {
                debug!(source = %self.row_source.name(), "Skipping load on disposed provider");
            }
            Err(e) => {
                warn!(
                    source = %self.row_source.name(),
                    table = %self.query.qualified_table(),
                    error = %e,
                    "Failed to load settings, keeping previous snapshot"
                );
            }
        }
    }

    /// Manually reload the settings. Alias of [`load`](Self::load).
    ///
    /// Safe to call at any time, from any thread, concurrently with
    /// watcher-triggered reloads.
    pub fn reload(&self) {
        self.load();
    }

    /// Reload and report the outcome instead of swallowing it.
    ///
    /// # Errors
    ///
    /// Returns the row source error, or [`ConfigError::Disposed`] after disposal.
    /// The snapshot is left unchanged in both cases.
    pub fn try_reload(&self) -> Result<()> {
        self.try_load()
    }

    fn try_load(&self) -> Result<()> {
        if self.is_disposed() {
            return Err(ConfigError::Disposed);
        }

        self.attempts.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "metrics")]
        let timer = self.metrics.as_ref().map(ConfigMetrics::start_reload);

        let rows = match self.row_source.fetch(&self.query) {
            Ok(rows) => rows,
            Err(e) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                *self.last_error.lock() = Some(e.to_string());
                #[cfg(feature = "metrics")]
                if let (Some(metrics), Some(timer)) = (&self.metrics, timer) {
                    metrics.record_reload_failure(timer);
                    metrics.update_snapshot_age();
                }
                return Err(e);
            }
        };

        // Build privately, then publish in one store
        let snapshot = Arc::new(Snapshot::from_rows(rows));
        self.current.store(Arc::clone(&snapshot));

        self.successes.fetch_add(1, Ordering::Relaxed);
        *self.last_error.lock() = None;
        #[cfg(feature = "metrics")]
        if let (Some(metrics), Some(timer)) = (&self.metrics, timer) {
            metrics.record_reload_success(timer, snapshot.len());
            metrics.update_snapshot_age();
        }
        debug!(
            source = %self.row_source.name(),
            keys = snapshot.len(),
            "Published settings snapshot"
        );

        self.subscribers.notify_all(&snapshot);
        Ok(())
    }

    /// Register a callback invoked with every newly published snapshot.
    ///
    /// Returns a handle that can be dropped to unsubscribe.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// # use reloadable_sql_config::prelude::*;
    /// # fn example(provider: &SqlConfigProvider) {
    /// let handle = provider.subscribe(|snapshot| {
    ///     println!("Settings reloaded: {} keys", snapshot.len());
    /// });
    ///
    /// // Later, unsubscribe
    /// drop(handle);
    /// # }
    /// ```
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionHandle
    where
        F: Fn(&Snapshot) + Send + Sync + 'static,
    {
        self.subscribers.subscribe(callback)
    }

    /// Load counters since the provider was built.
    pub fn stats(&self) -> LoadStats {
        LoadStats {
            attempts: self.attempts.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }

    /// The error from the most recent load, if it failed.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().clone()
    }

    /// The query this provider loads with.
    pub fn query(&self) -> &SettingsQuery {
        &self.query
    }

    /// Whether the provider reloads automatically.
    pub fn is_watching(&self) -> bool {
        !self.is_disposed() && self.chain.lock().is_some()
    }

    /// Whether [`dispose`](Self::dispose) has run.
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Stop reloading and release resources.
    ///
    /// Aborts the reload chain, disposes the watcher, and closes the row
    /// source connection. A load already in flight may still publish, but no
    /// new load starts. Only the first call has any effect; errors while
    /// closing are logged and ignored.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }

        if let Some(chain) = self.chain.lock().take() {
            chain.abort();
        }
        if let Some(watcher) = &self.watcher {
            watcher.dispose();
        }
        if let Err(e) = self.row_source.close() {
            debug!(source = %self.row_source.name(), error = %e, "Error closing row source");
        }

        debug!(source = %self.row_source.name(), "Disposed settings provider");
    }
}

impl Drop for SqlConfigProvider {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for SqlConfigProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlConfigProvider")
            .field("source", &self.row_source.name())
            .field("query", &self.query)
            .field("keys", &self.current.load().len())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::SettingRow;
    use std::sync::atomic::AtomicUsize;

    /// In-memory row source whose rows and failure mode can be changed.
    #[derive(Default)]
    struct FakeSource {
        rows: Mutex<Vec<SettingRow>>,
        fail: AtomicBool,
        closes: AtomicUsize,
    }

    impl FakeSource {
        fn with_rows(rows: &[(&str, &str)]) -> Arc<Self> {
            let source = Self::default();
            source.set_rows(rows);
            Arc::new(source)
        }

        fn set_rows(&self, rows: &[(&str, &str)]) {
            *self.rows.lock() = rows
                .iter()
                .map(|(k, v)| (k.to_string(), Some(v.to_string())))
                .collect();
        }
    }

    impl RowSource for FakeSource {
        fn fetch(&self, _query: &SettingsQuery) -> Result<Vec<SettingRow>> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(ConfigError::ConnectionError("connection refused".into()));
            }
            Ok(self.rows.lock().clone())
        }

        fn close(&self) -> Result<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn name(&self) -> String {
            "fake".to_string()
        }
    }

    fn provider_over(source: &Arc<FakeSource>) -> SqlConfigProvider {
        SqlConfigProvider::new(
            SettingsQuery::new(),
            Arc::clone(source) as Arc<dyn RowSource>,
            None,
        )
    }

    #[test]
    fn test_load_publishes_snapshot() {
        let source = FakeSource::with_rows(&[("Site:Name", "example.com"), ("Site:Port", "8080")]);
        let provider = provider_over(&source);
        assert!(provider.snapshot().is_empty());

        provider.load();

        assert_eq!(provider.get("Site:Name"), Some("example.com".to_string()));
        assert_eq!(provider.get("Site:Port"), Some("8080".to_string()));
        assert_eq!(
            provider.stats(),
            LoadStats {
                attempts: 1,
                successes: 1,
                failures: 0,
            }
        );
    }

    #[test]
    fn test_reload_is_idempotent() {
        let source = FakeSource::with_rows(&[("A", "1")]);
        let provider = provider_over(&source);

        provider.reload();
        let before = provider.snapshot();
        provider.reload();
        let after = provider.snapshot();

        assert_eq!(*before, *after);
    }

    #[test]
    fn test_failed_load_keeps_previous_snapshot() {
        let source = FakeSource::with_rows(&[("A", "1")]);
        let provider = provider_over(&source);
        provider.load();
        let before = provider.snapshot();

        source.fail.store(true, Ordering::SeqCst);
        provider.load();

        assert_eq!(*provider.snapshot(), *before);
        assert_eq!(provider.stats().failures, 1);
        assert!(provider.last_error().unwrap().contains("connection refused"));

        source.fail.store(false, Ordering::SeqCst);
        source.set_rows(&[("A", "2")]);
        provider.load();
        assert_eq!(provider.get("A"), Some("2".to_string()));
        assert_eq!(provider.last_error(), None);
    }

    #[test]
    fn test_try_reload_surfaces_error() {
        let source = FakeSource::with_rows(&[]);
        source.fail.store(true, Ordering::SeqCst);
        let provider = provider_over(&source);

        let result = provider.try_reload();
        assert!(matches!(result, Err(ConfigError::ConnectionError(_))));
    }

    #[test]
    fn test_old_snapshot_handles_stay_valid() {
        let source = FakeSource::with_rows(&[("A", "1")]);
        let provider = provider_over(&source);
        provider.load();

        let held = provider.snapshot();
        source.set_rows(&[("A", "2")]);
        provider.load();

        assert_eq!(held.get("A"), Some("1"));
        assert_eq!(provider.get("A"), Some("2".to_string()));
    }

    #[test]
    fn test_subscribers_notified_on_success_only() {
        let source = FakeSource::with_rows(&[("A", "1")]);
        let provider = provider_over(&source);
        let counter = Arc::new(AtomicUsize::new(0));

        let counter_clone = Arc::clone(&counter);
        let _handle = provider.subscribe(move |snapshot| {
            assert_eq!(snapshot.get("A"), Some("1"));
            counter_clone.fetch_add(1, Ordering::SeqCst);
        });

        provider.load();
        source.fail.store(true, Ordering::SeqCst);
        provider.load();

        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_dispose_closes_source_once() {
        let source = FakeSource::with_rows(&[("A", "1")]);
        let provider = provider_over(&source);
        provider.load();

        provider.dispose();
        provider.dispose();
        assert!(provider.is_disposed());
        assert_eq!(source.closes.load(Ordering::SeqCst), 1);

        // Loads after disposal are skipped and the snapshot survives
        source.set_rows(&[("A", "2")]);
        provider.reload();
        assert_eq!(provider.get("A"), Some("1".to_string()));
        assert!(matches!(provider.try_reload(), Err(ConfigError::Disposed)));
        assert_eq!(provider.stats().attempts, 1);

        drop(provider);
        assert_eq!(source.closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_disposes() {
        let source = FakeSource::with_rows(&[]);
        let provider = provider_over(&source);
        drop(provider);
        assert_eq!(source.closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_concurrent_reads_never_see_torn_snapshot() {
        let source = FakeSource::with_rows(&[("A", "0"), ("B", "0"), ("C", "0")]);
        let provider = Arc::new(provider_over(&source));
        provider.load();

        let done = Arc::new(AtomicBool::new(false));
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let provider = Arc::clone(&provider);
                let done = Arc::clone(&done);
                std::thread::spawn(move || {
                    while !done.load(Ordering::SeqCst) {
                        let snapshot = provider.snapshot();
                        let a = snapshot.get("A");
                        assert_eq!(a, snapshot.get("B"));
                        assert_eq!(a, snapshot.get("C"));
                    }
                })
            })
            .collect();

        for generation in 1..200 {
            let value = generation.to_string();
            let value = value.as_str();
            source.set_rows(&[("A", value), ("B", value), ("C", value)]);
            provider.reload();
        }
        done.store(true, Ordering::SeqCst);

        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(provider.get("A"), Some("199".to_string()));
    }

    #[test]
    fn test_subscriber_may_reload_from_callback() {
        let source = FakeSource::with_rows(&[("A", "1")]);
        let provider = Arc::new(provider_over(&source));
        let weak = Arc::downgrade(&provider);
        let calls = Arc::new(AtomicUsize::new(0));

        let calls_clone = Arc::clone(&calls);
        let _handle = provider.subscribe(move |_| {
            // Reload once from inside the callback
            if calls_clone.fetch_add(1, Ordering::SeqCst) == 0 {
                if let Some(provider) = weak.upgrade() {
                    provider.reload();
                }
            }
        });

        provider.load();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(provider.stats().successes, 2);
    }

    #[cfg(feature = "metrics")]
    #[test]
    fn test_loads_record_snapshot_age() {
        use std::time::Duration;

        let source = FakeSource::with_rows(&[("A", "1")]);
        let metrics = ConfigMetrics::new(opentelemetry::global::meter("test"));
        let provider = provider_over(&source).with_metrics(metrics.clone());

        provider.load();
        std::thread::sleep(Duration::from_millis(30));

        // A failed load does not refresh the age
        source.fail.store(true, Ordering::SeqCst);
        provider.load();
        assert!(metrics.snapshot_age() >= Duration::from_millis(30));

        source.fail.store(false, Ordering::SeqCst);
        provider.load();
        assert!(metrics.snapshot_age() < Duration::from_millis(30));
    }
}
