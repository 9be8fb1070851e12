//! Source descriptor that assembles a provider and the process-wide reload hook.

use crate::core::{SqlConfigProvider, SqlSourceOptions};
use crate::error::{ConfigError, Result};
use crate::notify::{ChangeWatcher, PeriodicWatcher};
use crate::sources::{RowSource, SettingsQuery};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::debug;

#[cfg(feature = "metrics")]
use crate::metrics::ConfigMetrics;

/// The most recently built provider, reachable from [`SqlConfigSource::reload`].
static ACTIVE_PROVIDER: Mutex<Option<Weak<SqlConfigProvider>>> = Mutex::new(None);

/// Describes where settings live and how they are refreshed.
///
/// A source holds the table identifiers, the [`RowSource`] to read them with,
/// and optionally a [`ChangeWatcher`] or auto-reload interval. [`build`](Self::build)
/// consumes it and returns the one provider it describes.
///
/// # Single active instance
///
/// Each `build` records its provider in a process-wide slot so that
/// [`SqlConfigSource::reload`] can refresh settings without holding the
/// provider. Only the most recently built provider is reachable this way:
/// building a second source creates an independent provider but replaces the
/// global reload target. Hold the provider returned by `build` to reload any
/// other instance.
///
/// # Examples
///
/// ```rust,no_run
/// use reloadable_sql_config::prelude::*;
/// use reloadable_sql_config::sources::SqliteRowSource;
/// use std::time::Duration;
///
/// # async fn example() -> Result<()> {
/// let provider = SqlConfigSource::new(SqliteRowSource::new("app.db"))
///     .with_schema("main")
///     .with_table("AppSettings")
///     .with_auto_reload(Duration::from_secs(30))
///     .build()?;
///
/// println!("port: {:?}", provider.get("Server:Port"));
///
/// // Anywhere else in the process
/// SqlConfigSource::reload();
/// # Ok(())
/// # }
/// ```
pub struct SqlConfigSource {
    query: SettingsQuery,
    row_source: Arc<dyn RowSource>,
    auto_reload: Option<Duration>,
    watcher: Option<Arc<dyn ChangeWatcher>>,
    #[cfg(feature = "metrics")]
    metrics: Option<ConfigMetrics>,
}

impl SqlConfigSource {
    /// Create a source reading `Settings(Key, Value)` from `row_source`.
    pub fn new<S: RowSource + 'static>(row_source: S) -> Self {
        Self::from_shared(Arc::new(row_source))
    }

    /// Create a source over a row source that is shared elsewhere.
    pub fn from_shared(row_source: Arc<dyn RowSource>) -> Self {
        Self {
            query: SettingsQuery::new(),
            row_source,
            auto_reload: None,
            watcher: None,
            #[cfg(feature = "metrics")]
            metrics: None,
        }
    }

    /// Create a source from deserialized options.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use reloadable_sql_config::prelude::*;
    /// use reloadable_sql_config::sources::SqliteRowSource;
    ///
    /// let options = SqlSourceOptions {
    ///     schema: Some("cfg".to_string()),
    ///     table: "Configurations".to_string(),
    ///     ..Default::default()
    /// };
    /// let source = SqlConfigSource::from_options(&options, SqliteRowSource::new("app.db"));
    /// ```
    pub fn from_options<S: RowSource + 'static>(options: &SqlSourceOptions, row_source: S) -> Self {
        let mut source = Self::new(row_source);
        source.query = options.query();
        source.auto_reload = options.auto_reload_interval();
        source
    }

    /// Qualify the settings table with a schema. Empty means unqualified.
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.query = self.query.with_schema(schema);
        self
    }

    /// Set the settings table name (default `Settings`).
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.query = self.query.with_table(table);
        self
    }

    /// Set the key column name (default `Key`).
    pub fn with_key_column(mut self, column: impl Into<String>) -> Self {
        let value_column = self.query.value_column().to_string();
        self.query = self.query.with_columns(column, value_column);
        self
    }

    /// Set the value column name (default `Value`).
    pub fn with_value_column(mut self, column: impl Into<String>) -> Self {
        let key_column = self.query.key_column().to_string();
        self.query = self.query.with_columns(key_column, column);
        self
    }

    /// Reload on a fixed interval using a [`PeriodicWatcher`].
    ///
    /// A zero interval disables auto-reload. Ignored when an explicit watcher
    /// is set with [`with_watcher`](Self::with_watcher).
    pub fn with_auto_reload(mut self, interval: Duration) -> Self {
        self.auto_reload = (!interval.is_zero()).then_some(interval);
        self
    }

    /// Reload whenever `watcher` fires.
    pub fn with_watcher<W: ChangeWatcher + 'static>(mut self, watcher: W) -> Self {
        self.watcher = Some(Arc::new(watcher));
        self
    }

    /// Record reload metrics with the given meter.
    #[cfg(feature = "metrics")]
    pub fn with_metrics(mut self, meter: opentelemetry::metrics::Meter) -> Self {
        self.metrics = Some(ConfigMetrics::new(meter));
        self
    }

    /// The query the provider will load with.
    pub fn query(&self) -> &SettingsQuery {
        &self.query
    }

    /// Whether the built provider will reload automatically.
    pub fn has_watcher(&self) -> bool {
        self.watcher.is_some() || self.auto_reload.is_some()
    }

    /// Build the provider this source describes.
    ///
    /// Validates the identifiers, performs the initial load, starts the reload
    /// chain if a watcher or interval is configured, and makes the provider the
    /// target of [`SqlConfigSource::reload`]. A failing initial load does not
    /// fail the build; the provider starts with an empty snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The table or a column name is empty
    /// - Auto-reload is requested outside a tokio runtime
    pub fn build(self) -> Result<Arc<SqlConfigProvider>> {
        self.query.validate()?;

        let runtime = if self.has_watcher() {
            Some(tokio::runtime::Handle::try_current().map_err(|e| {
                ConfigError::WatchError(format!("Auto-reload requires a tokio runtime: {}", e))
            })?)
        } else {
            None
        };

        let watcher = match (self.watcher, self.auto_reload, &runtime) {
            (Some(watcher), _, _) => Some(watcher),
            (None, Some(interval), Some(handle)) => {
                let periodic = PeriodicWatcher::with_handle(interval, handle)?;
                Some(Arc::new(periodic) as Arc<dyn ChangeWatcher>)
            }
            _ => None,
        };

        let provider = SqlConfigProvider::new(self.query, self.row_source, watcher);
        #[cfg(feature = "metrics")]
        let provider = match self.metrics {
            Some(metrics) => provider.with_metrics(metrics),
            None => provider,
        };
        let provider = Arc::new(provider);

        provider.load();
        if let Some(handle) = &runtime {
            provider.spawn_reload_chain(handle);
        }

        *ACTIVE_PROVIDER.lock() = Some(Arc::downgrade(&provider));
        debug!(table = %provider.query().qualified_table(), "Built settings provider");

        Ok(provider)
    }

    /// Reload the most recently built provider.
    ///
    /// Does nothing if no provider has been built yet or the last one has been
    /// dropped. See the single active instance note on [`SqlConfigSource`].
    pub fn reload() {
        match Self::active_provider() {
            Some(provider) => provider.reload(),
            None => debug!("No active settings provider to reload"),
        }
    }

    /// The provider [`reload`](Self::reload) would target, if it is still alive.
    pub fn active_provider() -> Option<Arc<SqlConfigProvider>> {
        ACTIVE_PROVIDER.lock().as_ref().and_then(Weak::upgrade)
    }
}
