//! Serializable construction options for a SQL configuration source.

use crate::sources::{DEFAULT_KEY_COLUMN, DEFAULT_TABLE, DEFAULT_VALUE_COLUMN, SettingsQuery};
use serde::Deserialize;
use std::time::Duration;

/// Options recognized when building a source from host configuration.
///
/// Every field has a default, so an empty document yields
/// `Settings(Key, Value)` with auto-reload disabled.
///
/// # Examples
///
/// ```rust
/// use reloadable_sql_config::core::SqlSourceOptions;
/// use std::time::Duration;
///
/// let options = SqlSourceOptions {
///     table: "AppSettings".to_string(),
///     auto_reload_interval_ms: Some(30_000),
///     ..Default::default()
/// };
///
/// assert_eq!(options.auto_reload_interval(), Some(Duration::from_secs(30)));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SqlSourceOptions {
    /// Schema qualifying the table. `None` or empty means unqualified.
    pub schema: Option<String>,
    /// Settings table name.
    pub table: String,
    /// Column holding setting keys.
    pub key_column: String,
    /// Column holding setting values.
    pub value_column: String,
    /// Auto-reload period in milliseconds. `None` or `0` disables auto-reload.
    pub auto_reload_interval_ms: Option<u64>,
}

impl SqlSourceOptions {
    /// The auto-reload interval, if enabled.
    pub fn auto_reload_interval(&self) -> Option<Duration> {
        self.auto_reload_interval_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }

    /// The query these options describe.
    pub fn query(&self) -> SettingsQuery {
        let query = SettingsQuery::new()
            .with_table(self.table.clone())
            .with_columns(self.key_column.clone(), self.value_column.clone());
        match &self.schema {
            Some(schema) => query.with_schema(schema.clone()),
            None => query,
        }
    }
}

impl Default for SqlSourceOptions {
    fn default() -> Self {
        Self {
            schema: None,
            table: DEFAULT_TABLE.to_string(),
            key_column: DEFAULT_KEY_COLUMN.to_string(),
            value_column: DEFAULT_VALUE_COLUMN.to_string(),
            auto_reload_interval_ms: None,
        }
    }
}
