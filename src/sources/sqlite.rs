//! SQLite-backed row source.

use super::{RowSource, SettingRow, SettingsQuery};
use crate::error::{ConfigError, Result};
use parking_lot::Mutex;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

/// How long a query waits on a locked database before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Row source reading a settings table from a SQLite database.
///
/// The connection is opened read-only on the first fetch and kept until
/// [`close`](RowSource::close). Schemas map to SQLite database names, so
/// `main` or any `ATTACH`ed database can qualify the table.
///
/// # Examples
///
/// ```rust,no_run
/// use reloadable_sql_config::sources::{RowSource, SettingsQuery, SqliteRowSource};
///
/// # fn example() -> reloadable_sql_config::error::Result<()> {
/// let source = SqliteRowSource::new("settings.db");
/// let rows = source.fetch(&SettingsQuery::new())?;
/// println!("{} settings", rows.len());
/// # Ok(())
/// # }
/// ```
pub struct SqliteRowSource {
    path: Option<PathBuf>,
    connection: Mutex<Option<Connection>>,
}

impl SqliteRowSource {
    /// Create a source for the database file at `path`.
    ///
    /// Nothing is opened until the first fetch.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            connection: Mutex::new(None),
        }
    }

    /// Wrap an already-open connection.
    ///
    /// Useful for in-memory databases. Once closed, such a source cannot
    /// reconnect and every later fetch fails.
    pub fn from_connection(connection: Connection) -> Self {
        Self {
            path: None,
            connection: Mutex::new(Some(connection)),
        }
    }

    /// Whether a connection is currently held.
    pub fn is_open(&self) -> bool {
        self.connection.lock().is_some()
    }

    fn open(&self) -> Result<Connection> {
        let path = self.path.as_ref().ok_or_else(|| {
            ConfigError::ConnectionError("connection was closed and has no path to reopen".into())
        })?;

        debug!(path = %path.display(), "Opening SQLite settings connection");
        let connection = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_URI,
        )
        .map_err(|e| {
            ConfigError::ConnectionError(format!("Failed to open {}: {}", path.display(), e))
        })?;
        connection.busy_timeout(BUSY_TIMEOUT)?;
        Ok(connection)
    }
}

impl RowSource for SqliteRowSource {
    fn fetch(&self, query: &SettingsQuery) -> Result<Vec<SettingRow>> {
        let mut guard = self.connection.lock();
        if guard.is_none() {
            *guard = Some(self.open()?);
        }
        let Some(connection) = guard.as_ref() else {
            return Err(ConfigError::ConnectionError("connection unavailable".into()));
        };

        let sql = query.to_sql();
        let mut statement = connection
            .prepare(&sql)
            .map_err(|e| ConfigError::LoadError(format!("Failed to prepare '{}': {}", sql, e)))?;

        let rows = statement
            .query_map([], |row| {
                Ok((
                    value_to_string(row.get_ref(0)?),
                    value_to_string(row.get_ref(1)?),
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows
            .into_iter()
            .filter_map(|(key, value)| match key {
                Some(key) => Some((key, value)),
                None => {
                    debug!(table = %query.qualified_table(), "Skipping settings row with NULL key");
                    None
                }
            })
            .collect())
    }

    fn close(&self) -> Result<()> {
        if let Some(connection) = self.connection.lock().take() {
            connection
                .close()
                .map_err(|(_, e)| ConfigError::ConnectionError(format!("Failed to close: {}", e)))?;
        }
        Ok(())
    }

    fn name(&self) -> String {
        match &self.path {
            Some(path) => format!("sqlite:{}", path.display()),
            None => "sqlite:<connection>".to_string(),
        }
    }
}

/// Render any SQLite value as settings text. NULL stays absent.
fn value_to_string(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Some(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_source(setup: &str) -> SqliteRowSource {
        let connection = Connection::open_in_memory().unwrap();
        connection.execute_batch(setup).unwrap();
        SqliteRowSource::from_connection(connection)
    }

    #[test]
    fn test_fetch_default_table() {
        let source = memory_source(
            r#"
            CREATE TABLE Settings ("Key" TEXT, "Value" TEXT);
            INSERT INTO Settings VALUES ('Site:Name', 'example.com');
            INSERT INTO Settings VALUES ('Site:Port', '8080');
            "#,
        );

        let rows = source.fetch(&SettingsQuery::new()).unwrap();
        assert_eq!(
            rows,
            vec![
                ("Site:Name".to_string(), Some("example.com".to_string())),
                ("Site:Port".to_string(), Some("8080".to_string())),
            ]
        );
    }

    #[test]
    fn test_fetch_renders_non_text_values() {
        let source = memory_source(
            r#"
            CREATE TABLE Settings ("Key" TEXT, "Value");
            INSERT INTO Settings VALUES ('int', 42);
            INSERT INTO Settings VALUES ('real', 1.5);
            INSERT INTO Settings VALUES ('null', NULL);
            INSERT INTO Settings VALUES (NULL, 'orphan');
            "#,
        );

        let rows = source.fetch(&SettingsQuery::new()).unwrap();
        assert_eq!(
            rows,
            vec![
                ("int".to_string(), Some("42".to_string())),
                ("real".to_string(), Some("1.5".to_string())),
                ("null".to_string(), None),
            ]
        );
    }

    #[test]
    fn test_fetch_missing_table_fails() {
        let source = memory_source("CREATE TABLE Other (x TEXT);");
        let result = source.fetch(&SettingsQuery::new());
        assert!(matches!(result, Err(ConfigError::LoadError(_))));
    }

    #[test]
    fn test_close_is_idempotent() {
        let source = memory_source("CREATE TABLE Settings (\"Key\" TEXT, \"Value\" TEXT);");
        assert!(source.is_open());

        source.close().unwrap();
        assert!(!source.is_open());
        source.close().unwrap();

        // No path to reopen an adopted in-memory connection
        let result = source.fetch(&SettingsQuery::new());
        assert!(matches!(result, Err(ConfigError::ConnectionError(_))));
    }

    #[test]
    fn test_lazy_open_from_path() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let db_path = temp_dir.path().join("settings.db");
        {
            let connection = Connection::open(&db_path).unwrap();
            connection
                .execute_batch(
                    r#"
                    CREATE TABLE Settings ("Key" TEXT, "Value" TEXT);
                    INSERT INTO Settings VALUES ('A', '1');
                    "#,
                )
                .unwrap();
        }

        let source = SqliteRowSource::new(&db_path);
        assert!(!source.is_open());

        let rows = source.fetch(&SettingsQuery::new()).unwrap();
        assert_eq!(rows, vec![("A".to_string(), Some("1".to_string()))]);
        assert!(source.is_open());

        // Closed sources with a path reconnect on the next fetch
        source.close().unwrap();
        assert!(source.fetch(&SettingsQuery::new()).is_ok());
    }

    #[test]
    fn test_missing_file_fails_to_open() {
        let source = SqliteRowSource::new("/nonexistent/dir/settings.db");
        let result = source.fetch(&SettingsQuery::new());
        assert!(matches!(result, Err(ConfigError::ConnectionError(_))));
        assert!(source.name().starts_with("sqlite:"));
    }
}
