//! Error types for reloadable-sql-config.

/// Result type alias for reloadable-sql-config operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur when loading or watching configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to load configuration rows from the row source.
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    /// The row source connection could not be opened or used.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// A schema, table or column identifier is unusable.
    #[error("Invalid identifier for {field}: {reason}")]
    InvalidIdentifier {
        /// Which identifier was rejected (e.g. "table")
        field: &'static str,
        /// Why it was rejected
        reason: String,
    },

    /// Failed to bind a snapshot into a typed value.
    #[error("Failed to deserialize configuration: {0}")]
    DeserializationError(String),

    /// The change watcher could not be created or started.
    #[error("Watch error: {0}")]
    WatchError(String),

    /// The provider has been disposed and no longer loads.
    #[error("Configuration provider has been disposed")]
    Disposed,

    #[cfg(feature = "sqlite")]
    /// SQLite reported an error.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl ConfigError {
    /// Create an invalid identifier error.
    pub fn invalid_identifier(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidIdentifier {
            field,
            reason: reason.into(),
        }
    }
}
