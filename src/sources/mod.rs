//! Row source implementations.

mod query;
mod row_source;

#[cfg(feature = "sqlite")]
mod sqlite;

pub use query::{DEFAULT_KEY_COLUMN, DEFAULT_TABLE, DEFAULT_VALUE_COLUMN, SettingsQuery};
pub use row_source::{RowSource, SettingRow};

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteRowSource;
