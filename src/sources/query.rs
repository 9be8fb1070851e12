//! Settings table query description.

use crate::error::{ConfigError, Result};

/// Default settings table name.
pub const DEFAULT_TABLE: &str = "Settings";
/// Default key column name.
pub const DEFAULT_KEY_COLUMN: &str = "Key";
/// Default value column name.
pub const DEFAULT_VALUE_COLUMN: &str = "Value";

/// Identifies the two-column projection a provider reads its settings from.
///
/// # Examples
///
/// ```rust
/// use reloadable_sql_config::sources::SettingsQuery;
///
/// let query = SettingsQuery::new()
///     .with_schema("cfg")
///     .with_table("Configurations")
///     .with_columns("K", "V");
///
/// assert_eq!(
///     query.to_sql(),
///     r#"SELECT "K", "V" FROM "cfg"."Configurations""#
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsQuery {
    schema: Option<String>,
    table: String,
    key_column: String,
    value_column: String,
}

impl SettingsQuery {
    /// Create a query against `Settings(Key, Value)` with no schema.
    pub fn new() -> Self {
        Self {
            schema: None,
            table: DEFAULT_TABLE.to_string(),
            key_column: DEFAULT_KEY_COLUMN.to_string(),
            value_column: DEFAULT_VALUE_COLUMN.to_string(),
        }
    }

    /// Qualify the table with a schema. An empty schema means unqualified.
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        let schema = schema.into();
        self.schema = if schema.is_empty() { None } else { Some(schema) };
        self
    }

    /// Set the table name.
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Set the key and value column names.
    pub fn with_columns(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.key_column = key.into();
        self.value_column = value.into();
        self
    }

    /// The schema, if the table is qualified.
    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    /// The table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// The key column name.
    pub fn key_column(&self) -> &str {
        &self.key_column
    }

    /// The value column name.
    pub fn value_column(&self) -> &str {
        &self.value_column
    }

    /// Reject empty table or column names.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidIdentifier`] naming the first empty identifier.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("table", &self.table),
            ("key column", &self.key_column),
            ("value column", &self.value_column),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::invalid_identifier(field, "must not be empty"));
            }
        }
        Ok(())
    }

    /// The fully-qualified, quoted table reference.
    pub fn qualified_table(&self) -> String {
        match &self.schema {
            Some(schema) => format!(
                "{}.{}",
                quote_identifier(schema),
                quote_identifier(&self.table)
            ),
            None => quote_identifier(&self.table),
        }
    }

    /// Render the `SELECT` statement for this query.
    ///
    /// Identifiers are double-quoted so names like `Key` and `Value` that clash
    /// with SQL keywords are safe.
    pub fn to_sql(&self) -> String {
        format!(
            "SELECT {}, {} FROM {}",
            quote_identifier(&self.key_column),
            quote_identifier(&self.value_column),
            self.qualified_table()
        )
    }
}

impl Default for SettingsQuery {
    fn default() -> Self {
        Self::new()
    }
}

/// Quote an identifier per ANSI SQL, doubling embedded quotes.
fn quote_identifier(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}
