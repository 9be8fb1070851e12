//! Row source trait.

use super::SettingsQuery;
use crate::error::Result;

/// A single `(key, value)` row read from a settings table.
///
/// The value is `None` when the underlying column is NULL.
pub type SettingRow = (String, Option<String>);

/// Trait for sources that can produce settings rows on demand.
///
/// Implement this trait to back a provider with a custom store (another SQL
/// engine, an HTTP endpoint, an in-memory fixture for tests).
///
/// A row source owns at most one connection. It should open it lazily on the
/// first [`fetch`](RowSource::fetch) and release it in
/// [`close`](RowSource::close). Both methods may be called from any thread.
pub trait RowSource: Send + Sync {
    /// Fetch every row selected by `query`, in table order.
    ///
    /// Duplicate keys are allowed; the provider keeps the last one.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be opened or the query fails.
    fn fetch(&self, query: &SettingsQuery) -> Result<Vec<SettingRow>>;

    /// Release the connection, if one is open.
    ///
    /// Closing an already-closed source must succeed.
    fn close(&self) -> Result<()> {
        Ok(())
    }

    /// Get a human-readable name for this source (for logging/debugging).
    fn name(&self) -> String;
}
