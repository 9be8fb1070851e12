//! Immutable point-in-time view of the settings table.

use crate::error::{ConfigError, Result};
use crate::sources::SettingRow;
use serde::de::DeserializeOwned;
use std::collections::{BTreeSet, HashMap};

/// Delimiter between segments of hierarchical keys (`"Site:Name"`).
pub const KEY_DELIMITER: char = ':';

/// The settings loaded by one successful reload.
///
/// A snapshot is never modified after it is built; providers replace it
/// wholesale. Values are `None` when the source row held NULL.
///
/// # Examples
///
/// ```rust
/// use reloadable_sql_config::core::Snapshot;
///
/// let snapshot = Snapshot::from_rows(vec![
///     ("Site:Name".to_string(), Some("example.com".to_string())),
///     ("Site:Port".to_string(), Some("8080".to_string())),
/// ]);
///
/// assert_eq!(snapshot.get("Site:Name"), Some("example.com"));
/// assert_eq!(snapshot.section("Site").get("Port"), Some("8080"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    values: HashMap<String, Option<String>>,
}

impl Snapshot {
    /// Build a snapshot from rows in table order. Later duplicate keys win.
    pub fn from_rows(rows: impl IntoIterator<Item = SettingRow>) -> Self {
        let mut values = HashMap::new();
        for (key, value) in rows {
            values.insert(key, value);
        }
        Self { values }
    }

    /// Get the value for `key`. Absent keys and NULL values both yield `None`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(|v| v.as_deref())
    }

    /// Get the raw entry for `key`, distinguishing NULL (`Some(None)`) from absent (`None`).
    pub fn entry(&self, key: &str) -> Option<Option<&str>> {
        self.values.get(key).map(|v| v.as_deref())
    }

    /// Whether `key` is present (even with a NULL value).
    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the snapshot holds no keys.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over all entries in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_deref()))
    }

    /// The entries under `prefix`, with `prefix:` stripped from each key.
    pub fn section(&self, prefix: &str) -> Snapshot {
        let values = self
            .values
            .iter()
            .filter_map(|(key, value)| {
                strip_section(key, prefix).map(|rest| (rest.to_string(), value.clone()))
            })
            .collect();
        Snapshot { values }
    }

    /// The distinct next-level key segments under `prefix`, sorted.
    ///
    /// An empty prefix lists the top-level segments.
    pub fn child_keys(&self, prefix: &str) -> Vec<String> {
        let children: BTreeSet<&str> = self
            .values
            .keys()
            .filter_map(|key| {
                if prefix.is_empty() {
                    Some(key.as_str())
                } else {
                    strip_section(key, prefix)
                }
            })
            .map(|rest| rest.split(KEY_DELIMITER).next().unwrap_or(rest))
            .collect();
        children.into_iter().map(str::to_string).collect()
    }

    /// Deserialize the snapshot into a typed settings value.
    ///
    /// Colon-delimited keys become nested paths, so `Server:Port` binds to
    /// `server.port`. NULL values are skipped. String values are coerced to
    /// numbers and booleans where the target field needs them.
    ///
    /// Paths are lowercased before deserializing. Target fields must use
    /// lowercase names, so a `#[serde(rename_all = "PascalCase")]` struct will
    /// not bind, and keys differing only in case collapse into one field.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::DeserializationError`] if the keys conflict or
    /// the values do not fit `T`.
    pub fn bind<T>(&self) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let mut entries: Vec<_> = self
            .values
            .iter()
            .filter_map(|(key, value)| value.as_ref().map(|v| (key, v)))
            .collect();
        // Deterministic override order for overlapping paths
        entries.sort_by(|a, b| a.0.cmp(b.0));

        let mut builder = config::Config::builder();
        for (key, value) in entries {
            let path = key.replace(KEY_DELIMITER, ".");
            builder = builder.set_override(&path, value.clone()).map_err(|e| {
                ConfigError::DeserializationError(format!("Failed to set '{}': {}", key, e))
            })?;
        }

        let config = builder.build().map_err(|e| {
            ConfigError::DeserializationError(format!("Failed to build configuration: {}", e))
        })?;

        config.try_deserialize::<T>().map_err(|e| {
            ConfigError::DeserializationError(format!("Failed to deserialize configuration: {}", e))
        })
    }

    /// Copy the entries into a plain map.
    pub fn to_map(&self) -> HashMap<String, Option<String>> {
        self.values.clone()
    }
}

fn strip_section<'a>(key: &'a str, prefix: &str) -> Option<&'a str> {
    key.strip_prefix(prefix)?.strip_prefix(KEY_DELIMITER)
}
