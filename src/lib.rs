//! # reloadable-sql-config
//!
//! Key-value configuration read from a SQL settings table, kept fresh by
//! pluggable change watchers.
//!
//! ## Overview
//!
//! `reloadable-sql-config` loads a two-column `(key, value)` table into an
//! immutable [`Snapshot`](core::Snapshot) and republishes it whenever a
//! [`ChangeWatcher`](notify::ChangeWatcher) fires:
//! - Lock-free snapshot reads using `arc-swap`
//! - Atomic replacement: readers never see a half-loaded table
//! - Fail-open reloads: a broken source keeps the last good settings
//! - One-shot notifications re-armed after every reload
//! - A process-wide manual reload hook
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use reloadable_sql_config::prelude::*;
//! use reloadable_sql_config::sources::SqliteRowSource;
//! use std::time::Duration;
//!
//! # async fn example() -> reloadable_sql_config::error::Result<()> {
//! // Reads "Settings"("Key", "Value") and reloads every 30 seconds
//! let provider = SqlConfigSource::new(SqliteRowSource::new("app.db"))
//!     .with_auto_reload(Duration::from_secs(30))
//!     .build()?;
//!
//! let snapshot = provider.snapshot();
//! println!("Site name: {:?}", snapshot.get("Site:Name"));
//!
//! // Force a reload from anywhere in the process
//! SqlConfigSource::reload();
//! # Ok(())
//! # }
//! ```
//!
//! ## Failure policy
//!
//! Reloads favor availability over freshness. When the row source fails
//! (connection refused, missing table), the error is logged through `tracing`
//! and the previous snapshot stays current. During a sustained outage the
//! settings silently stop updating; they never disappear. Use
//! [`SqlConfigProvider::try_reload`](core::SqlConfigProvider::try_reload) or
//! [`last_error`](core::SqlConfigProvider::last_error) to observe failures.
//!
//! ## Feature Flags
//!
//! - `sqlite` (default): [`SqliteRowSource`](sources::SqliteRowSource) via `rusqlite`
//! - `metrics`: OpenTelemetry reload metrics

#![warn(missing_docs, rust_2024_compatibility)]
#![deny(unsafe_code)]

pub mod core;
pub mod error;
pub mod notify;
pub mod sources;

#[cfg(feature = "metrics")]
pub mod metrics;

/// Convenient re-exports for common usage patterns.
pub mod prelude {
    pub use crate::core::{Snapshot, SqlConfigProvider, SqlConfigSource, SqlSourceOptions};
    pub use crate::error::{ConfigError, Result};
    pub use crate::notify::{ChangeWatcher, ManualWatcher, PeriodicWatcher};
    pub use crate::sources::{RowSource, SettingsQuery};
}
