//! Built-in metrics for settings reloads.
//!
//! Provides OpenTelemetry metrics tracking:
//! - Reload attempts/success/failures
//! - Fetch duration
//! - Snapshot size and age
//!
//! # Examples
//!
//! ```rust,no_run
//! use reloadable_sql_config::prelude::*;
//! use reloadable_sql_config::sources::SqliteRowSource;
//! use opentelemetry::global;
//!
//! # fn example() -> Result<()> {
//! let meter = global::meter("my-app");
//!
//! let provider = SqlConfigSource::new(SqliteRowSource::new("app.db"))
//!     .with_metrics(meter)
//!     .build()?;
//! # Ok(())
//! # }
//! ```

mod config_metrics;

pub use config_metrics::ConfigMetrics;
