//! Core configuration types: snapshot, provider, and source descriptor.

mod options;
mod provider;
mod snapshot;
mod source;

pub use options::SqlSourceOptions;
pub use provider::{LoadStats, SqlConfigProvider};
pub use snapshot::{KEY_DELIMITER, Snapshot};
pub use source::SqlConfigSource;
