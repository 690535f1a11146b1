pub mod config;
pub mod error;

pub use config::{SnapshotConfig, StoreConfig};
pub use error::{DocError, Result};

/// Milliseconds since the unix epoch, the timestamp unit used across snapshots.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
