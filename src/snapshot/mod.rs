//! Collection snapshots
//!
//! Each collection is written as one JSON document:
//!
//! ```text
//! { "collection": "action/sequences", "item": { <id>: { item, metadata } }, "createdAt": 1700000000000 }
//! ```
//!
//! - `manager.rs` - per-collection state machine and write pipeline
//! - `state.rs` - lock / queue / sticky error bookkeeping
//! - `storage.rs` - file target with temp-file-then-rename writes

mod manager;
mod state;
mod storage;

pub use manager::SnapshotManager;
pub use state::{ErrorRecord, SnapshotState, SnapshotStatus};
pub use storage::{FsSnapshotStorage, SnapshotStorage, snapshot_file_name, temp_file_name};

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

/// On-disk snapshot document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotFile {
    pub collection: String,
    pub item: JsonValue,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    #[error("Collection '{0}' does not exist or is empty")]
    NoSuchCollection(String),

    #[error("Snapshot of '{collection}' is {size} bytes, over the {limit} byte limit")]
    SizeExceeded {
        collection: String,
        size: usize,
        limit: usize,
    },

    #[error("Snapshot queue limit of {limit} reached for '{collection}'")]
    QueueLimitReached { collection: String, limit: usize },

    #[error("Snapshot write for '{collection}' timed out after {timeout_ms}ms")]
    Timeout { collection: String, timeout_ms: u64 },

    #[error("Snapshot write for '{collection}' failed: {message}")]
    WriteFailed { collection: String, message: String },

    #[error("Snapshot of '{collection}' could not be serialized: {message}")]
    Serialize { collection: String, message: String },
}

impl SnapshotError {
    pub fn code(&self) -> &'static str {
        match self {
            SnapshotError::NoSuchCollection(_) => "NO_SUCH_COLLECTION",
            SnapshotError::SizeExceeded { .. } => "SNAPSHOT_SIZE_EXCEEDED",
            SnapshotError::QueueLimitReached { .. } => "QUEUE_LIMIT_REACHED",
            SnapshotError::Timeout { .. } => "SNAPSHOT_TIMEOUT",
            SnapshotError::WriteFailed { .. } => "SNAPSHOT_WRITE_FAILED",
            SnapshotError::Serialize { .. } => "SNAPSHOT_SERIALIZE_FAILED",
        }
    }

    /// Timeouts and write failures are retried; everything else is final.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SnapshotError::Timeout { .. } | SnapshotError::WriteFailed { .. }
        )
    }
}
