// ============================================================================
// RustMemoDoc Library
// ============================================================================

pub mod condition;
pub mod core;
pub mod facade;
pub mod snapshot;
pub mod store;

// Re-export main types for convenience
pub use condition::{Condition, ConditionError, Operator, Predicate, compile};
pub use core::{DocError, Result, SnapshotConfig, StoreConfig};
pub use facade::{CollectionFacade, DeleteQuery, GetQuery, QueryError, SavedItem};
pub use snapshot::{
    ErrorRecord, FsSnapshotStorage, SnapshotError, SnapshotFile, SnapshotManager, SnapshotStatus,
    SnapshotStorage,
};
pub use store::{MemoryStore, RecordMetadata, RecordRef, StateStore};
