//! State store contract
//!
//! The snapshot manager and the query façade only talk to collections through
//! [`StateStore`]. [`MemoryStore`] is the in-process implementation.

mod memory;

pub use memory::MemoryStore;

use crate::condition::Condition;
use crate::core::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Pointer to a record in another (or the same) collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordRef {
    pub collection: String,
    pub id: String,
}

impl RecordRef {
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RecordMetadata {
    /// Owner of the record
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// Outbound references, used for `expand` and in-use checks
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub relations: Vec<RecordRef>,

    pub created_at: i64,
    pub updated_at: i64,
}

impl RecordMetadata {
    pub fn owned_by(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ..Self::default()
        }
    }

    pub fn with_relation(mut self, relation: RecordRef) -> Self {
        self.relations.push(relation);
        self
    }
}

/// One record as held by the store and as written into a snapshot file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub item: JsonValue,
    #[serde(default)]
    pub metadata: RecordMetadata,
}

/// Result of [`StateStore::get`].
///
/// Without an id, `item` is the whole collection as `{ id: StoredRecord }`.
#[derive(Debug, Clone, PartialEq)]
pub struct GetResult {
    pub item: JsonValue,
    pub metadata: Option<RecordMetadata>,
    pub is_empty: bool,
}

impl GetResult {
    pub fn empty() -> Self {
        Self {
            item: JsonValue::Null,
            metadata: None,
            is_empty: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SetOptions {
    /// Target record; `None` addresses the whole collection
    pub id: Option<String>,
    pub metadata: Option<RecordMetadata>,
    /// Shallow-merge into the existing value instead of replacing it
    pub merge: bool,
}

impl SetOptions {
    pub fn record(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    pub fn metadata(mut self, metadata: RecordMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn merge(mut self, merge: bool) -> Self {
        self.merge = merge;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SetResult {
    pub id: Option<String>,
    pub item: JsonValue,
    pub metadata: Option<RecordMetadata>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DeleteOptions {
    /// Strip inbound references instead of refusing the delete
    pub cascade: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteResult {
    pub deleted: bool,
    pub in_use: bool,
}

#[derive(Debug, Clone, Default)]
pub struct FindQuery {
    /// All conditions must match
    pub conditions: Vec<Condition>,
    /// Resolve one level of `metadata.relations`
    pub expand: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FoundRecord {
    pub collection: String,
    pub id: String,
    pub item: JsonValue,
    pub metadata: RecordMetadata,
    pub expand: Vec<FoundRecord>,
}

#[async_trait]
pub trait StateStore: Send + Sync {
    async fn get(&self, collection: &str, id: Option<&str>) -> Result<GetResult>;

    async fn set(&self, collection: &str, value: JsonValue, options: SetOptions)
    -> Result<SetResult>;

    async fn delete(
        &self,
        collection: &str,
        id: &str,
        options: DeleteOptions,
    ) -> Result<DeleteResult>;

    async fn find(&self, collection: &str, query: FindQuery) -> Result<Vec<FoundRecord>>;
}
