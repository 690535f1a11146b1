use super::{
    DeleteOptions, DeleteResult, FindQuery, FoundRecord, GetResult, RecordMetadata, RecordRef,
    SetOptions, SetResult, StateStore, StoredRecord,
};
use crate::core::{DocError, Result, now_millis};
use async_trait::async_trait;
use serde_json::{Map as JsonMap, Value as JsonValue};
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct Collection {
    records: HashMap<String, Entry>,
    next_seq: u64,
}

#[derive(Debug, Clone)]
struct Entry {
    seq: u64,
    record: StoredRecord,
}

impl Collection {
    fn ordered(&self) -> Vec<(&String, &Entry)> {
        let mut entries: Vec<_> = self.records.iter().collect();
        entries.sort_by_key(|(_, entry)| entry.seq);
        entries
    }

    fn upsert(&mut self, id: String, record: StoredRecord) {
        match self.records.get_mut(&id) {
            Some(entry) => entry.record = record,
            None => {
                let seq = self.next_seq;
                self.next_seq += 1;
                self.records.insert(id, Entry { seq, record });
            }
        }
    }
}

/// In-process [`StateStore`] keeping records in insertion order.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records in a collection.
    pub async fn count(&self, collection: &str) -> usize {
        let collections = self.collections.read().await;
        collections.get(collection).map_or(0, |c| c.records.len())
    }

    fn set_record(
        collection: &mut Collection,
        id: String,
        value: JsonValue,
        options: SetOptions,
    ) -> SetResult {
        let now = now_millis();
        let existing = collection.records.get(&id).map(|entry| &entry.record);

        let item = match (existing, options.merge) {
            (Some(current), true) => merge_values(&current.item, value),
            _ => value,
        };

        let created_at = existing.map_or(now, |current| current.metadata.created_at);
        let mut metadata = match (options.metadata, existing) {
            (Some(metadata), _) => metadata,
            (None, Some(current)) => current.metadata.clone(),
            (None, None) => RecordMetadata::default(),
        };
        metadata.created_at = created_at;
        metadata.updated_at = now;

        collection.upsert(
            id.clone(),
            StoredRecord {
                item: item.clone(),
                metadata: metadata.clone(),
            },
        );

        SetResult {
            id: Some(id),
            item,
            metadata: Some(metadata),
        }
    }

    fn set_collection(
        collection: &mut Collection,
        value: JsonValue,
        merge: bool,
    ) -> Result<SetResult> {
        let JsonValue::Object(entries) = &value else {
            return Err(DocError::InvalidRecord(
                "collection value must be an object keyed by record id".to_string(),
            ));
        };

        let mut records = Vec::with_capacity(entries.len());
        for (id, raw) in entries {
            let record: StoredRecord = serde_json::from_value(raw.clone()).map_err(|e| {
                DocError::InvalidRecord(format!("record '{}' is malformed: {}", id, e))
            })?;
            records.push((id.clone(), record));
        }

        if !merge {
            collection.records.clear();
        }
        for (id, record) in records {
            collection.upsert(id, record);
        }

        Ok(SetResult {
            id: None,
            item: value,
            metadata: None,
        })
    }

    fn resolve(collections: &HashMap<String, Collection>, reference: &RecordRef) -> Option<FoundRecord> {
        let entry = collections
            .get(&reference.collection)?
            .records
            .get(&reference.id)?;
        Some(FoundRecord {
            collection: reference.collection.clone(),
            id: reference.id.clone(),
            item: entry.record.item.clone(),
            metadata: entry.record.metadata.clone(),
            expand: Vec::new(),
        })
    }
}

/// Shallow merge of two objects; non-objects are replaced.
fn merge_values(current: &JsonValue, incoming: JsonValue) -> JsonValue {
    match (current, incoming) {
        (JsonValue::Object(base), JsonValue::Object(patch)) => {
            let mut merged: JsonMap<String, JsonValue> = base.clone();
            merged.extend(patch);
            JsonValue::Object(merged)
        }
        (_, incoming) => incoming,
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn get(&self, collection: &str, id: Option<&str>) -> Result<GetResult> {
        let collections = self.collections.read().await;
        let Some(records) = collections.get(collection) else {
            return Ok(GetResult::empty());
        };

        match id {
            Some(id) => Ok(records
                .records
                .get(id)
                .map(|entry| GetResult {
                    item: entry.record.item.clone(),
                    metadata: Some(entry.record.metadata.clone()),
                    is_empty: false,
                })
                .unwrap_or_else(GetResult::empty)),
            None => {
                let mut contents = JsonMap::new();
                for (id, entry) in records.ordered() {
                    contents.insert(id.clone(), serde_json::to_value(&entry.record)?);
                }
                Ok(GetResult {
                    is_empty: contents.is_empty(),
                    item: JsonValue::Object(contents),
                    metadata: None,
                })
            }
        }
    }

    async fn set(
        &self,
        collection: &str,
        value: JsonValue,
        options: SetOptions,
    ) -> Result<SetResult> {
        let mut collections = self.collections.write().await;
        let target = collections.entry(collection.to_string()).or_default();

        match options.id.clone() {
            Some(id) => Ok(Self::set_record(target, id, value, options)),
            None => Self::set_collection(target, value, options.merge),
        }
    }

    async fn delete(
        &self,
        collection: &str,
        id: &str,
        options: DeleteOptions,
    ) -> Result<DeleteResult> {
        let mut collections = self.collections.write().await;
        let exists = collections
            .get(collection)
            .is_some_and(|c| c.records.contains_key(id));
        if !exists {
            return Ok(DeleteResult {
                deleted: false,
                in_use: false,
            });
        }

        let target = RecordRef::new(collection, id);
        let referenced = collections.iter().any(|(name, c)| {
            c.records.iter().any(|(other_id, entry)| {
                !(name == collection && other_id == id)
                    && entry.record.metadata.relations.contains(&target)
            })
        });

        if referenced && !options.cascade {
            return Ok(DeleteResult {
                deleted: false,
                in_use: true,
            });
        }

        if referenced {
            for c in collections.values_mut() {
                for entry in c.records.values_mut() {
                    entry.record.metadata.relations.retain(|r| r != &target);
                }
            }
        }

        let removed = collections
            .get_mut(collection)
            .and_then(|c| c.records.remove(id))
            .is_some();

        Ok(DeleteResult {
            deleted: removed,
            in_use: false,
        })
    }

    async fn find(&self, collection: &str, query: FindQuery) -> Result<Vec<FoundRecord>> {
        let collections = self.collections.read().await;
        let Some(records) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        let found = records
            .ordered()
            .into_iter()
            .filter(|(_, entry)| query.conditions.iter().all(|c| c.matches(&entry.record.item)))
            .map(|(id, entry)| {
                let expand = if query.expand {
                    entry
                        .record
                        .metadata
                        .relations
                        .iter()
                        .filter_map(|r| Self::resolve(&collections, r))
                        .collect()
                } else {
                    Vec::new()
                };
                FoundRecord {
                    collection: collection.to_string(),
                    id: id.clone(),
                    item: entry.record.item.clone(),
                    metadata: entry.record.metadata.clone(),
                    expand,
                }
            })
            .collect();

        Ok(found)
    }
}
