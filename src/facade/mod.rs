//! Query façade
//!
//! The operations a routing layer calls: `seed` at startup, then `get`,
//! `set` and `delete` per request. Mutations trigger snapshots; reads never do.

mod error;
mod params;

pub use error::{ErrorResponse, QueryError};
pub use params::{DEFAULT_PER_PAGE, DeleteQuery, GetQuery, SavedItem, Window};

use crate::condition::compile;
use crate::core::{DocError, StoreConfig};
use crate::snapshot::{FsSnapshotStorage, SnapshotManager};
use crate::store::{DeleteOptions, FindQuery, FoundRecord, RecordMetadata, SetOptions, StateStore};
use std::sync::Arc;
use tracing::{Level, event};
use uuid::Uuid;

pub type QueryResult<T> = std::result::Result<T, QueryError>;

/// Binds a [`StateStore`] to a [`SnapshotManager`].
#[derive(Clone)]
pub struct CollectionFacade {
    store: Arc<dyn StateStore>,
    snapshots: SnapshotManager,
}

impl CollectionFacade {
    pub fn new(snapshots: SnapshotManager) -> Self {
        Self {
            store: snapshots.store().clone(),
            snapshots,
        }
    }

    /// Façade writing snapshot files under `config.data_dir`.
    pub fn open(config: &StoreConfig, store: Arc<dyn StateStore>) -> crate::core::Result<Self> {
        config.snapshot.validate()?;
        let storage = Arc::new(FsSnapshotStorage::new(&config.data_dir));
        let snapshots = SnapshotManager::new(store, storage, config.snapshot.clone());
        Ok(Self::new(snapshots))
    }

    pub fn snapshots(&self) -> &SnapshotManager {
        &self.snapshots
    }

    pub fn store(&self) -> &Arc<dyn StateStore> {
        &self.store
    }

    /// Merge the snapshot file of `name` into the store. Returns whether a
    /// file was found. The collection's snapshot state is reset either way.
    pub async fn seed(&self, name: &str) -> QueryResult<bool> {
        let loaded = self.snapshots.load(name).await?;
        let seeded = match loaded {
            Some(file) => {
                if file.collection != name {
                    return Err(DocError::InvalidRecord(format!(
                        "snapshot file for '{}' holds collection '{}'",
                        name, file.collection
                    ))
                    .into());
                }
                self.store
                    .set(name, file.item, SetOptions::default().merge(true))
                    .await?;
                event!(
                    Level::INFO,
                    collection = name,
                    created_at = file.created_at,
                    "collection seeded from snapshot"
                );
                true
            }
            None => {
                event!(Level::DEBUG, collection = name, "no snapshot to seed from");
                false
            }
        };
        self.snapshots.reset(name);
        Ok(seeded)
    }

    /// Records of `collections` in collection order, then store order.
    ///
    /// Explicit ids win over a `where` clause; ids that do not exist are
    /// skipped. The pagination window applies per collection.
    pub async fn get(&self, collections: &[String], query: &GetQuery) -> QueryResult<Vec<SavedItem>> {
        let condition = query.where_clause.as_deref().map(compile).transpose()?;
        let window = query.window();
        let mut items = Vec::new();

        for collection in collections {
            let found = if query.ids.is_empty() {
                let find = FindQuery {
                    conditions: condition.iter().cloned().collect(),
                    expand: query.expand,
                };
                self.store
                    .find(collection, find)
                    .await?
                    .into_iter()
                    .map(SavedItem::from)
                    .collect()
            } else {
                self.get_by_ids(collection, &query.ids, query.expand).await?
            };
            items.extend(window.apply(found));
        }
        Ok(items)
    }

    async fn get_by_ids(
        &self,
        collection: &str,
        ids: &[String],
        expand: bool,
    ) -> QueryResult<Vec<SavedItem>> {
        let mut items = Vec::with_capacity(ids.len());
        for id in ids {
            let record = self.store.get(collection, Some(id.as_str())).await?;
            if record.is_empty {
                continue;
            }
            let expanded = match (&record.metadata, expand) {
                (Some(metadata), true) => Some(self.expand(metadata).await?),
                _ => None,
            };
            items.push(SavedItem {
                id: Some(id.clone()),
                item: record.item,
                metadata: record.metadata,
                expand: expanded,
                collection: collection.to_string(),
            });
        }
        Ok(items)
    }

    async fn expand(&self, metadata: &RecordMetadata) -> QueryResult<Vec<SavedItem>> {
        let mut related = Vec::with_capacity(metadata.relations.len());
        for relation in &metadata.relations {
            let record = self
                .store
                .get(&relation.collection, Some(relation.id.as_str()))
                .await?;
            if record.is_empty {
                continue;
            }
            related.push(SavedItem {
                id: Some(relation.id.clone()),
                item: record.item,
                metadata: record.metadata,
                expand: None,
                collection: relation.collection.clone(),
            });
        }
        Ok(related)
    }

    /// Write `items`, owned by their own `metadata.userId` or else `user_id`.
    ///
    /// Every item is checked before anything is written. Afterwards one
    /// snapshot is requested per distinct collection.
    pub async fn set(&self, items: Vec<SavedItem>, user_id: Option<&str>) -> QueryResult<Vec<SavedItem>> {
        for (index, item) in items.iter().enumerate() {
            if item.collection.is_empty() {
                return Err(QueryError::BadRequest(format!(
                    "item {index} has no collection"
                )));
            }
            let owned = item
                .metadata
                .as_ref()
                .is_some_and(|m| m.user_id.is_some());
            if !owned && user_id.is_none() {
                return Err(QueryError::MissingOwner {
                    index,
                    collection: item.collection.clone(),
                });
            }
        }

        let mut saved = Vec::with_capacity(items.len());
        let mut touched: Vec<String> = Vec::new();

        for item in items {
            let id = item.id.unwrap_or_else(|| Uuid::new_v4().to_string());
            let mut metadata = item.metadata.unwrap_or_default();
            if metadata.user_id.is_none() {
                metadata.user_id = user_id.map(str::to_string);
            }

            let result = self
                .store
                .set(&item.collection, item.item, SetOptions::record(&id).metadata(metadata))
                .await?;

            if !touched.contains(&item.collection) {
                touched.push(item.collection.clone());
            }
            saved.push(SavedItem {
                id: result.id.or(Some(id)),
                item: result.item,
                metadata: result.metadata,
                expand: None,
                collection: item.collection,
            });
        }

        for collection in &touched {
            self.snapshots.request_snapshot(collection);
        }
        Ok(saved)
    }

    /// Delete every id from every collection; returns how many were removed.
    ///
    /// The first failed deletion aborts the request. A sticky snapshot error
    /// on a collection fails the request after its deletions went through.
    pub async fn delete(&self, collections: &[String], ids: &[String], cascade: bool) -> QueryResult<usize> {
        if ids.is_empty() {
            return Err(QueryError::BadRequest("id is required".to_string()));
        }

        let mut deleted = 0;
        for collection in collections {
            for id in ids {
                let result = self
                    .store
                    .delete(collection, id, DeleteOptions { cascade })
                    .await?;
                if !result.deleted {
                    let reason = if result.in_use {
                        "record is in use"
                    } else {
                        "record not found"
                    };
                    return Err(QueryError::DeleteFailed {
                        collection: collection.clone(),
                        id: id.clone(),
                        reason,
                    });
                }
                deleted += 1;
            }

            self.snapshots.request_snapshot(collection);
            if let Some(record) = self.snapshots.error(collection) {
                return Err(QueryError::Snapshot(record));
            }
        }
        Ok(deleted)
    }

    pub async fn delete_query(&self, collections: &[String], query: &DeleteQuery) -> QueryResult<usize> {
        self.delete(collections, &query.ids, query.cascade).await
    }
}

impl From<FoundRecord> for SavedItem {
    fn from(record: FoundRecord) -> Self {
        let expand = (!record.expand.is_empty())
            .then(|| record.expand.into_iter().map(SavedItem::from).collect());
        SavedItem {
            id: Some(record.id),
            item: record.item,
            metadata: Some(record.metadata),
            expand,
            collection: record.collection,
        }
    }
}
