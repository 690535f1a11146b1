use super::state::{Admission, ErrorRecord, SnapshotState, SnapshotStatus};
use super::storage::{SnapshotStorage, snapshot_file_name, temp_file_name};
use super::{SnapshotError, SnapshotFile};
use crate::core::{Result, SnapshotConfig, now_millis};
use crate::store::StateStore;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;
use tokio::time::{sleep, timeout};
use tracing::{Instrument, Level, event, info_span};

/// State and wake-up signal for one collection.
#[derive(Debug, Default)]
struct CollectionSlot {
    state: Mutex<SnapshotState>,
    idle: Notify,
}

impl CollectionSlot {
    fn lock(&self) -> MutexGuard<'_, SnapshotState> {
        // Critical sections never panic, so a poisoned state is still consistent
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct ManagerInner {
    store: Arc<dyn StateStore>,
    storage: Arc<dyn SnapshotStorage>,
    config: SnapshotConfig,
    slots: Mutex<HashMap<String, Arc<CollectionSlot>>>,
}

/// Writes whole collections to durable storage.
///
/// Writes for one collection are serialized by its lock; requests arriving
/// while a write is in flight are coalesced into a single follow-up write of
/// whatever the collection holds at that point. Different collections never
/// wait on each other.
///
/// Cloning is cheap and all clones share the same registry.
#[derive(Clone)]
pub struct SnapshotManager {
    inner: Arc<ManagerInner>,
}

impl SnapshotManager {
    pub fn new(
        store: Arc<dyn StateStore>,
        storage: Arc<dyn SnapshotStorage>,
        config: SnapshotConfig,
    ) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                store,
                storage,
                config,
                slots: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn config(&self) -> &SnapshotConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &Arc<dyn StateStore> {
        &self.inner.store
    }

    /// Ask for `collection` to be written. Never blocks and never reports the
    /// outcome; failures show up later through [`SnapshotManager::error`].
    ///
    /// Must be called from within a tokio runtime.
    pub fn request_snapshot(&self, collection: &str) {
        let slot = self.slot(collection);
        let admission = slot
            .lock()
            .admit(collection, now_millis(), &self.inner.config);

        match admission {
            Admission::Acquired => self.spawn_pipeline(collection.to_string(), slot),
            Admission::Queued(queued) => {
                event!(Level::DEBUG, collection, queued, "snapshot request coalesced");
            }
            Admission::Suppressed => {
                event!(
                    Level::DEBUG,
                    collection,
                    "snapshot request suppressed by sticky error"
                );
            }
            Admission::Overflow => {
                event!(
                    Level::ERROR,
                    collection,
                    limit = self.inner.config.max_queue_size,
                    "snapshot queue limit reached"
                );
            }
        }
    }

    pub fn status(&self, collection: &str) -> SnapshotStatus {
        self.existing_slot(collection)
            .map_or(SnapshotStatus::Idle, |slot| slot.lock().status())
    }

    /// Sticky error currently held for `collection`.
    pub fn error(&self, collection: &str) -> Option<ErrorRecord> {
        self.existing_slot(collection)
            .and_then(|slot| slot.lock().error().cloned())
    }

    pub fn queued(&self, collection: &str) -> usize {
        self.existing_slot(collection)
            .map_or(0, |slot| slot.lock().queued())
    }

    /// Clear queue and sticky error for `collection`.
    pub fn reset(&self, collection: &str) {
        self.slot(collection).lock().reset();
    }

    /// Resolves once no write for `collection` is in flight.
    pub async fn wait_idle(&self, collection: &str) {
        let Some(slot) = self.existing_slot(collection) else {
            return;
        };
        loop {
            let notified = slot.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if !slot.lock().locked() {
                return;
            }
            notified.await;
        }
    }

    /// Read the snapshot file of `collection`, if one was written.
    pub async fn load(&self, collection: &str) -> Result<Option<SnapshotFile>> {
        let file_name = snapshot_file_name(collection);
        match self.inner.storage.read(&file_name).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn slot(&self, collection: &str) -> Arc<CollectionSlot> {
        let mut slots = self
            .inner
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        slots
            .entry(collection.to_string())
            .or_insert_with(|| Arc::new(CollectionSlot::default()))
            .clone()
    }

    fn existing_slot(&self, collection: &str) -> Option<Arc<CollectionSlot>> {
        let slots = self
            .inner
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        slots.get(collection).cloned()
    }

    /// Drive pipelines for `collection` until no coalesced follow-up remains.
    fn spawn_pipeline(&self, collection: String, slot: Arc<CollectionSlot>) {
        let manager = self.clone();
        tokio::spawn(async move {
            loop {
                let span = info_span!("snapshot.pipeline", collection = %collection);
                let outcome = manager.run_pipeline(&collection).instrument(span).await;

                let failure = outcome.err().map(|err| {
                    event!(
                        Level::ERROR,
                        collection = %collection,
                        code = err.code(),
                        error = %err,
                        "snapshot failed"
                    );
                    ErrorRecord::new(&err, &collection, now_millis())
                });

                if !slot.lock().complete(failure) {
                    break;
                }
                event!(Level::DEBUG, collection = %collection, "running coalesced snapshot");
            }
            slot.idle.notify_waiters();
        });
    }

    async fn run_pipeline(&self, collection: &str) -> std::result::Result<(), SnapshotError> {
        let config = &self.inner.config;
        let mut attempt = 1;

        loop {
            let err = match self.write_once(collection).await {
                Ok(bytes) => {
                    event!(Level::INFO, collection, bytes, attempt, "snapshot written");
                    return Ok(());
                }
                Err(err) => err,
            };

            if !err.is_retryable() || attempt >= config.max_retries {
                return Err(err);
            }

            let delay = config.backoff_for(attempt);
            event!(
                Level::WARN,
                collection,
                attempt,
                backoff_ms = delay.as_millis() as u64,
                error = %err,
                "snapshot attempt failed, retrying"
            );
            sleep(delay).await;
            attempt += 1;
        }
    }

    /// One attempt: fresh read, serialize, size check, timed atomic write.
    async fn write_once(&self, collection: &str) -> std::result::Result<usize, SnapshotError> {
        let config = &self.inner.config;

        let contents = self
            .inner
            .store
            .get(collection, None)
            .await
            .map_err(|err| SnapshotError::WriteFailed {
                collection: collection.to_string(),
                message: format!("reading collection: {}", err),
            })?;
        if contents.is_empty {
            return Err(SnapshotError::NoSuchCollection(collection.to_string()));
        }

        let file = SnapshotFile {
            collection: collection.to_string(),
            item: contents.item,
            created_at: now_millis(),
        };
        let bytes = serde_json::to_vec(&file).map_err(|err| SnapshotError::Serialize {
            collection: collection.to_string(),
            message: err.to_string(),
        })?;
        let size = bytes.len();
        if size > config.max_snapshot_size {
            return Err(SnapshotError::SizeExceeded {
                collection: collection.to_string(),
                size,
                limit: config.max_snapshot_size,
            });
        }

        let file_name = snapshot_file_name(collection);
        let temp_name = temp_file_name(&file_name);
        let storage = &self.inner.storage;

        match timeout(
            config.file_timeout_duration(),
            storage.write_atomic(&temp_name, &file_name, bytes),
        )
        .await
        {
            Ok(Ok(())) => Ok(size),
            Ok(Err(err)) => Err(SnapshotError::WriteFailed {
                collection: collection.to_string(),
                message: err.to_string(),
            }),
            Err(_) => {
                storage.discard(&temp_name).await;
                Err(SnapshotError::Timeout {
                    collection: collection.to_string(),
                    timeout_ms: config.file_timeout_ms,
                })
            }
        }
    }
}
