use crate::core::{DocError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{Level, event};
use uuid::Uuid;

const SNAPSHOT_EXTENSION: &str = "json";
const TEMP_EXTENSION: &str = "tmp";

/// Durable target for snapshot files.
#[async_trait]
pub trait SnapshotStorage: Send + Sync {
    /// Write `bytes` under `temp_name`, then atomically replace `file_name`.
    /// The temp file must not survive a failed call.
    async fn write_atomic(&self, temp_name: &str, file_name: &str, bytes: Vec<u8>) -> Result<()>;

    /// Contents of `file_name`, or `None` when it does not exist.
    async fn read(&self, file_name: &str) -> Result<Option<Vec<u8>>>;

    /// Best-effort removal of a leftover temp file.
    async fn discard(&self, temp_name: &str);
}

/// Snapshot files in a single directory.
#[derive(Debug, Clone)]
pub struct FsSnapshotStorage {
    dir: PathBuf,
}

impl FsSnapshotStorage {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, file_name: &str) -> PathBuf {
        self.dir.join(file_name)
    }

    async fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
        let mut file = File::create(path).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        file.sync_data().await?;
        Ok(())
    }
}

#[async_trait]
impl SnapshotStorage for FsSnapshotStorage {
    async fn write_atomic(&self, temp_name: &str, file_name: &str, bytes: Vec<u8>) -> Result<()> {
        fs::create_dir_all(&self.dir).await.map_err(|e| {
            DocError::Io(format!(
                "Failed to create snapshot directory '{}': {}",
                self.dir.display(),
                e
            ))
        })?;

        let temp_path = self.path_for(temp_name);
        let final_path = self.path_for(file_name);

        if let Err(err) = Self::write_file(&temp_path, &bytes).await {
            self.discard(temp_name).await;
            return Err(err);
        }

        // Same directory, so the rename replaces the old file atomically
        if let Err(err) = fs::rename(&temp_path, &final_path).await {
            self.discard(temp_name).await;
            return Err(DocError::Io(format!(
                "Failed to rename snapshot into '{}': {}",
                final_path.display(),
                err
            )));
        }
        Ok(())
    }

    async fn read(&self, file_name: &str) -> Result<Option<Vec<u8>>> {
        match fs::read(self.path_for(file_name)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn discard(&self, temp_name: &str) {
        if let Err(err) = fs::remove_file(self.path_for(temp_name)).await {
            if err.kind() != std::io::ErrorKind::NotFound {
                event!(Level::DEBUG, temp_name, error = %err, "temp snapshot cleanup failed");
            }
        }
    }
}

/// Filesystem-safe file name for a collection: `action/sequences` and
/// `actionSequences` both become `action-sequences.json`.
pub fn snapshot_file_name(collection: &str) -> String {
    let mut slug = String::with_capacity(collection.len() + 8);
    let mut prev: Option<char> = None;

    for c in collection.chars() {
        if c.is_ascii_uppercase() {
            if prev.is_some_and(|p| p.is_ascii_lowercase() || p.is_ascii_digit()) {
                slug.push('-');
            }
            slug.push(c.to_ascii_lowercase());
        } else if c.is_ascii_alphanumeric() {
            slug.push(c);
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
        prev = Some(c);
    }

    let trimmed = slug.trim_end_matches('-');
    let stem = if trimmed.is_empty() { "collection" } else { trimmed };
    format!("{stem}.{SNAPSHOT_EXTENSION}")
}

/// Unique sibling of `file_name` for an in-progress write.
pub fn temp_file_name(file_name: &str) -> String {
    format!("{}.{}.{}", file_name, Uuid::new_v4().simple(), TEMP_EXTENSION)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_names() {
        assert_eq!(snapshot_file_name("action/sequences"), "action-sequences.json");
        assert_eq!(snapshot_file_name("actionSequences"), "action-sequences.json");
        assert_eq!(snapshot_file_name("page/userProfiles"), "page-user-profiles.json");
        assert_eq!(snapshot_file_name("v2Items"), "v2-items.json");
        assert_eq!(snapshot_file_name("/weird//name/"), "weird-name.json");
        assert_eq!(snapshot_file_name("../../etc"), "etc.json");
        assert_eq!(snapshot_file_name("///"), "collection.json");
    }

    #[test]
    fn test_temp_names_are_unique_siblings() {
        let a = temp_file_name("users.json");
        let b = temp_file_name("users.json");
        assert_ne!(a, b);
        assert!(a.starts_with("users.json."));
        assert!(a.ends_with(".tmp"));
        assert!(!a.contains('/'));
    }

    #[tokio::test]
    async fn test_write_atomic_replaces_file_and_leaves_no_temp() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FsSnapshotStorage::new(dir.path().join("snapshots"));

        for body in ["first", "second"] {
            let temp = temp_file_name("users.json");
            storage
                .write_atomic(&temp, "users.json", body.as_bytes().to_vec())
                .await
                .unwrap();
        }

        let read = storage.read("users.json").await.unwrap().unwrap();
        assert_eq!(read, b"second");

        let names: Vec<_> = std::fs::read_dir(storage.dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["users.json".to_string()]);
    }

    #[tokio::test]
    async fn test_read_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FsSnapshotStorage::new(dir.path());
        assert!(storage.read("nothing.json").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failed_rename_cleans_temp() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FsSnapshotStorage::new(dir.path());
        // A non-empty directory at the final path makes the rename fail
        std::fs::create_dir_all(dir.path().join("users.json").join("occupied")).unwrap();

        let temp = temp_file_name("users.json");
        let err = storage
            .write_atomic(&temp, "users.json", b"data".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, DocError::Io(_)));
        assert!(!dir.path().join(&temp).exists());
    }
}
