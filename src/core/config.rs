use crate::core::{DocError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const ENV_DATA_DIR: &str = "DOCSTORE_DATA_DIR";
const ENV_MAX_SNAPSHOT_SIZE: &str = "DOCSTORE_MAX_SNAPSHOT_SIZE";
const ENV_FILE_TIMEOUT_MS: &str = "DOCSTORE_FILE_TIMEOUT_MS";
const ENV_MAX_QUEUE_SIZE: &str = "DOCSTORE_MAX_QUEUE_SIZE";
const ENV_MAX_RETRIES: &str = "DOCSTORE_MAX_RETRIES";
const ENV_CLEANUP_INTERVAL_MS: &str = "DOCSTORE_CLEANUP_INTERVAL_MS";

/// Limits and timings for collection snapshots.
///
/// Set once at startup; the snapshot manager keeps it behind an `Arc` and
/// never mutates it afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SnapshotConfig {
    /// Largest serialized snapshot accepted, in bytes
    pub max_snapshot_size: usize,

    /// Upper bound for one write + rename attempt
    pub file_timeout_ms: u64,

    /// Requests coalesced while a write is in flight before overflowing
    pub max_queue_size: usize,

    /// Write attempts before a sticky error is recorded
    pub max_retries: u32,

    /// Age after which a sticky error is cleared and writes may resume
    pub cleanup_interval_ms: u64,

    /// Backoff base; the wait after failed attempt `n` is `2^n * base`
    pub retry_base_delay_ms: u64,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            max_snapshot_size: 10 * 1024 * 1024,
            file_timeout_ms: 5_000,
            max_queue_size: 10,
            max_retries: 3,
            cleanup_interval_ms: 60_000,
            retry_base_delay_ms: 100,
        }
    }
}

impl SnapshotConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum serialized snapshot size in bytes
    pub fn max_snapshot_size(mut self, bytes: usize) -> Self {
        self.max_snapshot_size = bytes;
        self
    }

    /// Set the per-attempt file timeout
    pub fn file_timeout(mut self, timeout: Duration) -> Self {
        self.file_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the coalescing queue cap
    pub fn max_queue_size(mut self, size: usize) -> Self {
        self.max_queue_size = size;
        self
    }

    /// Set the number of write attempts
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set the sticky error cooldown
    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Set the exponential backoff base
    pub fn retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn file_timeout_duration(&self) -> Duration {
        Duration::from_millis(self.file_timeout_ms)
    }

    /// Delay to wait after the given (1-based) failed attempt.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt);
        Duration::from_millis(self.retry_base_delay_ms.saturating_mul(factor))
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_retries == 0 {
            return Err(DocError::InvalidConfig(
                "maxRetries must be at least 1".to_string(),
            ));
        }
        if self.max_snapshot_size == 0 {
            return Err(DocError::InvalidConfig(
                "maxSnapshotSize must be greater than zero".to_string(),
            ));
        }
        if self.file_timeout_ms == 0 {
            return Err(DocError::InvalidConfig(
                "fileTimeoutMillis must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Top-level store configuration: where snapshots live and how they are written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StoreConfig {
    pub data_dir: PathBuf,
    pub snapshot: SnapshotConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            snapshot: SnapshotConfig::default(),
        }
    }
}

impl StoreConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            snapshot: SnapshotConfig::default(),
        }
    }

    /// Set the snapshot configuration
    pub fn snapshot(mut self, snapshot: SnapshotConfig) -> Self {
        self.snapshot = snapshot;
        self
    }

    /// Load from a JSON file; absent keys fall back to defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            DocError::InvalidConfig(format!("Failed to read '{}': {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|e| {
            DocError::InvalidConfig(format!("Failed to parse '{}': {}", path.display(), e))
        })?;
        config.snapshot.validate()?;
        Ok(config)
    }

    /// Apply `DOCSTORE_*` environment overrides on top of this configuration.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(ENV_DATA_DIR) {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(value) = parse_override(&lookup, ENV_MAX_SNAPSHOT_SIZE)? {
            self.snapshot.max_snapshot_size = value;
        }
        if let Some(value) = parse_override(&lookup, ENV_FILE_TIMEOUT_MS)? {
            self.snapshot.file_timeout_ms = value;
        }
        if let Some(value) = parse_override(&lookup, ENV_MAX_QUEUE_SIZE)? {
            self.snapshot.max_queue_size = value;
        }
        if let Some(value) = parse_override(&lookup, ENV_MAX_RETRIES)? {
            self.snapshot.max_retries = value;
        }
        if let Some(value) = parse_override(&lookup, ENV_CLEANUP_INTERVAL_MS)? {
            self.snapshot.cleanup_interval_ms = value;
        }
        self.snapshot.validate()?;
        Ok(self)
    }
}

fn parse_override<F, T>(lookup: &F, key: &str) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| DocError::InvalidConfig(format!("{key} must be a number, got '{raw}'"))),
    }
}
