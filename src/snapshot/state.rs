use super::SnapshotError;
use crate::core::SnapshotConfig;
use serde::{Deserialize, Serialize};

/// Sticky failure left behind by a snapshot pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRecord {
    pub message: String,
    pub code: String,
    pub collection_name: String,
    pub timestamp_millis: i64,
}

impl ErrorRecord {
    pub fn new(error: &SnapshotError, collection_name: &str, timestamp_millis: i64) -> Self {
        Self {
            message: error.to_string(),
            code: error.code().to_string(),
            collection_name: collection_name.to_string(),
            timestamp_millis,
        }
    }

    pub fn is_expired(&self, now_millis: i64, cleanup_interval_ms: u64) -> bool {
        now_millis.saturating_sub(self.timestamp_millis) >= i64::try_from(cleanup_interval_ms).unwrap_or(i64::MAX)
    }
}

/// Externally visible phase of a collection's snapshot state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SnapshotStatus {
    Idle,
    Errored,
    Locked,
    LockedQueued,
}

/// What a new snapshot request turned into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Admission {
    /// Lock taken; the caller must start a pipeline
    Acquired,
    /// Coalesced behind the in-flight write
    Queued(usize),
    /// Swallowed by a fresh sticky error
    Suppressed,
    /// Queue cap exceeded; a sticky error was recorded
    Overflow,
}

/// Per-collection snapshot bookkeeping.
#[derive(Debug, Clone, Default)]
pub struct SnapshotState {
    locked: bool,
    queued: usize,
    error: Option<ErrorRecord>,
}

impl SnapshotState {
    pub fn locked(&self) -> bool {
        self.locked
    }

    pub fn queued(&self) -> usize {
        self.queued
    }

    pub fn error(&self) -> Option<&ErrorRecord> {
        self.error.as_ref()
    }

    pub fn status(&self) -> SnapshotStatus {
        match (self.locked, self.queued > 0, self.error.is_some()) {
            (true, true, _) => SnapshotStatus::LockedQueued,
            (true, false, _) => SnapshotStatus::Locked,
            (false, _, true) => SnapshotStatus::Errored,
            (false, _, false) => SnapshotStatus::Idle,
        }
    }

    pub(crate) fn admit(
        &mut self,
        collection_name: &str,
        now_millis: i64,
        config: &SnapshotConfig,
    ) -> Admission {
        if let Some(error) = &self.error {
            if !error.is_expired(now_millis, config.cleanup_interval_ms) {
                self.queued = (self.queued + 1).min(config.max_queue_size);
                return Admission::Suppressed;
            }
            self.error = None;
        }

        if self.locked {
            if self.queued >= config.max_queue_size {
                let overflow = SnapshotError::QueueLimitReached {
                    collection: collection_name.to_string(),
                    limit: config.max_queue_size,
                };
                self.queued = 0;
                self.error = Some(ErrorRecord::new(&overflow, collection_name, now_millis));
                return Admission::Overflow;
            }
            self.queued += 1;
            return Admission::Queued(self.queued);
        }

        self.locked = true;
        self.queued = 0;
        Admission::Acquired
    }

    /// Record a finished pipeline. Returns true when exactly one coalesced
    /// follow-up must run; the lock is then kept for it.
    pub(crate) fn complete(&mut self, failure: Option<ErrorRecord>) -> bool {
        if failure.is_some() {
            self.error = failure;
        }

        if self.queued > 0 && self.error.is_none() {
            self.queued = 0;
            return true;
        }

        self.locked = false;
        false
    }

    /// Back to idle; an in-flight lock is left to its pipeline.
    pub(crate) fn reset(&mut self) {
        self.queued = 0;
        self.error = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SnapshotConfig {
        SnapshotConfig::default()
            .max_queue_size(2)
            .cleanup_interval(std::time::Duration::from_millis(1_000))
    }

    fn failure(at: i64) -> ErrorRecord {
        ErrorRecord::new(
            &SnapshotError::NoSuchCollection("c".to_string()),
            "c",
            at,
        )
    }

    #[test]
    fn test_huge_cleanup_interval_never_expires() {
        let record = failure(0);
        assert!(!record.is_expired(1_000, u64::MAX));
        assert!(!record.is_expired(i64::MAX, u64::MAX));
        assert!(record.is_expired(i64::MAX, i64::MAX as u64));
        assert!(record.is_expired(1_000, 1_000));
    }

    #[test]
    fn test_idle_request_acquires_lock() {
        let mut state = SnapshotState::default();
        assert_eq!(state.admit("c", 0, &config()), Admission::Acquired);
        assert_eq!(state.status(), SnapshotStatus::Locked);
    }

    #[test]
    fn test_requests_while_locked_coalesce_into_one_follow_up() {
        let mut state = SnapshotState::default();
        state.admit("c", 0, &config());
        assert_eq!(state.admit("c", 0, &config()), Admission::Queued(1));
        assert_eq!(state.admit("c", 0, &config()), Admission::Queued(2));
        assert_eq!(state.status(), SnapshotStatus::LockedQueued);

        assert!(state.complete(None));
        assert!(state.locked());
        assert_eq!(state.queued(), 0);

        assert!(!state.complete(None));
        assert_eq!(state.status(), SnapshotStatus::Idle);
    }

    #[test]
    fn test_queue_overflow_records_error() {
        let mut state = SnapshotState::default();
        state.admit("c", 0, &config());
        state.admit("c", 0, &config());
        state.admit("c", 0, &config());
        assert_eq!(state.admit("c", 5, &config()), Admission::Overflow);
        assert_eq!(state.queued(), 0);
        let error = state.error().unwrap();
        assert_eq!(error.code, "QUEUE_LIMIT_REACHED");
        assert_eq!(error.timestamp_millis, 5);

        // in-flight write finishes; the overflow stays sticky
        assert!(!state.complete(None));
        assert_eq!(state.status(), SnapshotStatus::Errored);
    }

    #[test]
    fn test_fresh_error_suppresses_requests() {
        let mut state = SnapshotState::default();
        state.admit("c", 0, &config());
        state.complete(Some(failure(100)));

        assert_eq!(state.admit("c", 500, &config()), Admission::Suppressed);
        assert_eq!(state.admit("c", 600, &config()), Admission::Suppressed);
        assert_eq!(state.admit("c", 700, &config()), Admission::Suppressed);
        assert_eq!(state.queued(), 2);
        assert!(!state.locked());
        assert_eq!(state.error().unwrap().timestamp_millis, 100);
    }

    #[test]
    fn test_expired_error_is_cleared_on_next_request() {
        let mut state = SnapshotState::default();
        state.admit("c", 0, &config());
        state.complete(Some(failure(100)));
        state.admit("c", 200, &config());

        assert_eq!(state.admit("c", 1_100, &config()), Admission::Acquired);
        assert!(state.error().is_none());
        assert_eq!(state.queued(), 0);
    }

    #[test]
    fn test_failure_does_not_run_follow_up() {
        let mut state = SnapshotState::default();
        state.admit("c", 0, &config());
        state.admit("c", 0, &config());
        assert!(!state.complete(Some(failure(10))));
        assert!(!state.locked());
        assert_eq!(state.status(), SnapshotStatus::Errored);
    }

    #[test]
    fn test_reset_keeps_lock() {
        let mut state = SnapshotState::default();
        state.admit("c", 0, &config());
        state.admit("c", 0, &config());
        state.reset();
        assert!(state.locked());
        assert_eq!(state.queued(), 0);
    }
}
