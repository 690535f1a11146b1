use crate::condition::ConditionError;
use crate::snapshot::SnapshotError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DocError {
    #[error("Condition error: {0}")]
    Condition(#[from] ConditionError),

    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Lock error: {0}")]
    Lock(String),

    #[error("I/O error: {0}")]
    Io(String),
}

pub type Result<T> = std::result::Result<T, DocError>;

impl<T> From<std::sync::PoisonError<T>> for DocError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::Lock(err.to_string())
    }
}

impl From<serde_json::Error> for DocError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for DocError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::compile;

    #[test]
    fn test_conversions() {
        let err: DocError = compile("== 1").unwrap_err().into();
        assert!(matches!(err, DocError::Condition(_)));

        let err: DocError = serde_json::from_str::<u8>("nope").unwrap_err().into();
        assert!(matches!(err, DocError::Serialization(_)));

        let lock = std::sync::Mutex::new(0);
        let poisoned = std::panic::catch_unwind(|| {
            let _guard = lock.lock().unwrap();
            panic!("poison");
        });
        assert!(poisoned.is_err());
        let err: DocError = lock.lock().unwrap_err().into();
        assert!(matches!(err, DocError::Lock(_)));
    }
}
