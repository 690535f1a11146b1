use crate::condition::ConditionError;
use crate::core::DocError;
use crate::snapshot::ErrorRecord;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Invalid where clause: {0}")]
    Condition(#[from] ConditionError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Item {index} for collection '{collection}' has no owner")]
    MissingOwner { index: usize, collection: String },

    #[error("Could not delete '{id}' from '{collection}': {reason}")]
    DeleteFailed {
        collection: String,
        id: String,
        reason: &'static str,
    },

    #[error("Snapshot of '{}' failed: {}", .0.collection_name, .0.message)]
    Snapshot(ErrorRecord),

    #[error("Store error: {0}")]
    Store(#[from] DocError),
}

/// Serializable error body for the routing layer.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<ErrorRecord>,
}

impl QueryError {
    /// HTTP-equivalent status code.
    pub fn status(&self) -> u16 {
        match self {
            QueryError::Condition(_)
            | QueryError::BadRequest(_)
            | QueryError::MissingOwner { .. }
            | QueryError::DeleteFailed { .. } => 400,
            QueryError::Snapshot(_) | QueryError::Store(_) => 500,
        }
    }

    pub fn code(&self) -> &str {
        match self {
            QueryError::Condition(err) => err.code(),
            QueryError::BadRequest(_) => "BAD_REQUEST",
            QueryError::MissingOwner { .. } => "MISSING_OWNER",
            QueryError::DeleteFailed { .. } => "DELETE_FAILED",
            QueryError::Snapshot(record) => &record.code,
            QueryError::Store(_) => "STORE_ERROR",
        }
    }

    pub fn response(&self) -> ErrorResponse {
        ErrorResponse {
            error: self.to_string(),
            code: self.code().to_string(),
            snapshot: match self {
                QueryError::Snapshot(record) => Some(record.clone()),
                _ => None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::SnapshotError;

    #[test]
    fn test_status_mapping() {
        assert_eq!(QueryError::BadRequest("x".into()).status(), 400);
        assert_eq!(
            QueryError::Condition(ConditionError::MixedOperator { position: 3 }).status(),
            400
        );
        assert_eq!(
            QueryError::Store(DocError::Lock("poisoned".into())).status(),
            500
        );
    }

    #[test]
    fn test_snapshot_error_surfaces_record() {
        let record = ErrorRecord::new(
            &SnapshotError::NoSuchCollection("users".into()),
            "users",
            42,
        );
        let err = QueryError::Snapshot(record.clone());
        assert_eq!(err.status(), 500);
        assert_eq!(err.code(), "NO_SUCH_COLLECTION");

        let body = serde_json::to_value(err.response()).unwrap();
        assert_eq!(body["snapshot"]["collectionName"], "users");
        assert_eq!(body["snapshot"]["timestampMillis"], 42);
    }
}
