//! Storage error types.
//!
//! [`StorageError`] is the single error type surfaced by every storage
//! operation. `NotFound` is deliberately its own variant so callers can
//! branch on a missing record without string matching.

/// Convenience alias used throughout the crate.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors returned by the storage adapter.
///
/// The type is `Clone` because a failed bootstrap is memoized and handed
/// to every operation that awaits it.
///
/// # Error Code Ranges
///
/// | Range     | Category                 |
/// |-----------|--------------------------|
/// | 1000–1999 | Configuration / input    |
/// | 2000–2999 | Not found                |
/// | 3000–3999 | Database / setup         |
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    /// Configuration input was malformed or unsupported.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Database or table bootstrap failed.
    #[error("setup failed: {0}")]
    SetupFailure(String),

    /// A statement failed to execute.
    #[error("could not execute '{statement}': {cause}")]
    QueryFailure {
        /// SQL text of the failing statement.
        statement: String,
        /// Underlying driver error, rendered.
        cause: String,
    },

    /// No record with the given id exists in the collection.
    #[error("NotFound: no record '{id}' in {collection}")]
    NotFound {
        /// Collection that was searched.
        collection: String,
        /// Identifier that was requested.
        id: String,
    },

    /// Record cannot be stored (missing or malformed `id`, not an object).
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    /// Stored JSON could not be decoded into the requested type.
    #[error("could not decode stored record: {0}")]
    Decode(String),
}

impl StorageError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidConfiguration(_) => 1001,
            Self::InvalidRecord(_) => 1002,
            Self::NotFound { .. } => 2001,
            Self::SetupFailure(_) => 3001,
            Self::QueryFailure { .. } => 3002,
            Self::Decode(_) => 3003,
        }
    }

    /// Returns `true` when the error signals a missing record.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Wraps a driver error with the statement that produced it.
    pub(crate) fn query(statement: &str, cause: &sqlx::Error) -> Self {
        Self::QueryFailure {
            statement: statement.to_string(),
            cause: cause.to_string(),
        }
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_distinct() {
        let err = StorageError::NotFound {
            collection: "users".to_string(),
            id: "U1".to_string(),
        };
        assert!(err.is_not_found());
        assert_eq!(err.error_code(), 2001);
        assert!(err.to_string().starts_with("NotFound"));

        let other = StorageError::SetupFailure("boom".to_string());
        assert!(!other.is_not_found());
    }

    #[test]
    fn query_failure_includes_statement_and_cause() {
        let err = StorageError::query("SELECT 1", &sqlx::Error::PoolClosed);
        let msg = err.to_string();
        assert!(msg.contains("SELECT 1"));
        assert!(msg.contains("closed"));
        assert_eq!(err.error_code(), 3002);
    }

    #[test]
    fn json_errors_map_to_decode() {
        let Err(json_err) = serde_json::from_str::<serde_json::Value>("{not json") else {
            panic!("input is malformed");
        };
        let err = StorageError::from(json_err);
        assert!(matches!(err, StorageError::Decode(_)));
    }
}
