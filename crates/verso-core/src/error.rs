//! Error types for verso operations.
//!
//! Errors carry a structured [`ErrorCode`] for programmatic handling. A
//! cancelled operation is never an error: cancellation is reported through the
//! return value of the operation itself.

use std::collections::HashMap;
use thiserror::Error;

use crate::types::RecordId;

/// Result type alias for verso operations.
pub type VersoResult<T> = Result<T, VersoError>;

/// Main error type for all verso operations.
#[derive(Error, Debug)]
pub enum VersoError {
    /// Input validation failed (invalid argument).
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        code: ErrorCode,
        details: HashMap<String, String>,
        suggestion: Option<String>,
    },

    /// Record not found.
    #[error("Record not found: {message}")]
    NotFound {
        message: String,
        code: ErrorCode,
        record_id: Option<RecordId>,
    },

    /// Database operation failed.
    #[error("Database error: {message}")]
    Database {
        message: String,
        code: ErrorCode,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A notification subscriber failed.
    #[error("Hook error: {message}")]
    Hook {
        message: String,
        code: ErrorCode,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Parse error.
    #[error("Parse error: {message}")]
    Parse { message: String, code: ErrorCode },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error codes for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Validation (VAL_xxx)
    ValInvalidInput,
    ValNegativeRetention,
    ValTransientRecord,

    // Records (REC_xxx)
    RecNotFound,
    RecCorrupted,

    // Database (DB_xxx)
    DbConnectionFailed,
    DbOperationFailed,
    DbTransactionFailed,

    // Hooks (HOOK_xxx)
    HookFailed,

    // Parse (PARSE_xxx)
    ParseInvalidJson,
    ParseInvalidValue,

    // Internal
    Internal,
}

impl ErrorCode {
    /// Get the string representation of the error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ValInvalidInput => "VAL_001",
            ErrorCode::ValNegativeRetention => "VAL_002",
            ErrorCode::ValTransientRecord => "VAL_003",
            ErrorCode::RecNotFound => "REC_001",
            ErrorCode::RecCorrupted => "REC_002",
            ErrorCode::DbConnectionFailed => "DB_001",
            ErrorCode::DbOperationFailed => "DB_002",
            ErrorCode::DbTransactionFailed => "DB_003",
            ErrorCode::HookFailed => "HOOK_001",
            ErrorCode::ParseInvalidJson => "PARSE_001",
            ErrorCode::ParseInvalidValue => "PARSE_002",
            ErrorCode::Internal => "INT_001",
        }
    }
}

impl VersoError {
    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            code: ErrorCode::ValInvalidInput,
            details: HashMap::new(),
            suggestion: None,
        }
    }

    /// Create a validation error with suggestion.
    pub fn validation_with_suggestion(
        message: impl Into<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self::Validation {
            message: message.into(),
            code: ErrorCode::ValInvalidInput,
            details: HashMap::new(),
            suggestion: Some(suggestion.into()),
        }
    }

    /// Create the error returned for a negative retention count.
    pub fn negative_retention(requested: i64) -> Self {
        let mut details = HashMap::new();
        details.insert("maximum_number_of_versions".to_string(), requested.to_string());
        Self::Validation {
            message: format!(
                "maximum number of versions must be zero or greater, got {}",
                requested
            ),
            code: ErrorCode::ValNegativeRetention,
            details,
            suggestion: Some("Use 0 to disable trimming".to_string()),
        }
    }

    /// Create the error returned when an operation needs a persisted record.
    pub fn transient_record(operation: &str) -> Self {
        Self::Validation {
            message: format!("{} requires a persisted record", operation),
            code: ErrorCode::ValTransientRecord,
            details: HashMap::new(),
            suggestion: Some("Save the record before versioning it".to_string()),
        }
    }

    /// Create a not found error.
    pub fn not_found(record_id: RecordId) -> Self {
        Self::NotFound {
            message: format!("Record with id '{}' not found", record_id),
            code: ErrorCode::RecNotFound,
            record_id: Some(record_id),
        }
    }

    /// Create a database error.
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
            code: ErrorCode::DbOperationFailed,
            source: None,
        }
    }

    /// Create a transaction error.
    pub fn transaction(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
            code: ErrorCode::DbTransactionFailed,
            source: None,
        }
    }

    /// Create a hook error, for subscribers that need to abort an operation.
    pub fn hook(message: impl Into<String>) -> Self {
        Self::Hook {
            message: message.into(),
            code: ErrorCode::HookFailed,
            source: None,
        }
    }

    /// Create a parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            code: ErrorCode::ParseInvalidValue,
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Get the error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Validation { code, .. } => *code,
            Self::NotFound { code, .. } => *code,
            Self::Database { code, .. } => *code,
            Self::Hook { code, .. } => *code,
            Self::Parse { code, .. } => *code,
            Self::Serialization(_) => ErrorCode::ParseInvalidJson,
            _ => ErrorCode::Internal,
        }
    }

    /// Whether this error is an invalid-argument rejection.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// Get a user-friendly suggestion for resolving this error.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::NotFound { .. } => Some("Please check the record ID and ensure it exists"),
            Self::Validation { suggestion, .. } => suggestion.as_deref(),
            Self::Database { .. } => Some("Please check the record store connection settings"),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for VersoError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database {
            message: err.to_string(),
            code: ErrorCode::DbOperationFailed,
            source: Some(Box::new(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error() {
        let err = VersoError::validation("Invalid input");
        assert_eq!(err.code(), ErrorCode::ValInvalidInput);
        assert!(err.to_string().contains("Invalid input"));
        assert!(err.is_invalid_argument());
    }

    #[test]
    fn test_negative_retention_error() {
        let err = VersoError::negative_retention(-1);
        assert_eq!(err.code(), ErrorCode::ValNegativeRetention);
        assert!(err.to_string().contains("-1"));
        assert_eq!(err.suggestion(), Some("Use 0 to disable trimming"));
    }

    #[test]
    fn test_not_found_error() {
        let err = VersoError::not_found(RecordId(42));
        assert_eq!(err.code(), ErrorCode::RecNotFound);
        assert!(err.to_string().contains("42"));
        assert!(err.suggestion().is_some());
    }

    #[test]
    fn test_rusqlite_conversion() {
        let err: VersoError = rusqlite::Error::QueryReturnedNoRows.into();
        assert_eq!(err.code(), ErrorCode::DbOperationFailed);
    }

    #[test]
    fn test_error_code_as_str() {
        assert_eq!(ErrorCode::ValNegativeRetention.as_str(), "VAL_002");
        assert_eq!(ErrorCode::RecNotFound.as_str(), "REC_001");
        assert_eq!(ErrorCode::HookFailed.as_str(), "HOOK_001");
    }
}
