//! Error types for rentals-db
//!
//! Server errors are classified by code so migration failures read the same
//! way an operator would describe them.

use mongodb::error::{ErrorKind, WriteFailure};

/// Server code for an index whose name exists with different options
pub const INDEX_OPTIONS_CONFLICT: i32 = 85;
/// Server code for an index whose name exists with a different key pattern
pub const INDEX_KEY_SPECS_CONFLICT: i32 = 86;
/// Server code for a unique index violation
pub const DUPLICATE_KEY: i32 = 11000;
/// Server code for a write rejected by the collection validator
pub const DOCUMENT_VALIDATION_FAILURE: i32 = 121;

/// Main error type for rentals-db operations
#[derive(Debug, thiserror::Error)]
pub enum RentalsError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Validator rejected: {0}")]
    ValidatorRejected(String),

    #[error("Index conflict: {0}")]
    IndexConflict(String),

    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl RentalsError {
    /// Shorthand for a field-level validation failure
    pub fn invalid(field: &str, reason: impl std::fmt::Display) -> Self {
        Self::Validation(format!("{}: {}", field, reason))
    }

    /// Whether this error came from a document the server refused to store
    /// because of a unique index
    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, Self::DuplicateKey(_))
    }
}

/// Extract the server error code, if the driver error carries one
pub fn server_code(err: &mongodb::error::Error) -> Option<i32> {
    match err.kind.as_ref() {
        ErrorKind::Command(cmd) => Some(cmd.code),
        ErrorKind::Write(WriteFailure::WriteError(write)) => Some(write.code),
        ErrorKind::Write(WriteFailure::WriteConcernError(concern)) => Some(concern.code),
        _ => None,
    }
}

impl From<mongodb::error::Error> for RentalsError {
    fn from(err: mongodb::error::Error) -> Self {
        match server_code(&err) {
            Some(INDEX_OPTIONS_CONFLICT) | Some(INDEX_KEY_SPECS_CONFLICT) => {
                return Self::IndexConflict(err.to_string())
            }
            Some(DUPLICATE_KEY) => return Self::DuplicateKey(err.to_string()),
            Some(DOCUMENT_VALIDATION_FAILURE) => return Self::Validation(err.to_string()),
            _ => {}
        }

        match err.kind.as_ref() {
            ErrorKind::ServerSelection { .. }
            | ErrorKind::Io(_)
            | ErrorKind::DnsResolve { .. }
            | ErrorKind::ConnectionPoolCleared { .. } => Self::Connection(err.to_string()),
            _ => Self::Database(err.to_string()),
        }
    }
}

/// Result type alias for rentals-db operations
pub type Result<T> = std::result::Result<T, RentalsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_formats_field_and_reason() {
        let err = RentalsError::invalid("price", "must be greater than 0");
        assert_eq!(err.to_string(), "Validation failed: price: must be greater than 0");
        assert!(!err.is_duplicate_key());
    }

    #[test]
    fn test_duplicate_key_flag() {
        assert!(RentalsError::DuplicateKey("email_unique".into()).is_duplicate_key());
    }
}
