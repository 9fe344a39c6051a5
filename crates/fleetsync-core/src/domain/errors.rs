//! Domain error types
//!
//! This module defines error types specific to domain operations,
//! including identity and timestamp validation and missing records.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Backend identity is empty or contains whitespace
    #[error("Invalid backend id: {0:?}")]
    InvalidBackendId(String),

    /// Timestamp could not be parsed by any accepted format
    #[error("Invalid timestamp: {0:?}")]
    InvalidTimestamp(String),

    /// A JSON value that must be an object was something else
    #[error("Entity must be a JSON object, got {0}")]
    NotAnObject(String),

    /// No entity with the given identity exists in the target collection
    #[error("Entity not found: {0}")]
    EntityNotFound(String),

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DomainError::InvalidBackendId("".to_string());
        assert_eq!(err.to_string(), "Invalid backend id: \"\"");

        let err = DomainError::InvalidTimestamp("yesterday".to_string());
        assert_eq!(err.to_string(), "Invalid timestamp: \"yesterday\"");

        let err = DomainError::EntityNotFound("local_1_abc".to_string());
        assert_eq!(err.to_string(), "Entity not found: local_1_abc");
    }

    #[test]
    fn test_error_equality() {
        let err1 = DomainError::NotAnObject("array".to_string());
        let err2 = DomainError::NotAnObject("array".to_string());
        let err3 = DomainError::NotAnObject("string".to_string());

        assert_eq!(err1, err2);
        assert_ne!(err1, err3);
    }
}
