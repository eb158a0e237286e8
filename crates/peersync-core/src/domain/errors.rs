//! Domain error types
//!
//! Validation failures and invalid state transitions raised by the pure
//! domain layer. Engine-level errors (network, transfer, sync) live in
//! their respective crates.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid relative path format or content
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Invalid content hash format (expected lowercase hex SHA-256)
    #[error("Invalid hash format: {0}")]
    InvalidHash(String),

    /// Invalid peer identifier
    #[error("Invalid peer id: {0}")]
    InvalidPeerId(String),

    /// Invalid session identifier
    #[error("Invalid session id: {0}")]
    InvalidSessionId(String),

    /// ID parsing error
    #[error("Invalid ID format: {0}")]
    InvalidId(String),

    /// Invalid connection state transition attempt
    #[error("Invalid connection state transition from {from} to {to}")]
    InvalidTransition {
        /// The current state
        from: String,
        /// The attempted target state
        to: String,
    },

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DomainError::InvalidPath("bad//path".to_string());
        assert_eq!(err.to_string(), "Invalid path: bad//path");

        let err = DomainError::InvalidTransition {
            from: "Connected".to_string(),
            to: "Connecting".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid connection state transition from Connected to Connecting"
        );
    }

    #[test]
    fn test_error_equality() {
        let err1 = DomainError::InvalidHash("xyz".to_string());
        let err2 = DomainError::InvalidHash("xyz".to_string());
        assert_eq!(err1, err2);
    }
}
