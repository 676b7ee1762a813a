//! Error types for the staking ledger

use thiserror::Error;

/// Ledger-wide error type
///
/// Every core operation reports failures through one of these kinds. None of
/// them are retried by the ledger itself.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StakeError {
    /// Missing or malformed input. The caller must correct the request.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A referenced market, user or stake does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Uniqueness violation (duplicate stake, duplicate user identity).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The operation is not permitted in the entity's current state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// No operator credentials were supplied.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Operator credentials were supplied but rejected.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Underlying persistence failure. Safe to retry the whole operation.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl StakeError {
    pub fn validation(msg: impl Into<String>) -> Self {
        StakeError::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        StakeError::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        StakeError::Conflict(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        StakeError::InvalidState(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        StakeError::Unauthorized(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        StakeError::Forbidden(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        StakeError::Storage(msg.into())
    }

    /// Stable machine-readable kind, surfaced in API error bodies
    pub fn kind(&self) -> &'static str {
        match self {
            StakeError::Validation(_) => "validation",
            StakeError::NotFound(_) => "not_found",
            StakeError::Conflict(_) => "conflict",
            StakeError::InvalidState(_) => "invalid_state",
            StakeError::Unauthorized(_) => "unauthorized",
            StakeError::Forbidden(_) => "forbidden",
            StakeError::Storage(_) => "storage",
        }
    }

    /// Human-readable message without the kind prefix
    pub fn message(&self) -> &str {
        match self {
            StakeError::Validation(msg)
            | StakeError::NotFound(msg)
            | StakeError::Conflict(msg)
            | StakeError::InvalidState(msg)
            | StakeError::Unauthorized(msg)
            | StakeError::Forbidden(msg)
            | StakeError::Storage(msg) => msg,
        }
    }
}

/// Result type alias for ledger operations
pub type StakeResult<T> = Result<T, StakeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_and_message() {
        let err = StakeError::invalid_state("Market is not active");
        assert_eq!(err.kind(), "invalid_state");
        assert_eq!(err.message(), "Market is not active");
        assert_eq!(err.to_string(), "Invalid state: Market is not active");
    }
}
