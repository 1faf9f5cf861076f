use thiserror::Error;

use crate::models::{DocumentId, WeightClass};

/// Main error type for quarry operations
///
/// Every variant is scoped to the operation that produced it; none of them
/// leaves the engine unusable.
#[derive(Error, Debug)]
pub enum QuarryError {
    #[error("Tokenization failed for {class} field: {reason}")]
    TokenizationFailure { class: WeightClass, reason: String },

    #[error("Unknown document: {0}")]
    UnknownDocument(DocumentId),

    #[error("Pending backlog full: {pending} records staged, hard cap is {hard_cap}")]
    MergeOverflow { pending: usize, hard_cap: usize },

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Snapshot error: incompatible version {actual}, expected <= {expected}")]
    IncompatibleSnapshot { expected: u32, actual: u32 },

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for quarry operations
pub type Result<T> = std::result::Result<T, QuarryError>;

impl QuarryError {
    /// Backpressure: the caller should retry once the backlog drains
    pub fn is_retriable(&self) -> bool {
        matches!(self, QuarryError::MergeOverflow { .. })
    }

    /// The operation was a no-op and the error is informational
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            QuarryError::UnknownDocument(_) | QuarryError::TokenizationFailure { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = QuarryError::UnknownDocument(42);
        assert_eq!(err.to_string(), "Unknown document: 42");

        let err = QuarryError::TokenizationFailure {
            class: WeightClass::Title,
            reason: "invalid utf-8".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Tokenization failed for title field: invalid utf-8"
        );
    }

    #[test]
    fn test_retriable_errors() {
        let overflow = QuarryError::MergeOverflow {
            pending: 10,
            hard_cap: 10,
        };
        assert!(overflow.is_retriable());
        assert!(!QuarryError::UnknownDocument(1).is_retriable());
        assert!(!QuarryError::InvalidQuery("empty".to_string()).is_retriable());
    }

    #[test]
    fn test_warning_errors() {
        assert!(QuarryError::UnknownDocument(1).is_warning());
        assert!(!QuarryError::InvalidQuery("k must be positive".to_string()).is_warning());
    }
}
