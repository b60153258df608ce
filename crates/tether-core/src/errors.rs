//! Failure taxonomy for scope-registered operations.

use thiserror::Error;

/// Terminal failure of an operation running under scoped cancellation.
///
/// Cancellation is a distinct termination signal, not a domain error: code
/// awaiting a cancelled operation sees [`ScopedError::Cancelled`], never a
/// rewrapped domain failure, and domain failures pass through unchanged.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScopedError<E> {
    /// The wrapped operation failed with its own error.
    #[error("operation failed: {0}")]
    Failed(E),

    /// The operation was cancelled before it completed.
    #[error("operation was cancelled")]
    Cancelled,
}

impl<E> ScopedError<E> {
    /// True for the cancellation signal.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// The domain failure, if this is one.
    pub fn failed(&self) -> Option<&E> {
        match self {
            Self::Failed(err) => Some(err),
            Self::Cancelled => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_is_not_a_domain_failure() {
        let err: ScopedError<String> = ScopedError::Cancelled;
        assert!(err.is_cancelled());
        assert!(err.failed().is_none());

        let err: ScopedError<String> = ScopedError::Failed("boom".to_string());
        assert!(!err.is_cancelled());
        assert_eq!(err.failed().map(String::as_str), Some("boom"));
    }
}
