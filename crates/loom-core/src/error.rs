//! Common error types for loom.
//!
//! Every crate in the workspace classifies its errors into the shared
//! [`ErrorKind`] taxonomy so callers can branch on the category without
//! matching each crate's enum.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A result type using `CoreError`.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Error categories shared across the workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bad name, reason or parameter; rejected before any mutation.
    Validation,
    /// Reference to a nonexistent component, composite or link.
    NotFound,
    /// Illegal lifecycle or machine transition.
    StateTransition,
    /// The operation would introduce a cycle.
    Structural,
    /// An event handler failed; contained at the dispatcher boundary.
    HandlerExecution,
    /// The repository adapter failed.
    Storage,
}

/// Core errors raised by identity and configuration primitives.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// A required field was empty or malformed.
    #[error("invalid {field}: {message}")]
    Validation {
        /// The offending field.
        field: &'static str,
        /// What was wrong with it.
        message: String,
    },

    /// An invalid identifier was provided.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] crate::ids::IdError),
}

impl CoreError {
    /// Build a validation error for `field`.
    #[must_use]
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    /// Returns the taxonomy category of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } | Self::InvalidId(_) => ErrorKind::Validation,
        }
    }

    /// Input errors never succeed on retry.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_message() {
        let err = CoreError::validation("reason", "must not be empty");
        assert_eq!(err.to_string(), "invalid reason: must not be empty");
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(!err.is_retriable());
    }

    #[test]
    fn id_errors_are_validation() {
        let err = CoreError::from(crate::ids::IdError::InvalidUuid);
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}
