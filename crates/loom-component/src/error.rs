//! Error types for component lifecycle operations.

use loom_core::{ComponentId, CoreError, ErrorKind, LifecycleState};
use thiserror::Error;

/// A result type using `ComponentError`.
pub type Result<T> = std::result::Result<T, ComponentError>;

/// Errors that can occur while driving a component.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComponentError {
    /// Identity or parameter validation failed.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The requested transition is not in the adjacency table.
    #[error(
        "invalid state transition for component {component_id}: cannot transition from {from} to {to}; valid: {}",
        format_states(.valid)
    )]
    StateTransition {
        /// The component being transitioned.
        component_id: ComponentId,
        /// The current state.
        from: LifecycleState,
        /// The requested target state.
        to: LifecycleState,
        /// Targets the table allows from `from`.
        valid: Vec<LifecycleState>,
    },

    /// The component is shutting down or shut down; only archival remains.
    #[error("component {component_id} is shut down (state {state})")]
    Terminated {
        /// The component.
        component_id: ComponentId,
        /// Its state when the call was rejected.
        state: LifecycleState,
    },
}

impl ComponentError {
    /// Returns the taxonomy category of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Core(err) => err.kind(),
            Self::StateTransition { .. } | Self::Terminated { .. } => ErrorKind::StateTransition,
        }
    }

    /// Returns true if this error might be resolved by retrying.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        false
    }
}

fn format_states(states: &[LifecycleState]) -> String {
    if states.is_empty() {
        return "none".to_string();
    }
    states
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kinds() {
        let component_id = ComponentId::generate();

        assert_eq!(
            ComponentError::from(CoreError::validation("reason", "empty")).kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            ComponentError::StateTransition {
                component_id,
                from: LifecycleState::Ready,
                to: LifecycleState::Archived,
                valid: vec![],
            }
            .kind(),
            ErrorKind::StateTransition
        );
        assert_eq!(
            ComponentError::Terminated {
                component_id,
                state: LifecycleState::Terminated,
            }
            .kind(),
            ErrorKind::StateTransition
        );
    }

    #[test]
    fn transition_message_names_states() {
        let err = ComponentError::StateTransition {
            component_id: ComponentId::generate(),
            from: LifecycleState::Ready,
            to: LifecycleState::Archived,
            valid: vec![LifecycleState::Active],
        };
        let message = err.to_string();
        assert!(message.contains("READY"));
        assert!(message.contains("ARCHIVED"));
        assert!(message.ends_with("; valid: ACTIVE"));
        assert!(!err.is_retriable());
    }

    #[test]
    fn transition_message_without_targets() {
        let err = ComponentError::StateTransition {
            component_id: ComponentId::generate(),
            from: LifecycleState::Archived,
            to: LifecycleState::Ready,
            valid: vec![],
        };
        assert!(err.to_string().ends_with("; valid: none"));
    }
}
