//! Error types for composition and orchestration.

use loom_component::ComponentError;
use loom_core::{ComponentId, CoreError, ErrorKind};
use thiserror::Error;

use crate::machine_state::{MachineOperation, MachineState};

/// A result type using `ComposeError`.
pub type Result<T> = std::result::Result<T, ComposeError>;

/// Errors that can occur while building composites or driving machines.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComposeError {
    /// A name, member or parameter was rejected before any mutation.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A referenced member, composite or link does not exist.
    #[error("{entity} not found: {key}")]
    NotFound {
        /// What was looked up (`"component"`, `"composite"`, `"link"`).
        entity: &'static str,
        /// The id or name that missed.
        key: String,
    },

    /// The connection would close a cycle. Nothing was changed.
    #[error("connecting {from} -> {to} would close the cycle {}", path.join(" -> "))]
    Structural {
        /// Requested edge source.
        from: String,
        /// Requested edge target.
        to: String,
        /// The cycle, starting and ending at `from`.
        path: Vec<String>,
    },

    /// The machine's current state does not allow the operation.
    #[error(
        "machine {machine_id} cannot {operation} while {from}; valid states: {}",
        format_states(.valid_states)
    )]
    StateTransition {
        /// The machine.
        machine_id: ComponentId,
        /// Its current state.
        from: MachineState,
        /// The rejected operation.
        operation: MachineOperation,
        /// States in which the operation is allowed.
        valid_states: Vec<MachineState>,
    },

    /// The composite was destroyed and accepts no further changes.
    #[error("composite {name} ({composite_id}) is destroyed")]
    Destroyed {
        /// The composite.
        composite_id: ComponentId,
        /// Its name.
        name: String,
    },

    /// A member component rejected an operation.
    #[error(transparent)]
    Component(#[from] ComponentError),
}

impl ComposeError {
    pub(crate) fn not_found(entity: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    /// Returns the taxonomy category of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Core(err) => err.kind(),
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Structural { .. } => ErrorKind::Structural,
            Self::StateTransition { .. } | Self::Destroyed { .. } => ErrorKind::StateTransition,
            Self::Component(err) => err.kind(),
        }
    }

    /// Returns true if this error might be resolved by retrying.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        false
    }
}

fn format_states(states: &[MachineState]) -> String {
    states
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
