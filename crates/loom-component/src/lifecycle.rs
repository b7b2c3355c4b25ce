//! Component lifecycle state machine.
//!
//! The adjacency table is fixed at compile time: [`successors`] returns the
//! legal targets for every state, and nothing derives edges at runtime.
//!
//! # State Machine
//!
//! ```text
//!  CONCEPTION -> INITIALIZING -> CONFIGURING -> SPECIALIZING
//!      -> DEVELOPING_FEATURES -> READY
//!
//!  READY <-> { ACTIVE, WAITING, ADAPTING, TRANSFORMING }   (operational)
//!        <-> { STABLE, SPAWNING, DEGRADED, MAINTAINING }   (advanced)
//!
//!  READY | operational | advanced -> TERMINATING -> TERMINATED -> ARCHIVED
//! ```
//!
//! Self-transitions are not in the table.

use loom_core::{ComponentId, LifecycleState};

use crate::error::{ComponentError, Result};

/// States traversed by a freshly created component, after `CONCEPTION`.
pub const CREATION_PATH: [LifecycleState; 5] = [
    LifecycleState::Initializing,
    LifecycleState::Configuring,
    LifecycleState::Specializing,
    LifecycleState::DevelopingFeatures,
    LifecycleState::Ready,
];

/// Legal targets from `state`, in table order.
#[must_use]
pub const fn successors(state: LifecycleState) -> &'static [LifecycleState] {
    use LifecycleState::{
        Active, Adapting, Archived, Conception, Configuring, Degraded, DevelopingFeatures,
        Initializing, Maintaining, Ready, Spawning, Specializing, Stable, Terminated,
        Terminating, Transforming, Waiting,
    };

    match state {
        Conception => &[Initializing],
        Initializing => &[Configuring],
        Configuring => &[Specializing],
        Specializing => &[DevelopingFeatures],
        DevelopingFeatures => &[Ready],
        Ready => &[Active, Waiting, Adapting, Transforming, Terminating],
        Active => &[
            Ready,
            Waiting,
            Adapting,
            Transforming,
            Stable,
            Degraded,
            Terminating,
        ],
        Waiting => &[Ready, Active, Adapting, Transforming, Terminating],
        Adapting => &[Ready, Active, Waiting, Transforming, Stable, Terminating],
        Transforming => &[
            Ready,
            Active,
            Waiting,
            Adapting,
            Stable,
            Spawning,
            Terminating,
        ],
        Stable => &[
            Ready,
            Active,
            Spawning,
            Degraded,
            Maintaining,
            Terminating,
        ],
        Spawning => &[Ready, Active, Stable, Terminating],
        Degraded => &[Ready, Active, Maintaining, Terminating],
        Maintaining => &[Ready, Active, Stable, Terminating],
        Terminating => &[Terminated],
        Terminated => &[Archived],
        Archived => &[],
    }
}

/// Check if a state transition is valid according to the adjacency table.
#[must_use]
pub const fn is_valid_transition(from: LifecycleState, to: LifecycleState) -> bool {
    let targets = successors(from);
    let mut i = 0;
    while i < targets.len() {
        if targets[i].as_u8() == to.as_u8() {
            return true;
        }
        i += 1;
    }
    false
}

/// Returns the list of valid target states from the given state.
#[must_use]
pub fn valid_transitions_from(state: LifecycleState) -> Vec<LifecycleState> {
    successors(state).to_vec()
}

/// Validates a state transition and returns the target state if valid.
///
/// # Errors
///
/// Returns `ComponentError::StateTransition` if the edge is not in the table.
pub fn validate_transition(
    component_id: ComponentId,
    from: LifecycleState,
    to: LifecycleState,
) -> Result<LifecycleState> {
    if is_valid_transition(from, to) {
        Ok(to)
    } else {
        Err(ComponentError::StateTransition {
            component_id,
            from,
            to,
            valid: valid_transitions_from(from),
        })
    }
}

/// Returns true for the construction states before `READY`.
#[must_use]
pub const fn is_early_stage(state: LifecycleState) -> bool {
    matches!(
        state,
        LifecycleState::Conception
            | LifecycleState::Initializing
            | LifecycleState::Configuring
            | LifecycleState::Specializing
            | LifecycleState::DevelopingFeatures
    )
}

/// Returns true for the operational substates.
#[must_use]
pub const fn is_operational(state: LifecycleState) -> bool {
    matches!(
        state,
        LifecycleState::Active
            | LifecycleState::Waiting
            | LifecycleState::Adapting
            | LifecycleState::Transforming
    )
}

/// Returns true for the advanced substates.
#[must_use]
pub const fn is_advanced(state: LifecycleState) -> bool {
    matches!(
        state,
        LifecycleState::Stable
            | LifecycleState::Spawning
            | LifecycleState::Degraded
            | LifecycleState::Maintaining
    )
}

/// Returns true once shutdown has begun.
#[must_use]
pub const fn is_terminal(state: LifecycleState) -> bool {
    matches!(
        state,
        LifecycleState::Terminating | LifecycleState::Terminated | LifecycleState::Archived
    )
}

/// Returns true if the component can take on work in this state.
#[must_use]
pub const fn accepts_work(state: LifecycleState) -> bool {
    matches!(
        state,
        LifecycleState::Ready
            | LifecycleState::Active
            | LifecycleState::Waiting
            | LifecycleState::Adapting
            | LifecycleState::Transforming
            | LifecycleState::Stable
    )
}
