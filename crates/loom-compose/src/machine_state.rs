//! Machine state machine.
//!
//! ```text
//!  READY --start--> RUNNING --stop--> STOPPED
//!                     ^                  |
//!                     +------start-------+
//!
//!  RUNNING | STOPPED --destroy--> DESTROYED
//! ```
//!
//! Every machine operation is checked against [`valid_states`] before it
//! touches anything.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Coarse lifecycle of a machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum MachineState {
    /// Built, being populated.
    Ready = 1,
    /// Links deliver; components are operational.
    Running = 2,
    /// Halted; may be reconfigured and restarted.
    Stopped = 3,
    /// Terminal.
    Destroyed = 4,
}

impl MachineState {
    /// Convert the state to its numeric representation.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Try to convert a numeric value to a `MachineState`.
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Ready),
            2 => Some(Self::Running),
            3 => Some(Self::Stopped),
            4 => Some(Self::Destroyed),
            _ => None,
        }
    }
}

impl fmt::Display for MachineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ready => "READY",
            Self::Running => "RUNNING",
            Self::Stopped => "STOPPED",
            Self::Destroyed => "DESTROYED",
        };
        f.write_str(name)
    }
}

/// Operations checked against the machine state table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MachineOperation {
    /// Add a composite.
    AddComposite,
    /// Remove a composite.
    RemoveComposite,
    /// Link two composites.
    ConnectComposites,
    /// Unlink two composites.
    DisconnectComposites,
    /// Start the machine.
    Start,
    /// Stop the machine.
    Stop,
    /// Destroy the machine.
    Destroy,
}

impl MachineOperation {
    /// Snake-case name, as serialized.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AddComposite => "add_composite",
            Self::RemoveComposite => "remove_composite",
            Self::ConnectComposites => "connect_composites",
            Self::DisconnectComposites => "disconnect_composites",
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Destroy => "destroy",
        }
    }
}

impl fmt::Display for MachineOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// States in which `operation` may run.
#[must_use]
pub const fn valid_states(operation: MachineOperation) -> &'static [MachineState] {
    use MachineState::{Ready, Running, Stopped};

    match operation {
        MachineOperation::AddComposite
        | MachineOperation::RemoveComposite
        | MachineOperation::ConnectComposites
        | MachineOperation::DisconnectComposites
        | MachineOperation::Start => &[Ready, Stopped],
        MachineOperation::Stop => &[Running],
        MachineOperation::Destroy => &[Running, Stopped],
    }
}

/// Whether `operation` may run in `state`.
#[must_use]
pub const fn is_allowed(operation: MachineOperation, state: MachineState) -> bool {
    let states = valid_states(operation);
    let mut i = 0;
    while i < states.len() {
        if states[i].as_u8() == state.as_u8() {
            return true;
        }
        i += 1;
    }
    false
}

/// The state `operation` moves the machine to, if it changes state at all.
#[must_use]
pub const fn target_state(operation: MachineOperation) -> Option<MachineState> {
    match operation {
        MachineOperation::Start => Some(MachineState::Running),
        MachineOperation::Stop => Some(MachineState::Stopped),
        MachineOperation::Destroy => Some(MachineState::Destroyed),
        MachineOperation::AddComposite
        | MachineOperation::RemoveComposite
        | MachineOperation::ConnectComposites
        | MachineOperation::DisconnectComposites => None,
    }
}

/// Check if a machine state transition is valid.
#[must_use]
pub const fn is_valid_transition(from: MachineState, to: MachineState) -> bool {
    use MachineState::{Destroyed, Ready, Running, Stopped};

    matches!(
        (from, to),
        (Ready | Stopped, Running) | (Running, Stopped) | (Running | Stopped, Destroyed)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions() {
        use MachineState::*;

        assert!(is_valid_transition(Ready, Running));
        assert!(is_valid_transition(Running, Stopped));
        assert!(is_valid_transition(Stopped, Running));
        assert!(is_valid_transition(Stopped, Destroyed));
        assert!(is_valid_transition(Running, Destroyed));

        assert!(!is_valid_transition(Ready, Stopped));
        assert!(!is_valid_transition(Ready, Destroyed));
        assert!(!is_valid_transition(Destroyed, Ready));
        assert!(!is_valid_transition(Destroyed, Running));
    }

    #[test]
    fn operation_targets_follow_transition_table() {
        let all = [
            MachineOperation::AddComposite,
            MachineOperation::RemoveComposite,
            MachineOperation::ConnectComposites,
            MachineOperation::DisconnectComposites,
            MachineOperation::Start,
            MachineOperation::Stop,
            MachineOperation::Destroy,
        ];
        for operation in all {
            if let Some(target) = target_state(operation) {
                for from in valid_states(operation) {
                    assert!(is_valid_transition(*from, target), "{operation} from {from}");
                }
            }
        }
    }

    #[test]
    fn nothing_runs_when_destroyed() {
        for operation in [
            MachineOperation::AddComposite,
            MachineOperation::Start,
            MachineOperation::Stop,
            MachineOperation::Destroy,
        ] {
            assert!(!is_allowed(operation, MachineState::Destroyed));
        }
        assert!(is_allowed(MachineOperation::Stop, MachineState::Running));
        assert!(!is_allowed(MachineOperation::AddComposite, MachineState::Running));
    }

    #[test]
    fn numeric_round_trip() {
        for state in [
            MachineState::Ready,
            MachineState::Running,
            MachineState::Stopped,
            MachineState::Destroyed,
        ] {
            assert_eq!(MachineState::from_u8(state.as_u8()), Some(state));
        }
        assert_eq!(MachineState::from_u8(0), None);
    }
}
