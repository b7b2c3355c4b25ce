//! Connection types between components.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The kind of relationship a directed connection expresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionType {
    /// Output of the source feeds the target.
    #[default]
    DataFlow,
    /// The source drives the target's control decisions.
    Control,
    /// The target reacts to events raised by the source.
    Event,
    /// The source observes the target's health.
    Monitoring,
    /// Collaboration between equals.
    Peer,
    /// The target reshapes the source's output.
    Transformation,
    /// The target checks the source's output.
    Validation,
}

impl ConnectionType {
    /// Snake-case name, as serialized.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DataFlow => "data_flow",
            Self::Control => "control",
            Self::Event => "event",
            Self::Monitoring => "monitoring",
            Self::Peer => "peer",
            Self::Transformation => "transformation",
            Self::Validation => "validation",
        }
    }
}

impl fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
