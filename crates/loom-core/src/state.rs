//! Lifecycle states a component moves through.
//!
//! The adjacency table that decides which moves are legal lives in
//! `loom-component`; this module only names the states so lower layers
//! (events, snapshots) can refer to them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a component, in progression order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum LifecycleState {
    /// Initial state, identity just minted.
    Conception = 1,
    /// Acquiring basic structure.
    Initializing = 2,
    /// Applying configuration.
    Configuring = 3,
    /// Taking on a specific role.
    Specializing = 4,
    /// Building role-specific capabilities.
    DevelopingFeatures = 5,
    /// Fully constructed, idle.
    Ready = 6,
    /// Processing work.
    Active = 7,
    /// Blocked on input or a resource.
    Waiting = 8,
    /// Adjusting to changed conditions.
    Adapting = 9,
    /// Changing its processing behavior.
    Transforming = 10,
    /// Settled, optimized operation.
    Stable = 11,
    /// Producing child components.
    Spawning = 12,
    /// Operating with reduced capability.
    Degraded = 13,
    /// Undergoing repair or upkeep.
    Maintaining = 14,
    /// Releasing resources.
    Terminating = 15,
    /// Finished; only archival remains.
    Terminated = 16,
    /// Retained for audit only.
    Archived = 17,
}

impl LifecycleState {
    /// Every state, in progression order.
    pub const ALL: [Self; 17] = [
        Self::Conception,
        Self::Initializing,
        Self::Configuring,
        Self::Specializing,
        Self::DevelopingFeatures,
        Self::Ready,
        Self::Active,
        Self::Waiting,
        Self::Adapting,
        Self::Transforming,
        Self::Stable,
        Self::Spawning,
        Self::Degraded,
        Self::Maintaining,
        Self::Terminating,
        Self::Terminated,
        Self::Archived,
    ];

    /// Convert the state to its numeric representation.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Try to convert a numeric value to a `LifecycleState`.
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        if value == 0 || value as usize > Self::ALL.len() {
            return None;
        }
        Some(Self::ALL[value as usize - 1])
    }

    /// Upper-case name, as used in diagnostics.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Conception => "CONCEPTION",
            Self::Initializing => "INITIALIZING",
            Self::Configuring => "CONFIGURING",
            Self::Specializing => "SPECIALIZING",
            Self::DevelopingFeatures => "DEVELOPING_FEATURES",
            Self::Ready => "READY",
            Self::Active => "ACTIVE",
            Self::Waiting => "WAITING",
            Self::Adapting => "ADAPTING",
            Self::Transforming => "TRANSFORMING",
            Self::Stable => "STABLE",
            Self::Spawning => "SPAWNING",
            Self::Degraded => "DEGRADED",
            Self::Maintaining => "MAINTAINING",
            Self::Terminating => "TERMINATING",
            Self::Terminated => "TERMINATED",
            Self::Archived => "ARCHIVED",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
