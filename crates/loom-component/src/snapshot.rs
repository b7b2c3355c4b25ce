//! Serializable point-in-time view of a component.

use chrono::{DateTime, Utc};
use loom_core::{ComponentId, Environment, LifecycleState};
use serde::{Deserialize, Serialize};

use crate::history::TransitionRecord;

/// Detached copy of a component's identity, state and log.
///
/// This is what repository adapters persist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentSnapshot {
    /// Component id.
    pub id: ComponentId,
    /// Hierarchical address.
    pub address: String,
    /// Parent id, if not a root.
    pub parent_id: Option<ComponentId>,
    /// Creation reason.
    pub reason: String,
    /// State when the snapshot was taken.
    pub state: LifecycleState,
    /// Captured environment.
    pub environment: Environment,
    /// Retained transition records, oldest first.
    pub transitions: Vec<TransitionRecord>,
    /// Records dropped from the front of the log.
    pub evicted_transitions: u64,
    /// When the component was created.
    pub created_at: DateTime<Utc>,
}
