//! Per-member outcomes of bulk lifecycle operations.

use loom_component::ComponentError;
use loom_core::ComponentId;

/// What happened to each member during a bulk operation.
///
/// Individual failures are logged and collected here; they never abort the
/// rest of the batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberReport {
    /// Members the operation moved.
    pub succeeded: Vec<ComponentId>,
    /// Members already in the requested condition.
    pub skipped: Vec<ComponentId>,
    /// Members that rejected the operation.
    pub failed: Vec<(ComponentId, ComponentError)>,
}

impl MemberReport {
    /// Whether no member failed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    /// Members visited.
    #[must_use]
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.skipped.len() + self.failed.len()
    }

    /// Fold another report into this one.
    pub fn merge(&mut self, other: Self) {
        self.succeeded.extend(other.succeeded);
        self.skipped.extend(other.skipped);
        self.failed.extend(other.failed);
    }
}
