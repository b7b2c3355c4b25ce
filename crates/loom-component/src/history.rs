//! Bounded transition log.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use loom_core::LifecycleState;
use serde::{Deserialize, Serialize};

/// One applied lifecycle transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord {
    /// When the transition was applied.
    pub timestamp: DateTime<Utc>,
    /// State before.
    pub from: LifecycleState,
    /// State after.
    pub to: LifecycleState,
}

/// Append-only log that keeps the newest `capacity` records.
#[derive(Debug, Clone)]
pub(crate) struct TransitionLog {
    entries: VecDeque<TransitionRecord>,
    capacity: usize,
    evicted: u64,
}

impl TransitionLog {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity.min(64)),
            capacity,
            evicted: 0,
        }
    }

    pub(crate) fn push(&mut self, record: TransitionRecord) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
            self.evicted += 1;
        }
        self.entries.push_back(record);
    }

    pub(crate) fn to_vec(&self) -> Vec<TransitionRecord> {
        self.entries.iter().copied().collect()
    }

    pub(crate) fn last(&self) -> Option<TransitionRecord> {
        self.entries.back().copied()
    }

    pub(crate) const fn evicted(&self) -> u64 {
        self.evicted
    }
}
