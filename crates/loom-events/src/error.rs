//! Dispatch outcome types.
//!
//! Handler failures never propagate out of `dispatch`; they are logged and
//! collected into a [`DispatchReport`] the publisher may inspect or ignore.

use loom_core::{ComponentId, ErrorKind, EventId};
use thiserror::Error;

use crate::event::EventKind;

/// A handler failed while processing an event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("handler #{position} for {kind} event {event_id} failed: {message}")]
pub struct HandlerExecutionError {
    /// The event being processed.
    pub event_id: EventId,
    /// Its kind.
    pub kind: EventKind,
    /// Position of the handler in the snapshot it ran from.
    pub position: usize,
    /// Owning component, for channel subscribers.
    pub subscriber: Option<ComponentId>,
    /// What went wrong.
    pub message: String,
    /// Whether the handler panicked rather than returning an error.
    pub panicked: bool,
}

impl HandlerExecutionError {
    /// Returns the taxonomy category of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        ErrorKind::HandlerExecution
    }

    /// Handler failures are reported once; the dispatcher never re-invokes.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        false
    }
}

/// What happened during one dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    /// The dispatched event.
    pub event_id: EventId,
    /// Handlers and subscribers invoked.
    pub invoked: usize,
    /// Contained failures, in invocation order.
    pub failures: Vec<HandlerExecutionError>,
}

impl DispatchReport {
    pub(crate) const fn new(event_id: EventId) -> Self {
        Self {
            event_id,
            invoked: 0,
            failures: Vec::new(),
        }
    }

    /// Handlers that completed without error.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.invoked - self.failures.len()
    }

    /// Whether every handler succeeded.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub(crate) fn merge(&mut self, other: Self) {
        self.invoked += other.invoked;
        self.failures.extend(other.failures);
    }
}
