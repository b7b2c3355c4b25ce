//! Event handler trait.

use std::sync::Arc;

use thiserror::Error;

use crate::event::DomainEvent;

/// Failure reported by a handler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
}

impl HandlerError {
    /// Build a handler error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The failure message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Result returned by a handler.
pub type HandlerResult = std::result::Result<(), HandlerError>;

/// Something that reacts to domain events.
///
/// Handlers are best-effort observers: a returned error (or a panic) is
/// contained by the dispatcher and never reaches the publisher.
pub trait EventHandler: Send + Sync {
    /// React to one event.
    ///
    /// # Errors
    ///
    /// Any error is logged by the dispatcher and recorded in its report.
    fn handle(&self, event: &DomainEvent) -> HandlerResult;
}

impl<F> EventHandler for F
where
    F: Fn(&DomainEvent) -> HandlerResult + Send + Sync,
{
    fn handle(&self, event: &DomainEvent) -> HandlerResult {
        self(event)
    }
}

/// A shareable handler. Identity for (un)registration is the allocation,
/// so keep the `Arc` around to unregister later.
pub type SharedHandler = Arc<dyn EventHandler>;

/// Box a closure as a [`SharedHandler`].
pub fn handler<F>(f: F) -> SharedHandler
where
    F: Fn(&DomainEvent) -> HandlerResult + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Whether two handles point at the same handler.
pub(crate) fn same_handler(a: &SharedHandler, b: &SharedHandler) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a).cast::<()>(),
        Arc::as_ptr(b).cast::<()>(),
    )
}
