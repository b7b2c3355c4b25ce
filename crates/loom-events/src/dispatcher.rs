//! Publish/subscribe event dispatcher.
//!
//! The dispatcher keeps two tables:
//!
//! - event kind -> ordered handler list
//! - channel name -> ordered subscriber list
//!
//! Both tables are copy-on-write. Writers build a new list under the write
//! lock and swap it in; `dispatch` clones the current `Arc` snapshot under the
//! read lock and releases it before running any handler. A reader therefore
//! never observes a half-updated list, and handlers may register, unregister,
//! subscribe or publish re-entrantly. Changes made while a dispatch is running
//! take effect on the next dispatch.
//!
//! Dispatch is synchronous: every handler runs on the caller's thread, in
//! registration order, before `dispatch` returns.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use loom_core::{ComponentId, CoreError};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{DispatchReport, HandlerExecutionError};
use crate::event::{DomainEvent, EventKind};
use crate::handler::{same_handler, SharedHandler};

/// Handle for one channel subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// The raw sequence number.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

#[derive(Clone)]
struct Subscriber {
    id: SubscriptionId,
    component_id: ComponentId,
    handler: SharedHandler,
}

/// Routes domain events to handlers and data events to channel subscribers.
///
/// Build one per runtime and share it (`Arc<EventDispatcher>`) with every
/// component, composite and machine.
pub struct EventDispatcher {
    handlers: RwLock<HashMap<EventKind, Arc<[SharedHandler]>>>,
    channels: RwLock<HashMap<String, Arc<[Subscriber]>>>,
    next_subscription: AtomicU64,
}

impl EventDispatcher {
    /// Create an empty dispatcher.
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            channels: RwLock::new(HashMap::new()),
            next_subscription: AtomicU64::new(1),
        }
    }

    /// Create an empty dispatcher behind an `Arc`.
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    // =========================================================================
    // Handler table
    // =========================================================================

    /// Append `handler` to the list for `kind`.
    ///
    /// Returns `false` (and changes nothing) if the same handler is already
    /// registered for that kind.
    pub fn register_handler(&self, kind: EventKind, handler: SharedHandler) -> bool {
        let mut table = self.handlers.write();
        let mut next: Vec<SharedHandler> = table.get(&kind).map(|l| l.to_vec()).unwrap_or_default();
        if next.iter().any(|h| same_handler(h, &handler)) {
            return false;
        }
        next.push(handler);
        let count = next.len();
        table.insert(kind, next.into());
        drop(table);

        tracing::debug!(%kind, handlers = count, "Registered event handler");
        true
    }

    /// Remove `handler` from the list for `kind`.
    ///
    /// Returns `false` if it was not registered.
    pub fn unregister_handler(&self, kind: EventKind, handler: &SharedHandler) -> bool {
        let mut table = self.handlers.write();
        let Some(current) = table.get(&kind) else {
            return false;
        };
        let next: Vec<SharedHandler> = current
            .iter()
            .filter(|h| !same_handler(h, handler))
            .cloned()
            .collect();
        if next.len() == current.len() {
            return false;
        }
        if next.is_empty() {
            table.remove(&kind);
        } else {
            table.insert(kind, next.into());
        }
        drop(table);

        tracing::debug!(%kind, "Unregistered event handler");
        true
    }

    /// Number of handlers registered for `kind`.
    #[must_use]
    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.handlers.read().get(&kind).map_or(0, |l| l.len())
    }

    /// Run every handler registered for the event's kind, in registration
    /// order. Failures are contained and reported, never returned.
    pub fn dispatch(&self, event: &DomainEvent) -> DispatchReport {
        let snapshot = self.handlers.read().get(&event.kind()).cloned();
        let mut report = DispatchReport::new(event.id());

        if let Some(handlers) = snapshot {
            for (position, handler) in handlers.iter().enumerate() {
                report.invoked += 1;
                if let Err(failure) = invoke(handler, event) {
                    report
                        .failures
                        .push(failure.into_error(event, position, None));
                }
            }
        }

        report
    }

    // =========================================================================
    // Channel table
    // =========================================================================

    /// Subscribe `component_id` to `channel`.
    ///
    /// Subscribing the same handler for the same component twice returns the
    /// existing subscription, so each subscriber sees an event at most once.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Validation` if `channel` is empty.
    pub fn subscribe(
        &self,
        component_id: ComponentId,
        channel: &str,
        handler: SharedHandler,
    ) -> loom_core::Result<SubscriptionId> {
        validate_channel(channel)?;

        let mut table = self.channels.write();
        let mut next: Vec<Subscriber> = table.get(channel).map(|l| l.to_vec()).unwrap_or_default();
        if let Some(existing) = next
            .iter()
            .find(|s| s.component_id == component_id && same_handler(&s.handler, &handler))
        {
            return Ok(existing.id);
        }

        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        next.push(Subscriber {
            id,
            component_id,
            handler,
        });
        table.insert(channel.to_string(), next.into());
        drop(table);

        tracing::debug!(
            component_id = %component_id,
            channel,
            subscription = %id,
            "Subscribed to channel"
        );
        Ok(id)
    }

    /// Drop every subscription `component_id` holds on `channel`.
    ///
    /// Returns the number removed.
    pub fn unsubscribe(&self, component_id: ComponentId, channel: &str) -> usize {
        self.retain_subscribers(Some(channel), |s| s.component_id != component_id)
    }

    /// Drop a single subscription by handle. Returns `false` if unknown.
    pub fn cancel(&self, subscription: SubscriptionId) -> bool {
        self.retain_subscribers(None, |s| s.id != subscription) > 0
    }

    /// Number of subscribers on `channel`.
    #[must_use]
    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.channels.read().get(channel).map_or(0, |l| l.len())
    }

    /// Channels with at least one subscriber, sorted.
    #[must_use]
    pub fn channels(&self) -> Vec<String> {
        let mut names: Vec<String> = self.channels.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Wrap `payload` in a data event and deliver it.
    ///
    /// Subscribers of `channel` run first, in subscription order, followed by
    /// any handlers registered for [`EventKind::Data`].
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Validation` if `channel` is empty. Handler
    /// failures are reported, not returned.
    pub fn publish_data(
        &self,
        source: ComponentId,
        channel: &str,
        payload: Value,
    ) -> loom_core::Result<DispatchReport> {
        validate_channel(channel)?;
        let event = DomainEvent::data(source, channel, payload);
        Ok(self.publish(&event))
    }

    /// Deliver an already-built event.
    ///
    /// Data events go to their channel's subscribers and then to the
    /// handlers for their kind; every other kind is plain [`dispatch`](Self::dispatch).
    pub fn publish(&self, event: &DomainEvent) -> DispatchReport {
        let Some((channel, _)) = event.as_data() else {
            return self.dispatch(event);
        };

        let snapshot = self.channels.read().get(channel).cloned();
        let mut report = DispatchReport::new(event.id());

        if let Some(subscribers) = snapshot {
            for (position, subscriber) in subscribers.iter().enumerate() {
                report.invoked += 1;
                if let Err(failure) = invoke(&subscriber.handler, event) {
                    report.failures.push(failure.into_error(
                        event,
                        position,
                        Some(subscriber.component_id),
                    ));
                }
            }
        } else {
            tracing::trace!(channel, "No subscribers on channel");
        }

        report.merge(self.dispatch(event));
        report
    }

    fn retain_subscribers<F>(&self, channel: Option<&str>, keep: F) -> usize
    where
        F: Fn(&Subscriber) -> bool,
    {
        let mut table = self.channels.write();
        let names: Vec<String> = match channel {
            Some(name) => vec![name.to_string()],
            None => table.keys().cloned().collect(),
        };

        let mut removed = 0;
        for name in names {
            let Some(current) = table.get(&name) else {
                continue;
            };
            let next: Vec<Subscriber> = current.iter().filter(|s| keep(s)).cloned().collect();
            let dropped = current.len() - next.len();
            if dropped == 0 {
                continue;
            }
            removed += dropped;
            if next.is_empty() {
                table.remove(&name);
            } else {
                table.insert(name, next.into());
            }
        }
        removed
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let handlers: usize = self.handlers.read().values().map(|l| l.len()).sum();
        let subscribers: usize = self.channels.read().values().map(|l| l.len()).sum();
        f.debug_struct("EventDispatcher")
            .field("handlers", &handlers)
            .field("subscribers", &subscribers)
            .finish_non_exhaustive()
    }
}

struct Failure {
    message: String,
    panicked: bool,
}

impl Failure {
    fn into_error(
        self,
        event: &DomainEvent,
        position: usize,
        subscriber: Option<ComponentId>,
    ) -> HandlerExecutionError {
        tracing::warn!(
            event_id = %event.id(),
            kind = %event.kind(),
            position,
            subscriber = ?subscriber,
            panicked = self.panicked,
            error = %self.message,
            "Event handler failed"
        );
        HandlerExecutionError {
            event_id: event.id(),
            kind: event.kind(),
            position,
            subscriber,
            message: self.message,
            panicked: self.panicked,
        }
    }
}

fn invoke(handler: &SharedHandler, event: &DomainEvent) -> Result<(), Failure> {
    match catch_unwind(AssertUnwindSafe(|| handler.handle(event))) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(Failure {
            message: err.to_string(),
            panicked: false,
        }),
        Err(panic) => Err(Failure {
            message: panic_message(panic.as_ref()),
            panicked: true,
        }),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked".to_string()
    }
}

fn validate_channel(channel: &str) -> loom_core::Result<()> {
    if channel.trim().is_empty() {
        return Err(CoreError::validation("channel", "must not be empty"));
    }
    Ok(())
}
