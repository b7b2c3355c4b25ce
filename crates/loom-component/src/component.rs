//! Components: an identity driven through the lifecycle state machine.
//!
//! A component is always handled as `Arc<Component>`. Children keep a `Weak`
//! handle to their parent, so the ownership graph stays acyclic even though
//! the logical hierarchy is a tree.
//!
//! All state changes happen under the component's own mutex, check-then-act:
//! a rejected transition leaves state, log and event queue untouched. The
//! current state is mirrored in an atomic so [`Component::state`] never
//! blocks.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Weak};

use chrono::Utc;
use loom_core::{ComponentId, CoreError, Environment, Identity, LifecycleState};
use loom_events::{DispatchReport, DomainEvent, EventDispatcher, SharedHandler, SubscriptionId};
use parking_lot::Mutex;
use serde_json::Value;

use crate::config::LifecycleConfig;
use crate::error::{ComponentError, Result};
use crate::history::{TransitionLog, TransitionRecord};
use crate::lifecycle;
use crate::snapshot::ComponentSnapshot;

struct Inner {
    log: TransitionLog,
    pending: Vec<DomainEvent>,
    subscriptions: Vec<(SubscriptionId, String)>,
}

/// A stateful processing unit with identity and a managed lifecycle.
pub struct Component {
    identity: Identity,
    parent: Option<Weak<Component>>,
    dispatcher: Arc<EventDispatcher>,
    state: AtomicU8,
    shut_down: AtomicBool,
    inner: Mutex<Inner>,
}

impl Component {
    // =========================================================================
    // Construction
    // =========================================================================

    /// Create a root component and drive it to `READY`.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `reason` is empty.
    pub fn create(
        dispatcher: &Arc<EventDispatcher>,
        reason: impl Into<String>,
        environment: Environment,
    ) -> Result<Arc<Self>> {
        Self::create_with_config(dispatcher, reason, environment, &LifecycleConfig::default())
    }

    /// [`create`](Self::create) with explicit lifecycle settings.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `reason` is empty.
    pub fn create_with_config(
        dispatcher: &Arc<EventDispatcher>,
        reason: impl Into<String>,
        environment: Environment,
        config: &LifecycleConfig,
    ) -> Result<Arc<Self>> {
        let identity = Identity::create_root(reason, environment)?;
        Ok(Self::build(dispatcher, identity, None, config))
    }

    /// Create a child of `parent` and drive it to `READY`.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `reason` is empty or `parent` has been
    /// terminated.
    pub fn create_child(
        dispatcher: &Arc<EventDispatcher>,
        reason: impl Into<String>,
        environment: Environment,
        parent: &Arc<Self>,
    ) -> Result<Arc<Self>> {
        Self::create_child_with_config(
            dispatcher,
            reason,
            environment,
            parent,
            &LifecycleConfig::default(),
        )
    }

    /// [`create_child`](Self::create_child) with explicit lifecycle settings.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `reason` is empty or `parent` has been
    /// terminated.
    pub fn create_child_with_config(
        dispatcher: &Arc<EventDispatcher>,
        reason: impl Into<String>,
        environment: Environment,
        parent: &Arc<Self>,
        config: &LifecycleConfig,
    ) -> Result<Arc<Self>> {
        if parent.is_shut_down() {
            return Err(CoreError::validation(
                "parent",
                format!("component {} is {}", parent.id(), parent.state()),
            )
            .into());
        }
        let identity = Identity::create_child(reason, environment, &parent.identity)?;
        Ok(Self::build(
            dispatcher,
            identity,
            Some(Arc::downgrade(parent)),
            config,
        ))
    }

    fn build(
        dispatcher: &Arc<EventDispatcher>,
        identity: Identity,
        parent: Option<Weak<Self>>,
        config: &LifecycleConfig,
    ) -> Arc<Self> {
        let created = DomainEvent::created(identity.id(), identity.address(), identity.reason());
        let component = Self {
            identity,
            parent,
            dispatcher: Arc::clone(dispatcher),
            state: AtomicU8::new(LifecycleState::Conception.as_u8()),
            shut_down: AtomicBool::new(false),
            inner: Mutex::new(Inner {
                log: TransitionLog::with_capacity(config.transition_log_capacity),
                pending: vec![created],
                subscriptions: Vec::new(),
            }),
        };

        {
            let mut inner = component.inner.lock();
            let mut from = LifecycleState::Conception;
            for to in lifecycle::CREATION_PATH {
                component.apply(&mut inner, from, to);
                from = to;
            }
        }

        tracing::info!(
            component_id = %component.id(),
            address = %component.address(),
            reason = %component.identity.reason(),
            "Component created"
        );
        Arc::new(component)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// The component's identity.
    #[must_use]
    pub const fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Shorthand for `identity().id()`.
    #[must_use]
    pub const fn id(&self) -> ComponentId {
        self.identity.id()
    }

    /// Shorthand for `identity().address()`.
    #[must_use]
    pub fn address(&self) -> &str {
        self.identity.address()
    }

    /// The environment captured at construction.
    #[must_use]
    pub const fn environment(&self) -> &Environment {
        self.identity.environment()
    }

    /// The dispatcher this component raises events through.
    #[must_use]
    pub const fn dispatcher(&self) -> &Arc<EventDispatcher> {
        &self.dispatcher
    }

    /// The parent, if it is still alive.
    #[must_use]
    pub fn parent(&self) -> Option<Arc<Self>> {
        self.parent.as_ref().and_then(Weak::upgrade)
    }

    /// Current lifecycle state. Never blocks.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        LifecycleState::from_u8(self.state.load(Ordering::Acquire))
            .unwrap_or(LifecycleState::Conception)
    }

    /// Targets the adjacency table allows from the current state.
    #[must_use]
    pub fn valid_transitions(&self) -> Vec<LifecycleState> {
        lifecycle::valid_transitions_from(self.state())
    }

    /// Retained transition records, oldest first.
    #[must_use]
    pub fn transition_log(&self) -> Vec<TransitionRecord> {
        self.inner.lock().log.to_vec()
    }

    /// The most recent transition.
    #[must_use]
    pub fn last_transition(&self) -> Option<TransitionRecord> {
        self.inner.lock().log.last()
    }

    /// Records evicted from the bounded log.
    #[must_use]
    pub fn evicted_transitions(&self) -> u64 {
        self.inner.lock().log.evicted()
    }

    /// Whether `terminate` has been called (or the component reached
    /// `TERMINATED` some other way).
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire) || lifecycle::is_terminal(self.state())
    }

    /// See [`lifecycle::is_early_stage`].
    #[must_use]
    pub fn is_early_stage(&self) -> bool {
        lifecycle::is_early_stage(self.state())
    }

    /// See [`lifecycle::is_operational`].
    #[must_use]
    pub fn is_operational(&self) -> bool {
        lifecycle::is_operational(self.state())
    }

    /// See [`lifecycle::is_advanced`].
    #[must_use]
    pub fn is_advanced(&self) -> bool {
        lifecycle::is_advanced(self.state())
    }

    /// See [`lifecycle::is_terminal`].
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        lifecycle::is_terminal(self.state())
    }

    /// See [`lifecycle::accepts_work`].
    #[must_use]
    pub fn accepts_work(&self) -> bool {
        !self.shut_down.load(Ordering::Acquire) && lifecycle::accepts_work(self.state())
    }

    /// Serializable copy of identity, state and log.
    #[must_use]
    pub fn snapshot(&self) -> ComponentSnapshot {
        let inner = self.inner.lock();
        ComponentSnapshot {
            id: self.id(),
            address: self.address().to_string(),
            parent_id: self.identity.parent_id(),
            reason: self.identity.reason().to_string(),
            state: self.state(),
            environment: self.environment().clone(),
            transitions: inner.log.to_vec(),
            evicted_transitions: inner.log.evicted(),
            created_at: self.identity.created_at(),
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Apply one edge of the adjacency table.
    ///
    /// On success the pending queue, including the new `StateChanged`
    /// event, is dispatched after the component lock is released.
    ///
    /// # Errors
    ///
    /// Returns `ComponentError::StateTransition` if the edge is not in the
    /// table, or `ComponentError::Terminated` once `terminate` has been
    /// called (archival excepted). State is unchanged on error.
    pub fn transition_to(&self, to: LifecycleState) -> Result<()> {
        let mut inner = self.inner.lock();
        let from = self.state();

        if self.shut_down.load(Ordering::Acquire) && to != LifecycleState::Archived {
            return Err(self.shut_down_error());
        }
        lifecycle::validate_transition(self.id(), from, to)?;
        self.apply(&mut inner, from, to);

        if to == LifecycleState::Terminated {
            self.shut_down.store(true, Ordering::Release);
            let subscriptions = std::mem::take(&mut inner.subscriptions);
            drop(inner);
            self.release(subscriptions);
        } else {
            drop(inner);
        }
        self.dispatch_pending();
        Ok(())
    }

    /// `READY` (or another state with an `ACTIVE` edge) to `ACTIVE`.
    ///
    /// # Errors
    ///
    /// See [`transition_to`](Self::transition_to).
    pub fn activate(&self) -> Result<()> {
        self.transition_to(LifecycleState::Active)
    }

    /// Back to `READY` from an operational or advanced state.
    ///
    /// # Errors
    ///
    /// See [`transition_to`](Self::transition_to).
    pub fn deactivate(&self) -> Result<()> {
        self.transition_to(LifecycleState::Ready)
    }

    /// `TERMINATED` to `ARCHIVED`.
    ///
    /// # Errors
    ///
    /// See [`transition_to`](Self::transition_to).
    pub fn archive(&self) -> Result<()> {
        self.transition_to(LifecycleState::Archived)
    }

    /// Drive the component through `TERMINATING` to `TERMINATED`, cancel
    /// its channel subscriptions and dispatch the pending queue.
    ///
    /// The component is marked as shutting down before the state lock is
    /// taken, so concurrent operations fail fast instead of queueing.
    ///
    /// # Errors
    ///
    /// Returns `ComponentError::StateTransition` on a second call, or if the
    /// current state has no path to `TERMINATING`. State is unchanged on
    /// error.
    pub fn terminate(&self) -> Result<()> {
        let id = self.id();
        if self.shut_down.swap(true, Ordering::AcqRel) {
            let from = self.state();
            return Err(ComponentError::StateTransition {
                component_id: id,
                from,
                to: LifecycleState::Terminating,
                valid: lifecycle::valid_transitions_from(from),
            });
        }

        let mut inner = self.inner.lock();
        let from = self.state();
        if from != LifecycleState::Terminating {
            if let Err(err) = lifecycle::validate_transition(id, from, LifecycleState::Terminating) {
                if !lifecycle::is_terminal(from) {
                    self.shut_down.store(false, Ordering::Release);
                }
                return Err(err);
            }
            self.apply(&mut inner, from, LifecycleState::Terminating);
        }
        self.apply(
            &mut inner,
            LifecycleState::Terminating,
            LifecycleState::Terminated,
        );
        let subscriptions = std::mem::take(&mut inner.subscriptions);
        drop(inner);

        let cancelled = self.release(subscriptions);
        self.dispatch_pending();
        tracing::info!(
            component_id = %id,
            address = %self.address(),
            cancelled_subscriptions = cancelled,
            "Component terminated"
        );
        Ok(())
    }

    fn apply(&self, inner: &mut Inner, from: LifecycleState, to: LifecycleState) {
        inner.log.push(TransitionRecord {
            timestamp: Utc::now(),
            from,
            to,
        });
        inner
            .pending
            .push(DomainEvent::state_changed(self.id(), from, to));
        self.state.store(to.as_u8(), Ordering::Release);

        tracing::debug!(component_id = %self.id(), %from, %to, "Lifecycle transition");
    }

    fn release(&self, subscriptions: Vec<(SubscriptionId, String)>) -> usize {
        subscriptions
            .into_iter()
            .filter(|(subscription, _)| self.dispatcher.cancel(*subscription))
            .count()
    }

    fn shut_down_error(&self) -> ComponentError {
        ComponentError::Terminated {
            component_id: self.id(),
            state: self.state(),
        }
    }

    fn ensure_live(&self) -> Result<()> {
        if self.is_shut_down() {
            return Err(self.shut_down_error());
        }
        Ok(())
    }

    // =========================================================================
    // Channels
    // =========================================================================

    /// Subscribe this component to `channel`. The subscription is cancelled
    /// automatically by [`terminate`](Self::terminate).
    ///
    /// # Errors
    ///
    /// Returns `ComponentError::Terminated` after shutdown, or a validation
    /// error for an empty channel.
    pub fn subscribe(&self, channel: &str, handler: SharedHandler) -> Result<SubscriptionId> {
        self.ensure_live()?;
        let subscription = self.dispatcher.subscribe(self.id(), channel, handler)?;

        let mut inner = self.inner.lock();
        if self.is_shut_down() {
            drop(inner);
            self.dispatcher.cancel(subscription);
            return Err(self.shut_down_error());
        }
        if !inner.subscriptions.iter().any(|(s, _)| *s == subscription) {
            inner.subscriptions.push((subscription, channel.to_string()));
        }
        Ok(subscription)
    }

    /// Drop this component's subscriptions on `channel`. Returns the number
    /// removed.
    pub fn unsubscribe(&self, channel: &str) -> usize {
        let removed: Vec<(SubscriptionId, String)> = {
            let mut inner = self.inner.lock();
            let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut inner.subscriptions)
                .into_iter()
                .partition(|(_, name)| name == channel);
            inner.subscriptions = kept;
            removed
        };
        self.release(removed)
    }

    /// Channel subscriptions currently held.
    #[must_use]
    pub fn subscriptions(&self) -> Vec<SubscriptionId> {
        self.inner
            .lock()
            .subscriptions
            .iter()
            .map(|(s, _)| *s)
            .collect()
    }

    /// Publish `payload` on `channel` with this component as the source.
    ///
    /// # Errors
    ///
    /// Returns `ComponentError::Terminated` after shutdown, or a validation
    /// error for an empty channel.
    pub fn publish_data(&self, channel: &str, payload: Value) -> Result<DispatchReport> {
        self.ensure_live()?;
        Ok(self.dispatcher.publish_data(self.id(), channel, payload)?)
    }

    // =========================================================================
    // Pending events
    // =========================================================================

    /// Copies of the events raised but not yet dispatched.
    ///
    /// Only the creation events wait here; every later transition flushes
    /// the queue.
    #[must_use]
    pub fn pending_events(&self) -> Vec<DomainEvent> {
        self.inner.lock().pending.clone()
    }

    /// Drain the pending queue without dispatching.
    pub fn take_events(&self) -> Vec<DomainEvent> {
        std::mem::take(&mut self.inner.lock().pending)
    }

    /// Drain the pending queue into the dispatcher, oldest first.
    ///
    /// The component lock is released before any handler runs.
    pub fn dispatch_pending(&self) -> Vec<DispatchReport> {
        let events = self.take_events();
        events
            .iter()
            .map(|event| self.dispatcher.dispatch(event))
            .collect()
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("id", &self.id())
            .field("address", &self.address())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loom_core::ErrorKind;
    use loom_events::{handler, EventBody, EventKind};
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    fn dispatcher() -> Arc<EventDispatcher> {
        EventDispatcher::shared()
    }

    #[test]
    fn create_root_reaches_ready() {
        let d = dispatcher();
        let a = Component::create(&d, "root", Environment::empty()).unwrap();

        assert_eq!(a.state(), LifecycleState::Ready);
        assert!(a.identity().is_root());
        assert_eq!(a.address(), a.id().to_string());
        assert!(a.parent().is_none());
    }

    #[test]
    fn create_raises_one_event_per_transition() {
        let d = dispatcher();
        let a = Component::create(&d, "root", Environment::empty()).unwrap();
        let events = a.pending_events();

        assert_eq!(events.len(), 6);
        assert_eq!(events[0].kind(), EventKind::Created);

        let mut expected_from = LifecycleState::Conception;
        for (event, to) in events[1..].iter().zip(lifecycle::CREATION_PATH) {
            match event.body() {
                EventBody::StateChanged {
                    component_id,
                    from,
                    to: actual,
                } => {
                    assert_eq!(*component_id, a.id());
                    assert_eq!(*from, expected_from);
                    assert_eq!(*actual, to);
                }
                other => panic!("unexpected event {other:?}"),
            }
            expected_from = to;
        }
        assert_eq!(a.transition_log().len(), 5);
    }

    #[test]
    fn child_address_extends_parent() {
        let d = dispatcher();
        let a = Component::create(&d, "root", Environment::empty()).unwrap();
        let b = Component::create_child(&d, "child", Environment::empty(), &a).unwrap();

        assert_eq!(b.address(), format!("{}.{}", a.id(), b.id()));
        assert!(b.address().starts_with(a.address()));
        assert_eq!(b.state(), LifecycleState::Ready);
        assert_eq!(b.parent().unwrap().id(), a.id());
        assert_eq!(
            b.pending_events()
                .iter()
                .filter(|e| e.kind() == EventKind::StateChanged)
                .count(),
            5
        );
    }

    #[test]
    fn parent_handle_is_weak() {
        let d = dispatcher();
        let a = Component::create(&d, "root", Environment::empty()).unwrap();
        let b = Component::create_child(&d, "child", Environment::empty(), &a).unwrap();

        drop(a);
        assert!(b.parent().is_none());
        assert!(b.identity().parent_id().is_some());
    }

    #[test]
    fn empty_reason_rejected() {
        let d = dispatcher();
        let err = Component::create(&d, "", Environment::empty()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn child_of_terminated_parent_rejected() {
        let d = dispatcher();
        let a = Component::create(&d, "root", Environment::empty()).unwrap();
        a.terminate().unwrap();

        let err = Component::create_child(&d, "child", Environment::empty(), &a).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn invalid_transition_leaves_state() {
        let d = dispatcher();
        let a = Component::create(&d, "root", Environment::empty()).unwrap();
        let log_before = a.transition_log();
        let pending_before = a.pending_events().len();

        let err = a.transition_to(LifecycleState::Archived).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::StateTransition);
        assert_eq!(a.state(), LifecycleState::Ready);
        assert_eq!(a.transition_log(), log_before);
        assert_eq!(a.pending_events().len(), pending_before);
    }

    #[test]
    fn operational_round_trip() {
        let d = dispatcher();
        let a = Component::create(&d, "root", Environment::empty()).unwrap();

        a.activate().unwrap();
        assert!(a.is_operational());
        a.transition_to(LifecycleState::Stable).unwrap();
        assert!(a.is_advanced());
        a.transition_to(LifecycleState::Degraded).unwrap();
        a.transition_to(LifecycleState::Maintaining).unwrap();
        a.deactivate().unwrap();
        assert_eq!(a.state(), LifecycleState::Ready);

        let last = a.last_transition().unwrap();
        assert_eq!(last.from, LifecycleState::Maintaining);
        assert_eq!(last.to, LifecycleState::Ready);
    }

    #[test]
    fn terminate_is_idempotent_in_effect() {
        let d = dispatcher();
        let a = Component::create(&d, "root", Environment::empty()).unwrap();
        a.activate().unwrap();

        a.terminate().unwrap();
        assert_eq!(a.state(), LifecycleState::Terminated);
        let log_len = a.transition_log().len();

        let err = a.terminate().unwrap_err();
        assert!(matches!(err, ComponentError::StateTransition { .. }));
        assert_eq!(a.state(), LifecycleState::Terminated);
        assert_eq!(a.transition_log().len(), log_len);
    }

    #[test]
    fn terminated_allows_only_archive() {
        let d = dispatcher();
        let a = Component::create(&d, "root", Environment::empty()).unwrap();
        a.terminate().unwrap();

        assert!(matches!(
            a.transition_to(LifecycleState::Ready),
            Err(ComponentError::Terminated { .. })
        ));
        assert!(a.publish_data("metrics", json!(1)).is_err());
        assert!(a.subscribe("metrics", handler(|_| Ok(()))).is_err());

        a.archive().unwrap();
        assert_eq!(a.state(), LifecycleState::Archived);
        assert!(a.archive().is_err());
    }

    #[test]
    fn manual_terminating_then_terminate() {
        let d = dispatcher();
        let a = Component::create(&d, "root", Environment::empty()).unwrap();

        a.transition_to(LifecycleState::Terminating).unwrap();
        a.terminate().unwrap();
        assert_eq!(a.state(), LifecycleState::Terminated);
    }

    #[test]
    fn terminate_cancels_subscriptions() {
        let d = dispatcher();
        let a = Component::create(&d, "listener", Environment::empty()).unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        a.subscribe(
            "metrics",
            handler(move |_| {
                h.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        )
        .unwrap();
        assert_eq!(d.subscriber_count("metrics"), 1);

        a.terminate().unwrap();
        assert_eq!(d.subscriber_count("metrics"), 0);
        assert!(a.subscriptions().is_empty());

        d.publish_data(ComponentId::generate(), "metrics", json!(1))
            .unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn unsubscribe_by_channel() {
        let d = dispatcher();
        let a = Component::create(&d, "listener", Environment::empty()).unwrap();
        a.subscribe("x", handler(|_| Ok(()))).unwrap();
        a.subscribe("y", handler(|_| Ok(()))).unwrap();

        assert_eq!(a.unsubscribe("x"), 1);
        assert_eq!(d.subscriber_count("x"), 0);
        assert_eq!(d.subscriber_count("y"), 1);
        assert_eq!(a.subscriptions().len(), 1);
    }

    #[test]
    fn publish_reaches_subscriber() {
        let d = dispatcher();
        let a = Component::create(&d, "publisher", Environment::empty()).unwrap();
        let b = Component::create(&d, "listener", Environment::empty()).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        b.subscribe(
            "metrics",
            handler(move |event| {
                s.lock().push(event.subject());
                Ok(())
            }),
        )
        .unwrap();

        let report = a.publish_data("metrics", json!({"cpu": 42})).unwrap();
        assert_eq!(report.invoked, 1);
        assert_eq!(*seen.lock(), vec![a.id()]);
    }

    #[test]
    fn dispatch_pending_drains_queue() {
        let d = dispatcher();
        let changes = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&changes);
        d.register_handler(
            EventKind::StateChanged,
            handler(move |_| {
                c.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        );

        let a = Component::create(&d, "root", Environment::empty()).unwrap();
        let reports = a.dispatch_pending();

        assert_eq!(reports.len(), 6);
        assert_eq!(changes.load(Ordering::SeqCst), 5);
        assert!(a.pending_events().is_empty());
    }

    #[test]
    fn transitions_reach_handlers_without_manual_dispatch() {
        let d = dispatcher();
        let changes = Arc::new(Mutex::new(Vec::new()));
        let c = Arc::clone(&changes);
        d.register_handler(
            EventKind::StateChanged,
            handler(move |event| {
                if let EventBody::StateChanged { from, to, .. } = event.body() {
                    c.lock().push((*from, *to));
                }
                Ok(())
            }),
        );

        let a = Component::create(&d, "root", Environment::empty()).unwrap();
        assert!(changes.lock().is_empty());

        a.activate().unwrap();
        assert!(a.pending_events().is_empty());
        let seen = changes.lock().clone();
        assert_eq!(seen.len(), 6);
        assert_eq!(
            seen.last(),
            Some(&(LifecycleState::Ready, LifecycleState::Active))
        );

        a.terminate().unwrap();
        assert!(a.pending_events().is_empty());
        assert_eq!(
            changes.lock()[6..],
            [
                (LifecycleState::Active, LifecycleState::Terminating),
                (LifecycleState::Terminating, LifecycleState::Terminated),
            ]
        );
    }

    #[test]
    fn pending_queue_stays_bounded() {
        let d = dispatcher();
        let changes = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&changes);
        d.register_handler(
            EventKind::StateChanged,
            handler(move |_| {
                c.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        );

        let a = Component::create(&d, "root", Environment::empty()).unwrap();
        for _ in 0..10_000 {
            a.activate().unwrap();
            a.deactivate().unwrap();
        }

        assert!(a.pending_events().is_empty());
        assert_eq!(a.transition_log().len(), 1024);
        assert_eq!(changes.load(Ordering::SeqCst), 5 + 20_000);
    }

    #[test]
    fn rejected_transition_dispatches_nothing() {
        let d = dispatcher();
        let changes = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&changes);
        d.register_handler(
            EventKind::StateChanged,
            handler(move |_| {
                c.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        );

        let a = Component::create(&d, "root", Environment::empty()).unwrap();
        assert!(a.transition_to(LifecycleState::Archived).is_err());

        assert_eq!(changes.load(Ordering::SeqCst), 0);
        assert_eq!(a.pending_events().len(), 6);
    }

    #[test]
    fn log_capacity_is_honoured() {
        let d = dispatcher();
        let config = LifecycleConfig {
            transition_log_capacity: 4,
        };
        let a = Component::create_with_config(&d, "root", Environment::empty(), &config).unwrap();
        assert_eq!(a.transition_log().len(), 4);
        assert_eq!(a.evicted_transitions(), 1);

        a.activate().unwrap();
        let log = a.transition_log();
        assert_eq!(log.len(), 4);
        assert_eq!(log[3].to, LifecycleState::Active);
        assert_eq!(a.evicted_transitions(), 2);
    }

    #[test]
    fn concurrent_transitions_serialize() {
        let d = dispatcher();
        let a = Component::create(&d, "root", Environment::empty()).unwrap();
        let wins = AtomicUsize::new(0);

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    if a.activate().is_ok() {
                        wins.fetch_add(1, Ordering::SeqCst);
                    }
                });
            }
        });

        // Ready -> Active once; Active -> Active is not an edge.
        assert_eq!(wins.load(Ordering::SeqCst), 1);
        assert_eq!(a.state(), LifecycleState::Active);
    }

    #[test]
    fn snapshot_serializes() {
        let d = dispatcher();
        let env = Environment::from_pairs([("region", "eu")]);
        let a = Component::create(&d, "root", env).unwrap();
        let snapshot = a.snapshot();

        assert_eq!(snapshot.id, a.id());
        assert_eq!(snapshot.state, LifecycleState::Ready);
        assert_eq!(snapshot.environment.get("region"), Some("eu"));
        assert_eq!(snapshot.transitions.len(), 5);

        let value = serde_json::to_value(&snapshot).unwrap();
        let parsed: ComponentSnapshot = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, snapshot);
    }
}
