//! Machines: composites orchestrated under one coarse lifecycle.
//!
//! A machine owns its composites and the data links between them. A link
//! from `x` to `y` subscribes to `x.out` and republishes every payload on
//! `y.in`, keeping the original publisher as the event source.
//!
//! Link deliveries pass through a gate that is open only while the machine is
//! `RUNNING`. A graceful `stop` closes the gate and waits (up to
//! [`MachineConfig::drain_timeout`]) for deliveries already inside; a
//! non-graceful stop just closes it. Deliveries that arrive at a closed gate
//! are dropped.
//!
//! Machine operations are serialized on an operation lock, separate from the
//! lock guarding composites, links and history. Lifecycle operations release
//! the data lock before they drain the gate or drive members, so event
//! handlers may call the read accessors ([`Machine::state`],
//! [`Machine::composites`], [`Machine::links`], [`Machine::history`]) at any
//! time. Handlers must not call mutating machine operations.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use loom_core::{ComponentId, CoreError, Environment, Identity};
use loom_events::{handler, EventDispatcher, HandlerError, SharedHandler, SubscriptionId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::composite::{validate_name, Composite};
use crate::config::MachineConfig;
use crate::error::{ComposeError, Result};
use crate::gate::Gate;
use crate::graph::DirectedGraph;
use crate::machine_state::{self, MachineOperation, MachineState};
use crate::report::MemberReport;

/// One machine state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineTransition {
    /// When it happened.
    pub timestamp: DateTime<Utc>,
    /// State before.
    pub from: MachineState,
    /// State after.
    pub to: MachineState,
    /// The operation that caused it.
    pub operation: MachineOperation,
}

struct Link {
    from: String,
    to: String,
    subscription: SubscriptionId,
}

#[derive(Default)]
struct Inner {
    composites: Vec<Arc<Composite>>,
    links: Vec<Link>,
    link_graph: DirectedGraph<String>,
    history: Vec<MachineTransition>,
}

impl Inner {
    fn composite(&self, name: &str) -> Option<&Arc<Composite>> {
        self.composites.iter().find(|c| c.name() == name)
    }
}

/// An orchestration unit owning composites and the links between them.
pub struct Machine {
    identity: Identity,
    name: String,
    dispatcher: Arc<EventDispatcher>,
    config: MachineConfig,
    gate: Arc<Gate>,
    state: AtomicU8,
    operation: Mutex<()>,
    inner: Mutex<Inner>,
}

impl Machine {
    /// Create a machine in `READY` with default settings.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `name` is empty or contains whitespace.
    pub fn new(dispatcher: &Arc<EventDispatcher>, name: impl Into<String>) -> Result<Self> {
        Self::with_config(dispatcher, name, MachineConfig::default())
    }

    /// Create a machine in `READY`.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `name` is empty or contains whitespace.
    pub fn with_config(
        dispatcher: &Arc<EventDispatcher>,
        name: impl Into<String>,
        config: MachineConfig,
    ) -> Result<Self> {
        let name = validate_name(name.into())?;
        let identity = Identity::create_root(format!("machine {name}"), Environment::empty())?;

        tracing::info!(machine_id = %identity.id(), name = %name, "Machine created");
        Ok(Self {
            identity,
            name,
            dispatcher: Arc::clone(dispatcher),
            config,
            gate: Arc::new(Gate::default()),
            state: AtomicU8::new(MachineState::Ready.as_u8()),
            operation: Mutex::new(()),
            inner: Mutex::new(Inner::default()),
        })
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// The machine's identity.
    #[must_use]
    pub const fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Shorthand for `identity().id()`.
    #[must_use]
    pub const fn id(&self) -> ComponentId {
        self.identity.id()
    }

    /// The machine's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Active settings.
    #[must_use]
    pub const fn config(&self) -> &MachineConfig {
        &self.config
    }

    /// Current state. Never blocks.
    #[must_use]
    pub fn state(&self) -> MachineState {
        MachineState::from_u8(self.state.load(Ordering::Acquire)).unwrap_or(MachineState::Ready)
    }

    /// Whether links currently deliver.
    #[must_use]
    pub fn is_delivering(&self) -> bool {
        self.gate.is_open()
    }

    /// Owned composites, in insertion order.
    #[must_use]
    pub fn composites(&self) -> Vec<Arc<Composite>> {
        self.inner.lock().composites.clone()
    }

    /// Look up a composite by name.
    #[must_use]
    pub fn composite(&self, name: &str) -> Option<Arc<Composite>> {
        self.inner.lock().composite(name).cloned()
    }

    /// Links as `(from, to)` composite names, in the order they were made.
    #[must_use]
    pub fn links(&self) -> Vec<(String, String)> {
        self.inner
            .lock()
            .links
            .iter()
            .map(|l| (l.from.clone(), l.to.clone()))
            .collect()
    }

    /// State changes so far, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<MachineTransition> {
        self.inner.lock().history.clone()
    }

    // =========================================================================
    // Configuration operations (READY / STOPPED)
    // =========================================================================

    /// Take ownership of a composite.
    ///
    /// # Errors
    ///
    /// - `ComposeError::StateTransition` unless `READY` or `STOPPED`
    /// - a validation error if the name is taken or the composite is destroyed
    pub fn add_composite(&self, composite: Arc<Composite>) -> Result<()> {
        let _operation = self.operation.lock();
        let mut inner = self.inner.lock();
        self.check(MachineOperation::AddComposite)?;

        if composite.is_destroyed() {
            return Err(CoreError::validation(
                "composite",
                format!("{} is destroyed", composite.name()),
            )
            .into());
        }
        if inner.composite(composite.name()).is_some() {
            return Err(CoreError::validation(
                "composite",
                format!("{} is already part of machine {}", composite.name(), self.name),
            )
            .into());
        }

        inner.link_graph.add_node(composite.name().to_string());
        tracing::debug!(
            machine = %self.name,
            composite = %composite.name(),
            members = composite.len(),
            "Composite added"
        );
        inner.composites.push(composite);
        Ok(())
    }

    /// Release a composite and drop every link touching it.
    ///
    /// # Errors
    ///
    /// - `ComposeError::StateTransition` unless `READY` or `STOPPED`
    /// - `ComposeError::NotFound` if no composite has that name
    pub fn remove_composite(&self, name: &str) -> Result<Arc<Composite>> {
        let _operation = self.operation.lock();
        let mut inner = self.inner.lock();
        self.check(MachineOperation::RemoveComposite)?;

        let position = inner
            .composites
            .iter()
            .position(|c| c.name() == name)
            .ok_or_else(|| ComposeError::not_found("composite", name))?;
        let removed = inner.composites.remove(position);

        let (dropped, kept): (Vec<Link>, Vec<Link>) = std::mem::take(&mut inner.links)
            .into_iter()
            .partition(|l| l.from == name || l.to == name);
        inner.links = kept;
        inner.link_graph.remove_node(&name.to_string());
        for link in &dropped {
            self.dispatcher.cancel(link.subscription);
        }

        tracing::debug!(
            machine = %self.name,
            composite = %name,
            links_dropped = dropped.len(),
            "Composite removed"
        );
        Ok(removed)
    }

    /// Link `from`'s output channel to `to`'s input channel.
    ///
    /// # Errors
    ///
    /// - `ComposeError::StateTransition` unless `READY` or `STOPPED`
    /// - `ComposeError::NotFound` if either composite is unknown
    /// - a validation error if the link exists
    /// - `ComposeError::Structural` if the link would close a cycle
    pub fn connect_composites(&self, from: &str, to: &str) -> Result<()> {
        let _operation = self.operation.lock();
        let mut inner = self.inner.lock();
        self.check(MachineOperation::ConnectComposites)?;

        let source = inner
            .composite(from)
            .ok_or_else(|| ComposeError::not_found("composite", from))?;
        let target = inner
            .composite(to)
            .ok_or_else(|| ComposeError::not_found("composite", to))?;

        let (from_key, to_key) = (from.to_string(), to.to_string());
        if inner.link_graph.contains_edge(&from_key, &to_key) {
            return Err(CoreError::validation(
                "link",
                format!("{from} -> {to} already exists"),
            )
            .into());
        }
        if let Some(path) = inner.link_graph.cycle_through(&from_key, &to_key) {
            tracing::warn!(
                machine = %self.name,
                from,
                to,
                cycle = %path.join(" -> "),
                "Rejected link that would close a cycle"
            );
            return Err(ComposeError::Structural {
                from: from_key,
                to: to_key,
                path,
            });
        }

        let subscription = self.dispatcher.subscribe(
            self.id(),
            &source.output_channel(),
            self.link_handler(target),
        )?;
        inner.link_graph.add_edge(from_key.clone(), to_key.clone());
        inner.links.push(Link {
            from: from_key,
            to: to_key,
            subscription,
        });

        tracing::debug!(machine = %self.name, from, to, "Composites linked");
        Ok(())
    }

    /// Remove the link `from -> to` if present.
    ///
    /// # Errors
    ///
    /// Returns `ComposeError::StateTransition` unless `READY` or `STOPPED`.
    pub fn disconnect_composites(&self, from: &str, to: &str) -> Result<bool> {
        let _operation = self.operation.lock();
        let mut inner = self.inner.lock();
        self.check(MachineOperation::DisconnectComposites)?;

        let Some(position) = inner.links.iter().position(|l| l.from == from && l.to == to) else {
            return Ok(false);
        };
        let link = inner.links.remove(position);
        inner.link_graph.remove_edge(&link.from, &link.to);
        self.dispatcher.cancel(link.subscription);

        tracing::debug!(machine = %self.name, from, to, "Composites unlinked");
        Ok(true)
    }

    // =========================================================================
    // Lifecycle operations
    // =========================================================================

    /// `READY`/`STOPPED` to `RUNNING`: activate every member of every
    /// composite, then open the link gate.
    ///
    /// Members that refuse are reported, not fatal.
    ///
    /// # Errors
    ///
    /// Returns `ComposeError::StateTransition` unless `READY` or `STOPPED`.
    pub fn start(&self) -> Result<MemberReport> {
        let _operation = self.operation.lock();
        let from = self.check(MachineOperation::Start)?;

        let mut report = MemberReport::default();
        for composite in self.composites() {
            report.merge(composite.activate_members());
        }
        self.gate.open();
        self.commit(from, MachineOperation::Start, &report);
        Ok(report)
    }

    /// `RUNNING` to `STOPPED`: close the link gate, optionally wait for
    /// in-flight deliveries, then return members to `READY`.
    ///
    /// # Errors
    ///
    /// Returns `ComposeError::StateTransition` unless `RUNNING`.
    pub fn stop(&self, graceful: bool) -> Result<MemberReport> {
        let _operation = self.operation.lock();
        let from = self.check(MachineOperation::Stop)?;

        self.gate.close();
        if graceful {
            self.drain();
        }

        let mut report = MemberReport::default();
        for composite in self.composites() {
            report.merge(composite.deactivate_members());
        }
        self.commit(from, MachineOperation::Stop, &report);
        Ok(report)
    }

    /// `RUNNING`/`STOPPED` to `DESTROYED`: drop every link, terminate every
    /// member and destroy every composite.
    ///
    /// # Errors
    ///
    /// Returns `ComposeError::StateTransition` unless `RUNNING` or `STOPPED`.
    pub fn destroy(&self) -> Result<MemberReport> {
        let _operation = self.operation.lock();
        let from = self.check(MachineOperation::Destroy)?;

        self.gate.close();
        if from == MachineState::Running {
            self.drain();
        }
        let (links, composites) = {
            let mut inner = self.inner.lock();
            inner.link_graph = DirectedGraph::new();
            (
                std::mem::take(&mut inner.links),
                std::mem::take(&mut inner.composites),
            )
        };
        for link in links {
            self.dispatcher.cancel(link.subscription);
        }

        let mut report = MemberReport::default();
        for composite in composites {
            report.merge(composite.terminate_members());
            if let Err(err) = composite.destroy() {
                tracing::warn!(
                    machine = %self.name,
                    composite = %composite.name(),
                    error = %err,
                    "Composite was already destroyed"
                );
            }
        }
        self.commit(from, MachineOperation::Destroy, &report);
        Ok(report)
    }

    fn check(&self, operation: MachineOperation) -> Result<MachineState> {
        let state = self.state();
        if machine_state::is_allowed(operation, state) {
            return Ok(state);
        }
        Err(ComposeError::StateTransition {
            machine_id: self.id(),
            from: state,
            operation,
            valid_states: machine_state::valid_states(operation).to_vec(),
        })
    }

    fn commit(&self, from: MachineState, operation: MachineOperation, report: &MemberReport) {
        let Some(to) = machine_state::target_state(operation) else {
            return;
        };
        self.state.store(to.as_u8(), Ordering::Release);
        self.inner.lock().history.push(MachineTransition {
            timestamp: Utc::now(),
            from,
            to,
            operation,
        });

        tracing::info!(
            machine_id = %self.id(),
            machine = %self.name,
            %from,
            %to,
            members = report.total(),
            failed = report.failed.len(),
            "Machine state changed"
        );
    }

    fn drain(&self) {
        let timeout = self.config.drain_timeout();
        if !self.gate.drain(timeout) {
            tracing::warn!(
                machine = %self.name,
                in_flight = self.gate.in_flight(),
                timeout_ms = self.config.drain_timeout_ms,
                "Drain timed out; abandoning in-flight link deliveries"
            );
        }
    }

    fn link_handler(&self, target: &Composite) -> SharedHandler {
        let gate = Arc::clone(&self.gate);
        let dispatcher = Arc::downgrade(&self.dispatcher);
        let channel = target.input_channel();
        let machine = self.name.clone();

        handler(move |event| {
            let Some((_, payload)) = event.as_data() else {
                return Ok(());
            };
            let Some(_pass) = gate.enter() else {
                tracing::debug!(machine = %machine, channel = %channel, "Link closed; delivery dropped");
                return Ok(());
            };
            let Some(dispatcher) = dispatcher.upgrade() else {
                return Ok(());
            };
            dispatcher
                .publish_data(event.subject(), &channel, payload.clone())
                .map(|_| ())
                .map_err(|err| HandlerError::new(err.to_string()))
        })
    }
}

impl Drop for Machine {
    fn drop(&mut self) {
        self.gate.close();
        for link in self.inner.get_mut().links.drain(..) {
            self.dispatcher.cancel(link.subscription);
        }
    }
}

impl fmt::Debug for Machine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Machine")
            .field("id", &self.id())
            .field("name", &self.name)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loom_component::Component;
    use loom_core::{ErrorKind, LifecycleState};
    use serde_json::json;

    fn composite(dispatcher: &Arc<EventDispatcher>, name: &str) -> Arc<Composite> {
        let composite = Composite::new(dispatcher, name).unwrap();
        let member = Component::create(dispatcher, name, Environment::empty()).unwrap();
        composite.add_component(member).unwrap();
        Arc::new(composite)
    }

    fn recorder(log: &Arc<Mutex<Vec<serde_json::Value>>>) -> SharedHandler {
        let log = Arc::clone(log);
        handler(move |event| {
            if let Some((_, payload)) = event.as_data() {
                log.lock().push(payload.clone());
            }
            Ok(())
        })
    }

    #[test]
    fn operations_follow_state_table() {
        let d = EventDispatcher::shared();
        let machine = Machine::new(&d, "m").unwrap();
        assert_eq!(machine.state(), MachineState::Ready);

        let err = machine.stop(true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StateTransition);
        assert!(machine.destroy().is_err());

        machine.add_composite(composite(&d, "x")).unwrap();
        machine.start().unwrap();
        assert_eq!(machine.state(), MachineState::Running);

        match machine.add_composite(composite(&d, "y")).unwrap_err() {
            ComposeError::StateTransition {
                from,
                operation,
                valid_states,
                ..
            } => {
                assert_eq!(from, MachineState::Running);
                assert_eq!(operation, MachineOperation::AddComposite);
                assert_eq!(valid_states, vec![MachineState::Ready, MachineState::Stopped]);
            }
            other => panic!("expected StateTransition, got {other:?}"),
        }
        assert!(machine.start().is_err());

        machine.stop(false).unwrap();
        machine.add_composite(composite(&d, "y")).unwrap();
        machine.start().unwrap();
        machine.destroy().unwrap();
        assert_eq!(machine.state(), MachineState::Destroyed);

        assert!(machine.start().is_err());
        assert!(machine.destroy().is_err());
        assert!(machine.add_composite(composite(&d, "z")).is_err());
    }

    #[test]
    fn history_records_state_changes() {
        let d = EventDispatcher::shared();
        let machine = Machine::new(&d, "m").unwrap();
        machine.start().unwrap();
        machine.stop(true).unwrap();
        machine.destroy().unwrap();

        let steps: Vec<(MachineState, MachineState, MachineOperation)> = machine
            .history()
            .iter()
            .map(|t| (t.from, t.to, t.operation))
            .collect();
        assert_eq!(
            steps,
            vec![
                (MachineState::Ready, MachineState::Running, MachineOperation::Start),
                (MachineState::Running, MachineState::Stopped, MachineOperation::Stop),
                (MachineState::Stopped, MachineState::Destroyed, MachineOperation::Destroy),
            ]
        );
    }

    #[test]
    fn duplicate_composite_name_rejected() {
        let d = EventDispatcher::shared();
        let machine = Machine::new(&d, "m").unwrap();
        machine.add_composite(composite(&d, "x")).unwrap();
        let err = machine.add_composite(composite(&d, "x")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn connect_validates_links() {
        let d = EventDispatcher::shared();
        let machine = Machine::new(&d, "m").unwrap();
        for name in ["x", "y", "z"] {
            machine.add_composite(composite(&d, name)).unwrap();
        }

        assert_eq!(
            machine.connect_composites("x", "nope").unwrap_err().kind(),
            ErrorKind::NotFound
        );
        machine.connect_composites("x", "y").unwrap();
        machine.connect_composites("y", "z").unwrap();
        assert_eq!(
            machine.connect_composites("x", "y").unwrap_err().kind(),
            ErrorKind::Validation
        );

        match machine.connect_composites("z", "x").unwrap_err() {
            ComposeError::Structural { path, .. } => assert_eq!(path, vec!["z", "x", "y", "z"]),
            other => panic!("expected Structural, got {other:?}"),
        }
        assert_eq!(
            machine.connect_composites("x", "x").unwrap_err().kind(),
            ErrorKind::Structural
        );
        assert_eq!(machine.links().len(), 2);
        assert_eq!(d.subscriber_count("x.out"), 1);
    }

    #[test]
    fn links_deliver_only_while_running() {
        let d = EventDispatcher::shared();
        let machine = Machine::new(&d, "m").unwrap();
        let x = composite(&d, "x");
        let y = composite(&d, "y");
        let received = Arc::new(Mutex::new(Vec::new()));
        let listener = y.members()[0].clone();
        y.subscribe_input(&listener, recorder(&received)).unwrap();

        machine.add_composite(Arc::clone(&x)).unwrap();
        machine.add_composite(Arc::clone(&y)).unwrap();
        machine.connect_composites("x", "y").unwrap();

        x.publish(json!(0)).unwrap();
        assert!(received.lock().is_empty());

        machine.start().unwrap();
        assert!(machine.is_delivering());
        x.publish(json!(1)).unwrap();
        assert_eq!(*received.lock(), vec![json!(1)]);

        machine.stop(false).unwrap();
        assert!(!machine.is_delivering());
        x.publish(json!(2)).unwrap();
        assert_eq!(*received.lock(), vec![json!(1)]);
    }

    #[test]
    fn forwarded_events_keep_original_source() {
        let d = EventDispatcher::shared();
        let machine = Machine::new(&d, "m").unwrap();
        let x = composite(&d, "x");
        let y = composite(&d, "y");
        let sources = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&sources);
        let listener = y.members()[0].clone();
        y.subscribe_input(
            &listener,
            handler(move |event| {
                s.lock().push(event.subject());
                Ok(())
            }),
        )
        .unwrap();

        machine.add_composite(Arc::clone(&x)).unwrap();
        machine.add_composite(y).unwrap();
        machine.connect_composites("x", "y").unwrap();
        machine.start().unwrap();

        x.publish(json!({})).unwrap();
        assert_eq!(*sources.lock(), vec![x.id()]);
    }

    #[test]
    fn remove_and_disconnect_cancel_links() {
        let d = EventDispatcher::shared();
        let machine = Machine::new(&d, "m").unwrap();
        for name in ["x", "y", "z"] {
            machine.add_composite(composite(&d, name)).unwrap();
        }
        machine.connect_composites("x", "y").unwrap();
        machine.connect_composites("y", "z").unwrap();

        assert!(machine.disconnect_composites("x", "y").unwrap());
        assert!(!machine.disconnect_composites("x", "y").unwrap());
        assert_eq!(d.subscriber_count("x.out"), 0);

        let removed = machine.remove_composite("z").unwrap();
        assert_eq!(removed.name(), "z");
        assert!(machine.links().is_empty());
        assert_eq!(d.subscriber_count("y.out"), 0);
        assert_eq!(
            machine.remove_composite("z").unwrap_err().kind(),
            ErrorKind::NotFound
        );

        // The removed link no longer blocks the reverse direction.
        machine.add_composite(removed).unwrap();
        machine.connect_composites("z", "y").unwrap();
    }

    #[test]
    fn start_and_stop_drive_members() {
        let d = EventDispatcher::shared();
        let machine = Machine::new(&d, "m").unwrap();
        let x = composite(&d, "x");
        machine.add_composite(Arc::clone(&x)).unwrap();

        let report = machine.start().unwrap();
        assert!(report.is_clean());
        assert!(x.members().iter().all(|m| m.state() == LifecycleState::Active));

        machine.stop(true).unwrap();
        assert!(x.members().iter().all(|m| m.state() == LifecycleState::Ready));

        let report = machine.destroy().unwrap();
        assert_eq!(report.succeeded.len(), 1);
        assert!(x.is_destroyed());
        assert!(machine.composites().is_empty());
    }

    #[test]
    fn dropping_machine_cancels_links() {
        let d = EventDispatcher::shared();
        {
            let machine = Machine::new(&d, "m").unwrap();
            machine.add_composite(composite(&d, "x")).unwrap();
            machine.add_composite(composite(&d, "y")).unwrap();
            machine.connect_composites("x", "y").unwrap();
            assert_eq!(d.subscriber_count("x.out"), 1);
        }
        assert_eq!(d.subscriber_count("x.out"), 0);
    }

    #[test]
    fn handlers_read_machine_while_stop_drains() {
        use std::sync::mpsc;
        use std::sync::{OnceLock, Weak};
        use std::time::{Duration, Instant};

        let d = EventDispatcher::shared();
        let config = MachineConfig {
            drain_timeout_ms: 5_000,
        };
        let machine = Arc::new(Machine::with_config(&d, "m", config).unwrap());
        let x = composite(&d, "x");
        let y = composite(&d, "y");

        let slot: Arc<OnceLock<Weak<Machine>>> = Arc::new(OnceLock::new());
        let _ = slot.set(Arc::downgrade(&machine));
        let (entered_tx, entered_rx) = mpsc::channel();
        let entered_tx = Mutex::new(entered_tx);
        let observed = Arc::new(Mutex::new(None));
        let (s, o) = (Arc::clone(&slot), Arc::clone(&observed));
        let sink = y.members().remove(0);
        y.subscribe_input(
            &sink,
            handler(move |_| {
                entered_tx.lock().send(()).map_err(|e| HandlerError::new(e.to_string()))?;
                std::thread::sleep(Duration::from_millis(50));
                let machine = s.get().and_then(Weak::upgrade).ok_or("machine gone")?;
                *o.lock() = Some((machine.links().len(), machine.history().len()));
                Ok(())
            }),
        )
        .unwrap();

        machine.add_composite(Arc::clone(&x)).unwrap();
        machine.add_composite(y).unwrap();
        machine.connect_composites("x", "y").unwrap();
        machine.start().unwrap();

        let publisher = std::thread::spawn(move || {
            x.publish(json!({"batch": 1})).unwrap();
        });
        entered_rx.recv().unwrap();

        let started = Instant::now();
        machine.stop(true).unwrap();

        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(*observed.lock(), Some((1, 1)));
        assert_eq!(machine.state(), MachineState::Stopped);
        publisher.join().unwrap();
    }

    #[test]
    fn member_handlers_read_machine_during_start() {
        use std::sync::{OnceLock, Weak};

        let d = EventDispatcher::shared();
        let machine = Arc::new(Machine::new(&d, "m").unwrap());
        machine.add_composite(composite(&d, "x")).unwrap();

        let slot: Arc<OnceLock<Weak<Machine>>> = Arc::new(OnceLock::new());
        let _ = slot.set(Arc::downgrade(&machine));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (s, v) = (Arc::clone(&slot), Arc::clone(&seen));
        d.register_handler(
            loom_events::EventKind::StateChanged,
            handler(move |_| {
                if let Some(machine) = s.get().and_then(Weak::upgrade) {
                    v.lock().push(machine.composites().len());
                }
                Ok(())
            }),
        );

        machine.start().unwrap();
        machine.stop(false).unwrap();

        let seen = seen.lock();
        assert!(!seen.is_empty());
        assert!(seen.iter().all(|n| *n == 1));
    }
}
