//! Composites: components wired into a directed acyclic graph.
//!
//! A composite aggregates components it does not own. Removing a member or
//! destroying the composite never terminates the component; that is the
//! caller's (or the machine's) decision.
//!
//! Every `connect` runs a reachability check from the target back to the
//! source before inserting the edge, so the connection set is a DAG after
//! every call. The check is O(V+E).

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use loom_component::{Component, ComponentError};
use loom_core::{ComponentId, ConnectionType, CoreError, Environment, Identity, LifecycleState};
use loom_events::{DispatchReport, DomainEvent, EventDispatcher, SharedHandler, SubscriptionId};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ComposeError, Result};
use crate::graph::DirectedGraph;
use crate::report::MemberReport;

/// Suffix of a composite's input channel.
pub const INPUT_SUFFIX: &str = ".in";
/// Suffix of a composite's output channel.
pub const OUTPUT_SUFFIX: &str = ".out";

/// A directed, typed edge between two members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    /// Edge source.
    pub source: ComponentId,
    /// Edge target.
    pub target: ComponentId,
    /// What the edge expresses.
    pub connection_type: ConnectionType,
    /// When the edge was added.
    pub established_at: DateTime<Utc>,
}

#[derive(Default)]
struct Inner {
    members: Vec<Arc<Component>>,
    graph: DirectedGraph<ComponentId>,
    connections: Vec<Connection>,
    destroyed: bool,
}

impl Inner {
    fn member(&self, id: ComponentId) -> Option<&Arc<Component>> {
        self.members.iter().find(|m| m.id() == id)
    }
}

/// A named group of components and the connections between them.
pub struct Composite {
    identity: Identity,
    name: String,
    dispatcher: Arc<EventDispatcher>,
    inner: RwLock<Inner>,
}

impl Composite {
    /// Create an empty composite.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `name` is empty or contains whitespace.
    pub fn new(dispatcher: &Arc<EventDispatcher>, name: impl Into<String>) -> Result<Self> {
        let name = validate_name(name.into())?;
        let identity = Identity::create_root(format!("composite {name}"), Environment::empty())?;

        tracing::info!(composite_id = %identity.id(), name = %name, "Composite created");
        Ok(Self {
            identity,
            name,
            dispatcher: Arc::clone(dispatcher),
            inner: RwLock::new(Inner::default()),
        })
    }

    /// The composite's identity.
    #[must_use]
    pub const fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Shorthand for `identity().id()`.
    #[must_use]
    pub const fn id(&self) -> ComponentId {
        self.identity.id()
    }

    /// The composite's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The dispatcher connection events are raised through.
    #[must_use]
    pub const fn dispatcher(&self) -> &Arc<EventDispatcher> {
        &self.dispatcher
    }

    /// Whether [`destroy`](Self::destroy) has been called.
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.inner.read().destroyed
    }

    // =========================================================================
    // Membership
    // =========================================================================

    /// Add a component as a member.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the component is already a member or has
    /// been terminated, and `ComposeError::Destroyed` after `destroy`.
    pub fn add_component(&self, component: Arc<Component>) -> Result<()> {
        let id = component.id();
        if component.is_shut_down() {
            return Err(CoreError::validation(
                "component",
                format!("{id} is {}", component.state()),
            )
            .into());
        }

        let mut inner = self.inner.write();
        self.ensure_live(&inner)?;
        if inner.member(id).is_some() {
            return Err(CoreError::validation(
                "component",
                format!("{id} is already a member of {}", self.name),
            )
            .into());
        }
        inner.graph.add_node(id);
        inner.members.push(component);
        let members = inner.members.len();
        drop(inner);

        tracing::debug!(composite = %self.name, component_id = %id, members, "Member added");
        Ok(())
    }

    /// Remove a member and every connection touching it.
    ///
    /// # Errors
    ///
    /// Returns `ComposeError::NotFound` if `id` is not a member.
    pub fn remove_component(&self, id: ComponentId) -> Result<Arc<Component>> {
        let mut inner = self.inner.write();
        self.ensure_live(&inner)?;
        let position = inner
            .members
            .iter()
            .position(|m| m.id() == id)
            .ok_or_else(|| ComposeError::not_found("component", id))?;

        let removed = inner.members.remove(position);
        inner.graph.remove_node(&id);
        inner
            .connections
            .retain(|c| c.source != id && c.target != id);
        drop(inner);

        tracing::debug!(composite = %self.name, component_id = %id, "Member removed");
        Ok(removed)
    }

    /// Members, in insertion order.
    #[must_use]
    pub fn members(&self) -> Vec<Arc<Component>> {
        self.inner.read().members.clone()
    }

    /// Look up a member.
    #[must_use]
    pub fn member(&self, id: ComponentId) -> Option<Arc<Component>> {
        self.inner.read().member(id).cloned()
    }

    /// Whether `id` is a member.
    #[must_use]
    pub fn contains(&self, id: ComponentId) -> bool {
        self.inner.read().member(id).is_some()
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().members.len()
    }

    /// Whether the composite has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().members.is_empty()
    }

    // =========================================================================
    // Connections
    // =========================================================================

    /// Add the edge `source -> target`.
    ///
    /// Dispatches a `ConnectionEstablished` event on success.
    ///
    /// # Errors
    ///
    /// - `ComposeError::NotFound` if either end is not a member
    /// - a validation error if the edge already exists
    /// - `ComposeError::Structural` if the edge would close a cycle
    ///
    /// The graph is unchanged on error.
    pub fn connect(
        &self,
        source: ComponentId,
        target: ComponentId,
        connection_type: ConnectionType,
    ) -> Result<Connection> {
        let mut inner = self.inner.write();
        self.ensure_live(&inner)?;
        for end in [source, target] {
            if inner.member(end).is_none() {
                return Err(ComposeError::not_found("component", end));
            }
        }
        if inner.graph.contains_edge(&source, &target) {
            return Err(CoreError::validation(
                "connection",
                format!("{source} -> {target} already exists"),
            )
            .into());
        }
        if let Some(cycle) = inner.graph.cycle_through(&source, &target) {
            let path: Vec<String> = cycle.iter().map(ToString::to_string).collect();
            tracing::warn!(
                composite = %self.name,
                %source,
                %target,
                cycle = %path.join(" -> "),
                "Rejected connection that would close a cycle"
            );
            return Err(ComposeError::Structural {
                from: source.to_string(),
                to: target.to_string(),
                path,
            });
        }

        let connection = Connection {
            source,
            target,
            connection_type,
            established_at: Utc::now(),
        };
        inner.graph.add_edge(source, target);
        inner.connections.push(connection);
        drop(inner);

        tracing::debug!(
            composite = %self.name,
            %source,
            %target,
            %connection_type,
            "Connection established"
        );
        self.dispatcher.dispatch(&DomainEvent::connection_established(
            self.id(),
            source,
            target,
            connection_type,
        ));
        Ok(connection)
    }

    /// Remove the edge `source -> target` if present.
    ///
    /// # Errors
    ///
    /// Returns `ComposeError::Destroyed` after `destroy`.
    pub fn disconnect(&self, source: ComponentId, target: ComponentId) -> Result<bool> {
        let mut inner = self.inner.write();
        self.ensure_live(&inner)?;
        if !inner.graph.remove_edge(&source, &target) {
            return Ok(false);
        }
        inner
            .connections
            .retain(|c| !(c.source == source && c.target == target));
        drop(inner);

        tracing::debug!(composite = %self.name, %source, %target, "Connection removed");
        Ok(true)
    }

    /// All connections, in the order they were made.
    #[must_use]
    pub fn connections(&self) -> Vec<Connection> {
        self.inner.read().connections.clone()
    }

    /// Connections with `id` at either end.
    #[must_use]
    pub fn connections_of(&self, id: ComponentId) -> Vec<Connection> {
        self.inner
            .read()
            .connections
            .iter()
            .filter(|c| c.source == id || c.target == id)
            .copied()
            .collect()
    }

    /// Connections of one type.
    #[must_use]
    pub fn connections_by_type(&self, connection_type: ConnectionType) -> Vec<Connection> {
        self.inner
            .read()
            .connections
            .iter()
            .filter(|c| c.connection_type == connection_type)
            .copied()
            .collect()
    }

    /// Member ids ordered so every connection points forward.
    #[must_use]
    pub fn topological_order(&self) -> Vec<ComponentId> {
        // The graph is acyclic by construction, so this always succeeds.
        self.inner
            .read()
            .graph
            .topological_order()
            .unwrap_or_default()
    }

    // =========================================================================
    // Bulk lifecycle
    // =========================================================================

    /// Move every member that is not yet operational to `ACTIVE`.
    pub fn activate_members(&self) -> MemberReport {
        self.for_each_member("activate", |member| {
            if member.is_operational() {
                Ok(false)
            } else {
                member.activate().map(|()| true)
            }
        })
    }

    /// Move every operational or advanced member back to `READY`.
    pub fn deactivate_members(&self) -> MemberReport {
        self.for_each_member("deactivate", |member| {
            if member.state() == LifecycleState::Ready {
                Ok(false)
            } else {
                member.deactivate().map(|()| true)
            }
        })
    }

    /// Terminate every member that is still live.
    pub fn terminate_members(&self) -> MemberReport {
        self.for_each_member("terminate", |member| {
            if member.is_shut_down() {
                Ok(false)
            } else {
                member.terminate().map(|()| true)
            }
        })
    }

    fn for_each_member<F>(&self, operation: &'static str, apply: F) -> MemberReport
    where
        F: Fn(&Component) -> std::result::Result<bool, ComponentError>,
    {
        let members = self.members();
        let mut report = MemberReport::default();

        for member in &members {
            match apply(member.as_ref()) {
                Ok(true) => report.succeeded.push(member.id()),
                Ok(false) => report.skipped.push(member.id()),
                Err(err) => {
                    tracing::warn!(
                        composite = %self.name,
                        component_id = %member.id(),
                        operation,
                        error = %err,
                        "Member operation failed"
                    );
                    report.failed.push((member.id(), err));
                }
            }
            member.dispatch_pending();
        }

        tracing::info!(
            composite = %self.name,
            operation,
            succeeded = report.succeeded.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "Bulk member operation finished"
        );
        report
    }

    // =========================================================================
    // Channels
    // =========================================================================

    /// `"<name>.in"`.
    #[must_use]
    pub fn input_channel(&self) -> String {
        format!("{}{INPUT_SUFFIX}", self.name)
    }

    /// `"<name>.out"`.
    #[must_use]
    pub fn output_channel(&self) -> String {
        format!("{}{OUTPUT_SUFFIX}", self.name)
    }

    /// Publish `payload` on the output channel, with the composite as source.
    ///
    /// # Errors
    ///
    /// Returns `ComposeError::Destroyed` after `destroy`.
    pub fn publish(&self, payload: Value) -> Result<DispatchReport> {
        self.ensure_live(&self.inner.read())?;
        Ok(self
            .dispatcher
            .publish_data(self.id(), &self.output_channel(), payload)?)
    }

    /// Publish `payload` on the input channel, with the composite as source.
    ///
    /// # Errors
    ///
    /// Returns `ComposeError::Destroyed` after `destroy`.
    pub fn send(&self, payload: Value) -> Result<DispatchReport> {
        self.ensure_live(&self.inner.read())?;
        Ok(self
            .dispatcher
            .publish_data(self.id(), &self.input_channel(), payload)?)
    }

    /// Subscribe a member to the input channel.
    ///
    /// # Errors
    ///
    /// Returns `ComposeError::NotFound` if `component` is not a member, or
    /// the component's error if it is shut down.
    pub fn subscribe_input(
        &self,
        component: &Arc<Component>,
        handler: SharedHandler,
    ) -> Result<SubscriptionId> {
        {
            let inner = self.inner.read();
            self.ensure_live(&inner)?;
            if inner.member(component.id()).is_none() {
                return Err(ComposeError::not_found("component", component.id()));
            }
        }
        Ok(component.subscribe(&self.input_channel(), handler)?)
    }

    // =========================================================================
    // Teardown
    // =========================================================================

    /// Drop every member and connection and reject further changes.
    ///
    /// Members are released, not terminated.
    ///
    /// # Errors
    ///
    /// Returns `ComposeError::Destroyed` on a second call.
    pub fn destroy(&self) -> Result<()> {
        let mut inner = self.inner.write();
        self.ensure_live(&inner)?;
        let released = inner.members.len();
        *inner = Inner {
            destroyed: true,
            ..Inner::default()
        };
        drop(inner);

        tracing::info!(
            composite_id = %self.id(),
            name = %self.name,
            released,
            "Composite destroyed"
        );
        Ok(())
    }

    fn ensure_live(&self, inner: &Inner) -> Result<()> {
        if inner.destroyed {
            return Err(ComposeError::Destroyed {
                composite_id: self.id(),
                name: self.name.clone(),
            });
        }
        Ok(())
    }
}

impl fmt::Debug for Composite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("Composite")
            .field("id", &self.id())
            .field("name", &self.name)
            .field("members", &inner.members.len())
            .field("connections", &inner.connections.len())
            .field("destroyed", &inner.destroyed)
            .finish()
    }
}

pub(crate) fn validate_name(name: String) -> std::result::Result<String, CoreError> {
    if name.is_empty() {
        return Err(CoreError::validation("name", "must not be empty"));
    }
    if name.chars().any(char::is_whitespace) {
        return Err(CoreError::validation("name", "must not contain whitespace"));
    }
    Ok(name)
}
