//! Domain event types.
//!
//! A [`DomainEvent`] is immutable once built: an id, a timestamp, and one
//! [`EventBody`] variant. Dispatch is keyed on [`EventKind`], the variant tag.

use std::fmt;

use chrono::{DateTime, Utc};
use loom_core::{ComponentId, ConnectionType, EventId, LifecycleState};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Variant tag of a domain event, used as the dispatch table key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A component was created.
    Created,
    /// A component changed lifecycle state.
    StateChanged,
    /// A composite connected two members.
    ConnectionEstablished,
    /// Data was published on a channel.
    Data,
}

impl EventKind {
    /// Every kind.
    pub const ALL: [Self; 4] = [
        Self::Created,
        Self::StateChanged,
        Self::ConnectionEstablished,
        Self::Data,
    ];
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::StateChanged => "state_changed",
            Self::ConnectionEstablished => "connection_established",
            Self::Data => "data",
        };
        f.write_str(name)
    }
}

/// Payload of a domain event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventBody {
    /// A component was created.
    Created {
        /// The new component.
        component_id: ComponentId,
        /// Its hierarchical address.
        address: String,
        /// Why it was created.
        reason: String,
    },
    /// A component moved along one edge of the lifecycle table.
    StateChanged {
        /// The component that moved.
        component_id: ComponentId,
        /// State before the transition.
        from: LifecycleState,
        /// State after the transition.
        to: LifecycleState,
    },
    /// A composite added a directed edge between two members.
    ConnectionEstablished {
        /// The composite holding the edge.
        composite_id: ComponentId,
        /// Edge source.
        source: ComponentId,
        /// Edge target.
        target: ComponentId,
        /// What the edge expresses.
        connection_type: ConnectionType,
    },
    /// Data published on a named channel.
    Data {
        /// The publisher.
        source: ComponentId,
        /// Channel name.
        channel: String,
        /// Opaque payload.
        payload: Value,
    },
}

impl EventBody {
    /// The variant tag.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Created { .. } => EventKind::Created,
            Self::StateChanged { .. } => EventKind::StateChanged,
            Self::ConnectionEstablished { .. } => EventKind::ConnectionEstablished,
            Self::Data { .. } => EventKind::Data,
        }
    }
}

/// An immutable record of something that happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainEvent {
    id: EventId,
    occurred_at: DateTime<Utc>,
    #[serde(flatten)]
    body: EventBody,
}

impl DomainEvent {
    /// Wrap a body with a fresh id and the current time.
    #[must_use]
    pub fn new(body: EventBody) -> Self {
        Self {
            id: EventId::generate(),
            occurred_at: Utc::now(),
            body,
        }
    }

    /// A `Created` event.
    #[must_use]
    pub fn created(
        component_id: ComponentId,
        address: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::new(EventBody::Created {
            component_id,
            address: address.into(),
            reason: reason.into(),
        })
    }

    /// A `StateChanged` event.
    #[must_use]
    pub fn state_changed(component_id: ComponentId, from: LifecycleState, to: LifecycleState) -> Self {
        Self::new(EventBody::StateChanged {
            component_id,
            from,
            to,
        })
    }

    /// A `ConnectionEstablished` event.
    #[must_use]
    pub fn connection_established(
        composite_id: ComponentId,
        source: ComponentId,
        target: ComponentId,
        connection_type: ConnectionType,
    ) -> Self {
        Self::new(EventBody::ConnectionEstablished {
            composite_id,
            source,
            target,
            connection_type,
        })
    }

    /// A `Data` event.
    #[must_use]
    pub fn data(source: ComponentId, channel: impl Into<String>, payload: Value) -> Self {
        Self::new(EventBody::Data {
            source,
            channel: channel.into(),
            payload,
        })
    }

    /// Event id.
    #[must_use]
    pub const fn id(&self) -> EventId {
        self.id
    }

    /// When the event was built.
    #[must_use]
    pub const fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    /// The payload.
    #[must_use]
    pub const fn body(&self) -> &EventBody {
        &self.body
    }

    /// The variant tag.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        self.body.kind()
    }

    /// The component the event is about, or the publisher for data events.
    #[must_use]
    pub const fn subject(&self) -> ComponentId {
        match &self.body {
            EventBody::Created { component_id, .. }
            | EventBody::StateChanged { component_id, .. } => *component_id,
            EventBody::ConnectionEstablished { composite_id, .. } => *composite_id,
            EventBody::Data { source, .. } => *source,
        }
    }

    /// Channel and payload, for data events.
    #[must_use]
    pub fn as_data(&self) -> Option<(&str, &Value)> {
        match &self.body {
            EventBody::Data {
                channel, payload, ..
            } => Some((channel.as_str(), payload)),
            _ => None,
        }
    }
}
