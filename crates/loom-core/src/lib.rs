//! Core types and utilities for loom.
//!
//! This crate provides the foundational types used throughout the loom
//! orchestration engine:
//!
//! - **Identifiers**: `ComponentId` and `EventId`
//! - **Identity**: hierarchical identity, lineage and addressing
//! - **Lifecycle states**: the `LifecycleState` and `ConnectionType` names
//! - **Environment**: the immutable map captured when a component is built
//! - **Configuration port**: `ConfigSource` with in-memory and env adapters
//! - **Error types**: `CoreError` and the shared `ErrorKind` taxonomy
//!
//! # Example
//!
//! ```
//! use loom_core::{Environment, Identity};
//!
//! let root = Identity::create_root("ingest", Environment::empty()).unwrap();
//! let child = Identity::create_child("parse", Environment::empty(), &root).unwrap();
//!
//! assert_eq!(root.address(), root.id().to_string());
//! assert!(child.address().starts_with(root.address()));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod connection;
pub mod environment;
pub mod error;
pub mod identity;
pub mod ids;
pub mod state;

pub use config::{ConfigSource, EnvSource, MapSource};
pub use connection::ConnectionType;
pub use environment::Environment;
pub use error::{CoreError, ErrorKind, Result};
pub use identity::{parse_address, Identity, ADDRESS_SEPARATOR};
pub use ids::{ComponentId, EventId, IdError};
pub use state::LifecycleState;
