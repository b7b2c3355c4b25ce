//! Component lifecycle for loom.
//!
//! A [`Component`] owns an [`Identity`](loom_core::Identity) and moves through
//! a fixed adjacency table of [`LifecycleState`](loom_core::LifecycleState)s:
//!
//! - **Construction**: `CONCEPTION` through `READY`, driven by the factories
//! - **Operation**: `ACTIVE`, `WAITING`, `ADAPTING`, `TRANSFORMING` and the
//!   advanced states, via [`Component::transition_to`]
//! - **Shutdown**: [`Component::terminate`] then [`Component::archive`]
//!
//! Every applied transition is logged and raises a `StateChanged` event,
//! dispatched once the component lock is released. Creation events are held
//! until the first transition or [`Component::dispatch_pending`].
//!
//! # Example
//!
//! ```
//! use loom_component::Component;
//! use loom_core::{Environment, LifecycleState};
//! use loom_events::EventDispatcher;
//!
//! let dispatcher = EventDispatcher::shared();
//! let root = Component::create(&dispatcher, "ingest", Environment::empty()).unwrap();
//! assert_eq!(root.state(), LifecycleState::Ready);
//!
//! root.activate().unwrap();
//! root.terminate().unwrap();
//! assert_eq!(root.state(), LifecycleState::Terminated);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod component;
pub mod config;
pub mod error;
mod history;
pub mod lifecycle;
pub mod snapshot;

pub use component::Component;
pub use config::LifecycleConfig;
pub use error::{ComponentError, Result};
pub use history::TransitionRecord;
pub use snapshot::ComponentSnapshot;
