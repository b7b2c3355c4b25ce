//! Domain events and the publish/subscribe dispatcher for loom.
//!
//! - **Events**: [`DomainEvent`] with one [`EventBody`] variant per [`EventKind`]
//! - **Handlers**: the [`EventHandler`] trait, implemented for plain closures
//! - **Dispatcher**: [`EventDispatcher`], a kind-keyed handler table plus
//!   named data channels
//!
//! Handler failures are contained: a returned error or a panic is logged and
//! recorded in the [`DispatchReport`], and the remaining handlers still run.
//!
//! # Example
//!
//! ```
//! use loom_core::ComponentId;
//! use loom_events::{handler, EventDispatcher};
//! use serde_json::json;
//!
//! let dispatcher = EventDispatcher::new();
//! let listener = ComponentId::generate();
//! dispatcher
//!     .subscribe(listener, "metrics", handler(|_| Ok(())))
//!     .unwrap();
//!
//! let report = dispatcher
//!     .publish_data(ComponentId::generate(), "metrics", json!({"cpu": 42}))
//!     .unwrap();
//! assert_eq!(report.invoked, 1);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod dispatcher;
pub mod error;
pub mod event;
pub mod handler;

pub use dispatcher::{EventDispatcher, SubscriptionId};
pub use error::{DispatchReport, HandlerExecutionError};
pub use event::{DomainEvent, EventBody, EventKind};
pub use handler::{handler, EventHandler, HandlerError, HandlerResult, SharedHandler};
