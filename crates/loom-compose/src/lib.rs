//! Composition and orchestration for loom.
//!
//! - **Graph**: [`DirectedGraph`], adjacency sets with an O(V+E) cycle check
//! - **Composite**: components wired into a typed DAG, with `.in`/`.out`
//!   data channels
//! - **Machine**: composites under a `READY`/`RUNNING`/`STOPPED`/`DESTROYED`
//!   state machine, linked output-to-input through a drainable gate
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use loom_component::Component;
//! use loom_compose::{Composite, Machine, MachineState};
//! use loom_core::{ConnectionType, Environment};
//! use loom_events::EventDispatcher;
//!
//! let dispatcher = EventDispatcher::shared();
//! let parse = Component::create(&dispatcher, "parse", Environment::empty()).unwrap();
//! let store = Component::create(&dispatcher, "store", Environment::empty()).unwrap();
//!
//! let ingest = Composite::new(&dispatcher, "ingest").unwrap();
//! ingest.add_component(Arc::clone(&parse)).unwrap();
//! ingest.add_component(Arc::clone(&store)).unwrap();
//! ingest.connect(parse.id(), store.id(), ConnectionType::DataFlow).unwrap();
//!
//! let machine = Machine::new(&dispatcher, "pipeline").unwrap();
//! machine.add_composite(Arc::new(ingest)).unwrap();
//! machine.start().unwrap();
//! assert_eq!(machine.state(), MachineState::Running);
//! machine.stop(true).unwrap();
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod composite;
pub mod config;
pub mod error;
mod gate;
pub mod graph;
pub mod machine;
pub mod machine_state;
pub mod report;

pub use composite::{Composite, Connection, INPUT_SUFFIX, OUTPUT_SUFFIX};
pub use config::MachineConfig;
pub use error::{ComposeError, Result};
pub use graph::DirectedGraph;
pub use machine::{Machine, MachineTransition};
pub use machine_state::{MachineOperation, MachineState};
pub use report::MemberReport;
