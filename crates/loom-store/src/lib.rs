//! Repository port for loom components.
//!
//! Composites and machines work purely on in-memory references and never
//! need a store. Persisting components is an embedding concern: adapters
//! implement [`Store`] over [`ComponentSnapshot`]s, and [`MemoryStore`] is the
//! reference adapter.
//!
//! # Example
//!
//! ```
//! use loom_component::Component;
//! use loom_core::Environment;
//! use loom_events::EventDispatcher;
//! use loom_store::{MemoryStore, Store};
//!
//! let dispatcher = EventDispatcher::shared();
//! let component = Component::create(&dispatcher, "ingest", Environment::empty()).unwrap();
//!
//! let store = MemoryStore::new();
//! store.save_component(&component).unwrap();
//! assert!(store.find_by_id(&component.id()).unwrap().is_some());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod memory;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;

use loom_component::{Component, ComponentSnapshot};
use loom_core::{ComponentId, LifecycleState};

/// The storage trait defining all repository operations.
///
/// This trait abstracts the storage layer, allowing for different
/// implementations (in-memory for tests, a database in production).
pub trait Store: Send + Sync {
    /// Insert or replace a snapshot, keyed by its id.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be encoded or written.
    fn save(&self, snapshot: &ComponentSnapshot) -> Result<()>;

    /// Get a snapshot by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails or the record cannot be decoded.
    fn find_by_id(&self, id: &ComponentId) -> Result<Option<ComponentSnapshot>>;

    /// Delete a snapshot by id.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the record doesn't exist.
    fn delete(&self, id: &ComponentId) -> Result<()>;

    /// List snapshots recorded in `state`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails or a record cannot be decoded.
    fn list_by_state(&self, state: LifecycleState) -> Result<Vec<ComponentSnapshot>>;

    /// List snapshots whose parent is `parent_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails or a record cannot be decoded.
    fn list_children(&self, parent_id: &ComponentId) -> Result<Vec<ComponentSnapshot>>;

    /// Number of stored records.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn len(&self) -> Result<usize>;

    /// Whether the store holds no records.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Snapshot a live component and save it.
    ///
    /// # Errors
    ///
    /// See [`save`](Self::save).
    fn save_component(&self, component: &Component) -> Result<()> {
        self.save(&component.snapshot())
    }
}
