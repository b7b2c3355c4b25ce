//! In-memory reference adapter.
//!
//! Records are stored CBOR-encoded, so every read returns a detached copy the
//! way a persistent backend would. Two secondary indexes (by state and by
//! parent) are kept in step with the primary map under one lock.

use std::collections::{BTreeSet, HashMap};

use loom_component::ComponentSnapshot;
use loom_core::{ComponentId, LifecycleState};
use parking_lot::RwLock;

use crate::error::{Result, StoreError};
use crate::Store;

struct Record {
    bytes: Vec<u8>,
    state: LifecycleState,
    parent: Option<ComponentId>,
}

#[derive(Default)]
struct Tables {
    records: HashMap<ComponentId, Record>,
    by_state: HashMap<LifecycleState, BTreeSet<ComponentId>>,
    by_parent: HashMap<ComponentId, BTreeSet<ComponentId>>,
}

impl Tables {
    fn unindex(&mut self, id: ComponentId, record: &Record) {
        if let Some(ids) = self.by_state.get_mut(&record.state) {
            ids.remove(&id);
            if ids.is_empty() {
                self.by_state.remove(&record.state);
            }
        }
        if let Some(parent) = record.parent {
            if let Some(ids) = self.by_parent.get_mut(&parent) {
                ids.remove(&id);
                if ids.is_empty() {
                    self.by_parent.remove(&parent);
                }
            }
        }
    }

    fn collect(&self, ids: Option<&BTreeSet<ComponentId>>) -> Result<Vec<ComponentSnapshot>> {
        ids.into_iter()
            .flatten()
            .filter_map(|id| self.records.get(id))
            .map(|record| MemoryStore::deserialize(&record.bytes))
            .collect()
    }
}

/// `Store` backed by a process-local map.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialize a value to CBOR.
    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }
}

impl Store for MemoryStore {
    fn save(&self, snapshot: &ComponentSnapshot) -> Result<()> {
        let record = Record {
            bytes: Self::serialize(snapshot)?,
            state: snapshot.state,
            parent: snapshot.parent_id,
        };

        let mut tables = self.tables.write();
        if let Some(previous) = tables.records.remove(&snapshot.id) {
            tables.unindex(snapshot.id, &previous);
        }
        tables
            .by_state
            .entry(record.state)
            .or_default()
            .insert(snapshot.id);
        if let Some(parent) = record.parent {
            tables.by_parent.entry(parent).or_default().insert(snapshot.id);
        }
        tables.records.insert(snapshot.id, record);
        drop(tables);

        tracing::debug!(component_id = %snapshot.id, state = %snapshot.state, "Saved component snapshot");
        Ok(())
    }

    fn find_by_id(&self, id: &ComponentId) -> Result<Option<ComponentSnapshot>> {
        self.tables
            .read()
            .records
            .get(id)
            .map(|record| Self::deserialize(&record.bytes))
            .transpose()
    }

    fn delete(&self, id: &ComponentId) -> Result<()> {
        let mut tables = self.tables.write();
        let record = tables.records.remove(id).ok_or(StoreError::NotFound(*id))?;
        tables.unindex(*id, &record);
        drop(tables);

        tracing::debug!(component_id = %id, "Deleted component snapshot");
        Ok(())
    }

    fn list_by_state(&self, state: LifecycleState) -> Result<Vec<ComponentSnapshot>> {
        let tables = self.tables.read();
        tables.collect(tables.by_state.get(&state))
    }

    fn list_children(&self, parent_id: &ComponentId) -> Result<Vec<ComponentSnapshot>> {
        let tables = self.tables.read();
        tables.collect(tables.by_parent.get(parent_id))
    }

    fn len(&self) -> Result<usize> {
        Ok(self.tables.read().records.len())
    }
}
