//! In-memory node spec store.

use std::collections::{HashMap, hash_map::Entry};

use p2pd_primitives::{NodeId, NodeSpec};
use parking_lot::RwLock;
use tracing::trace;

use crate::{NodeSpecStore, StoreResult, decode_spec, encode_spec};

/// Volatile [`NodeSpecStore`] keeping encoded specs in a map.
///
/// Values go through the same codec as persistent backends, so round-trip
/// behaviour matches the on-disk stores.
#[derive(Debug, Default)]
pub struct MemoryNodeSpecStore {
    specs: RwLock<HashMap<NodeId, Vec<u8>>>,
}

impl MemoryNodeSpecStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored specs.
    pub fn len(&self) -> usize {
        self.specs.read().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl NodeSpecStore for MemoryNodeSpecStore {
    fn get(&self, id: &NodeId) -> StoreResult<Option<NodeSpec>> {
        let specs = self.specs.read();
        specs
            .get(id)
            .map(|value| decode_spec(id, value))
            .transpose()
    }

    fn put(&self, spec: &NodeSpec) -> StoreResult<()> {
        let value = encode_spec(spec)?;
        self.specs.write().insert(spec.id.clone(), value);
        trace!(node_id = %spec.id, addrs = spec.listen_addrs.len(), "stored node spec");
        Ok(())
    }

    fn put_new(&self, spec: &NodeSpec) -> StoreResult<bool> {
        let value = encode_spec(spec)?;
        match self.specs.write().entry(spec.id.clone()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(entry) => {
                entry.insert(value);
                trace!(node_id = %spec.id, "stored new node spec");
                Ok(true)
            }
        }
    }
}
