//! Registry of live nodes.
//!
//! [`NodeRegistry`] is the single source of truth for whether a node is
//! running. Its insert-if-absent primitive, [`NodeRegistry::try_register`],
//! is the only mechanism that keeps at most one live node per [`NodeId`]
//! under concurrent create and start requests.
//!
//! The map is sharded, so operations on different ids proceed in parallel.
//! Handles are stored as `Arc<H>` and cloned out on lookup; no shard lock is
//! ever held beyond a single call.

use std::sync::Arc;

use dashmap::{DashMap, mapref::entry::Entry};
use p2pd_primitives::NodeId;

/// Concurrent map from node id to live node handle.
#[derive(Debug)]
pub struct NodeRegistry<H> {
    nodes: DashMap<NodeId, Arc<H>>,
}

impl<H> Default for NodeRegistry<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> NodeRegistry<H> {
    pub fn new() -> Self {
        Self {
            nodes: DashMap::new(),
        }
    }

    /// Insert `handle` under `id` only if no handle is registered.
    ///
    /// Returns `false` without touching the registry if `id` is taken. Of any
    /// number of concurrent calls for the same id, exactly one wins.
    pub fn try_register(&self, id: NodeId, handle: Arc<H>) -> bool {
        match self.nodes.entry(id) {
            Entry::Vacant(entry) => {
                entry.insert(handle);
                true
            }
            Entry::Occupied(_) => false,
        }
    }

    pub fn lookup(&self, id: &NodeId) -> Option<Arc<H>> {
        self.nodes.get(id).map(|entry| entry.value().clone())
    }

    pub fn remove(&self, id: &NodeId) -> Option<Arc<H>> {
        self.nodes.remove(id).map(|(_, handle)| handle)
    }

    /// Whether `handle` itself, not merely some handle, is registered under `id`.
    pub fn is_registered(&self, id: &NodeId, handle: &Arc<H>) -> bool {
        self.nodes
            .get(id)
            .is_some_and(|entry| Arc::ptr_eq(entry.value(), handle))
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn ids(&self) -> Vec<NodeId> {
        self.nodes.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Remove and return every registered handle.
    pub fn drain(&self) -> Vec<(NodeId, Arc<H>)> {
        self.ids()
            .into_iter()
            .filter_map(|id| self.nodes.remove(&id))
            .collect()
    }
}
