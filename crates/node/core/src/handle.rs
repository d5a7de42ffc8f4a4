//! Live node handle.

use p2pd_primitives::{Multiaddr, NodeId, NodeSpec, NodeState, PeerId, format_addrs};
use p2pd_runtime::{NodeInstance, RuntimeError};

use crate::NodeStatus;

/// A running node as held by the registry.
///
/// Wraps the runtime instance together with the id it was started under.
/// The peer id is cached since it never changes for the lifetime of the
/// instance.
#[derive(Debug)]
pub struct NodeHandle<I> {
    id: NodeId,
    peer_id: PeerId,
    instance: I,
}

impl<I: NodeInstance> NodeHandle<I> {
    pub fn new(id: NodeId, instance: I) -> Self {
        Self {
            id,
            peer_id: instance.peer_id(),
            instance,
        }
    }

    pub fn peer_id(&self) -> PeerId {
        self.peer_id
    }

    /// Live listen addresses in the order they were added.
    pub fn listen_addrs(&self) -> Vec<String> {
        format_addrs(&self.instance.listen_addrs())
    }

    pub async fn listen(&self, addr: Multiaddr) -> Result<(), RuntimeError> {
        self.instance.add_listen_addr(addr).await
    }

    /// Snapshot of the node as a spec: its key and current listen addresses.
    pub fn spec(&self) -> NodeSpec {
        NodeSpec {
            id: self.id.clone(),
            private_key: self.instance.private_key().to_vec(),
            listen_addrs: self.listen_addrs(),
        }
    }

    pub fn status(&self) -> NodeStatus {
        NodeStatus {
            peer_id: self.peer_id,
            state: NodeState::Started,
            listen_addrs: self.listen_addrs(),
        }
    }

    pub fn close(&self) {
        self.instance.close();
    }
}
