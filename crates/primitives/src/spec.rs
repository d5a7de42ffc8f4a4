//! Node specification and lifecycle state.

use serde::{Deserialize, Serialize};

use crate::{DecodingError, NodeId, PeerId, derive_peer_id};

/// Durable description of a node, independent of whether it is running.
///
/// `private_key` holds the protobuf encoding of the node's libp2p keypair.
/// `listen_addrs` holds canonical multiaddr strings in the order they were added.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSpec {
    /// Identity of the node.
    pub id: NodeId,

    /// Encoded private key material.
    pub private_key: Vec<u8>,

    /// Configured listen addresses.
    pub listen_addrs: Vec<String>,
}

impl NodeSpec {
    /// Create a spec with no listen addresses.
    pub fn new(id: NodeId, private_key: Vec<u8>) -> Self {
        Self {
            id,
            private_key,
            listen_addrs: Vec::new(),
        }
    }

    /// Derive the peer id from the stored key material.
    pub fn peer_id(&self) -> Result<PeerId, DecodingError> {
        derive_peer_id(&self.private_key)
    }
}

impl std::fmt::Debug for NodeSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeSpec")
            .field("id", &self.id)
            .field("listen_addrs", &self.listen_addrs)
            .finish_non_exhaustive()
    }
}

/// Lifecycle state of a node, derived from registry and store contents.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::IntoStaticStr,
)]
#[strum(serialize_all = "lowercase")]
pub enum NodeState {
    /// No spec exists.
    Unknown,
    /// A spec exists but no live node is registered.
    Stopped,
    /// A live node is registered.
    Started,
}
