//! Node runtime for p2pd.
//!
//! The control plane never touches libp2p directly. It talks to a
//! [`NodeRuntime`], which produces running [`NodeInstance`]s from key
//! material, and to those instances to add listen addresses or close them.
//!
//! [`Libp2pRuntime`] is the production runtime: each node is a libp2p swarm
//! driven by its own task.
//!
//! # Transport Stack
//!
//! ```text
//! DNS (resolves /dnsaddr/, /dns/, /dns4/, /dns6/)
//!   └── TCP
//!         └── Noise (encryption)
//!               └── Yamux (multiplexing)
//! ```

mod error;
mod libp2p_node;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use error::RuntimeError;
pub use libp2p_node::{
    DEFAULT_IDLE_TIMEOUT, DEFAULT_PROTOCOL_VERSION, Libp2pNode, Libp2pRuntime, RuntimeConfig,
};

use async_trait::async_trait;
use p2pd_primitives::{Multiaddr, NodeId, PeerId, generate_private_key};

/// Produces running node instances.
#[async_trait]
pub trait NodeRuntime: Send + Sync + 'static {
    /// The live instance type this runtime produces.
    type Instance: NodeInstance;

    /// Generate fresh key material and bring up a node that listens nowhere yet.
    async fn create_node(&self, id: &NodeId) -> Result<Self::Instance, RuntimeError> {
        let private_key = generate_private_key().map_err(RuntimeError::Key)?;
        self.start_node(id, &private_key).await
    }

    /// Bring up a node from existing key material.
    async fn start_node(
        &self,
        id: &NodeId,
        private_key: &[u8],
    ) -> Result<Self::Instance, RuntimeError>;
}

/// A running node.
///
/// Dropping an instance shuts it down; [`NodeInstance::close`] does so
/// explicitly while other holders may still reference it.
#[async_trait]
pub trait NodeInstance: Send + Sync + 'static {
    /// The node's peer identity.
    fn peer_id(&self) -> PeerId;

    /// Encoded private key material the node was started with.
    fn private_key(&self) -> &[u8];

    /// Start listening on `addr`.
    ///
    /// Adding an address the node already listens on is a no-op.
    async fn add_listen_addr(&self, addr: Multiaddr) -> Result<(), RuntimeError>;

    /// Addresses the node listens on, in the order they were added.
    fn listen_addrs(&self) -> Vec<Multiaddr>;

    /// Shut the node down. Idempotent.
    fn close(&self);
}
