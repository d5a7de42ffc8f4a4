//! Core primitive types for the p2pd control plane.
//!
//! # Types
//!
//! - [`NodeId`] - caller-supplied identity of a managed node
//! - [`NodeSpec`] - durable description of a node (key material, listen addresses)
//! - [`NodeState`] - derived lifecycle state of a node
//!
//! # Peer identity
//!
//! - [`derive_peer_id`] - pure derivation of a [`PeerId`] from stored key material
//! - [`format_addrs`] - canonical textual rendering of listen addresses

mod node_id;
pub use node_id::{MAX_NODE_ID_LEN, NodeId, NodeIdError};

mod spec;
pub use spec::{NodeSpec, NodeState};

mod peer;
pub use peer::{derive_peer_id, format_addrs, generate_private_key};

// Re-export the libp2p types that appear in our public API
pub use libp2p::{Multiaddr, PeerId, identity::DecodingError, multiaddr::Error as MultiaddrError};
