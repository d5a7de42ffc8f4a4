//! Peer identity derivation and address formatting.

use libp2p::identity::Keypair;

use crate::{DecodingError, Multiaddr, PeerId};

/// Generate fresh ed25519 key material in its protobuf encoding.
pub fn generate_private_key() -> Result<Vec<u8>, DecodingError> {
    Keypair::generate_ed25519().to_protobuf_encoding()
}

/// Derive the peer id belonging to encoded private key material.
///
/// Pure: decodes the keypair and hashes its public half. Nothing is started.
pub fn derive_peer_id(private_key: &[u8]) -> Result<PeerId, DecodingError> {
    let keypair = Keypair::from_protobuf_encoding(private_key)?;
    Ok(keypair.public().to_peer_id())
}

/// Render listen addresses as canonical multiaddr strings, preserving order.
pub fn format_addrs(addrs: &[Multiaddr]) -> Vec<String> {
    addrs.iter().map(ToString::to_string).collect()
}
