//! Runtime error types.

use p2pd_primitives::{DecodingError, Multiaddr};

/// Errors from the node runtime.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// Key material could not be generated or decoded.
    #[error("key error: {0}")]
    Key(#[source] DecodingError),

    /// The transport stack could not be built.
    #[error("transport error: {0}")]
    Transport(String),

    /// Listening on an address failed.
    #[error("failed to listen on {addr}: {reason}")]
    Listen { addr: Multiaddr, reason: String },

    /// The node has been closed.
    #[error("node closed")]
    Closed,
}
