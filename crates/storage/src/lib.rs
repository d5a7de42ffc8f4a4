//! Node spec storage for p2pd.
//!
//! The [`NodeSpecStore`] trait is the durable keyed record store the control
//! plane persists node specs into. Backends are expected to be internally
//! synchronized; concurrent writes to the same key are last-write-wins, which
//! is acceptable because every write is a full-spec replacement.

mod codec;
mod memory;

pub use codec::{SPEC_FORMAT_VERSION, decode_spec, encode_spec};
pub use memory::MemoryNodeSpecStore;

use p2pd_primitives::{NodeId, NodeSpec};

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Durable keyed store of node specs.
#[auto_impl::auto_impl(&, Arc, Box)]
pub trait NodeSpecStore: Send + Sync {
    /// Load the spec for `id`, or `None` if no spec was ever stored.
    fn get(&self, id: &NodeId) -> StoreResult<Option<NodeSpec>>;

    /// Store `spec`, replacing any previous spec with the same id.
    fn put(&self, spec: &NodeSpec) -> StoreResult<()>;

    /// Store `spec` only if no spec exists for its id.
    ///
    /// Returns `false` without writing if the id is taken.
    fn put_new(&self, spec: &NodeSpec) -> StoreResult<bool>;
}

/// Store error type.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The backing database failed.
    #[error("database error: {0}")]
    Database(String),

    /// A stored value could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(String),

    /// A stored value was written by an unsupported format version.
    #[error("unsupported spec format version {found}, expected {SPEC_FORMAT_VERSION}")]
    UnsupportedVersion { found: u8 },
}

impl From<postcard::Error> for StoreError {
    fn from(err: postcard::Error) -> Self {
        StoreError::Codec(err.to_string())
    }
}
