//! Control plane errors.

use p2pd_primitives::{DecodingError, MultiaddrError, NodeId};
use p2pd_runtime::RuntimeError;
use p2pd_storage::StoreError;

/// Result alias for controller operations.
pub type ControlResult<T> = Result<T, ControlError>;

/// Coarse classification of a [`ControlError`], used to pick a response code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    /// The request itself was malformed.
    Validation,
    /// The request conflicts with existing state.
    Conflict,
    /// The node does not exist, or is not running.
    NotFound,
    /// The store or the runtime failed.
    Collaborator,
}

/// Failure to persist a spec through the write-back queue.
#[derive(Debug, thiserror::Error)]
pub enum WriteBackError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("write-back queue closed")]
    Closed,
}

/// Errors returned by [`LifecycleController`](crate::LifecycleController).
///
/// Collaborator failures keep their source and are wrapped with the
/// operation and node id. No operation retries.
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("node already exists: {0}")]
    AlreadyExists(NodeId),

    #[error("node id not known: {0}")]
    UnknownNode(NodeId),

    #[error("node not running: {0}")]
    NotRunning(NodeId),

    #[error("invalid address {addr:?}: {source}")]
    InvalidAddress {
        addr: String,
        #[source]
        source: MultiaddrError,
    },

    #[error("{op} {id}: store failure: {source}")]
    Store {
        op: &'static str,
        id: NodeId,
        #[source]
        source: StoreError,
    },

    #[error("{op} {id}: {source}")]
    Runtime {
        op: &'static str,
        id: NodeId,
        #[source]
        source: RuntimeError,
    },

    #[error("{op} {id}: invalid key material: {source}")]
    Key {
        op: &'static str,
        id: NodeId,
        #[source]
        source: DecodingError,
    },

    #[error("{op} {id}: {source}")]
    WriteBack {
        op: &'static str,
        id: NodeId,
        #[source]
        source: WriteBackError,
    },
}

impl ControlError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidAddress { .. } => ErrorKind::Validation,
            Self::AlreadyExists(_) => ErrorKind::Conflict,
            Self::UnknownNode(_) | Self::NotRunning(_) => ErrorKind::NotFound,
            Self::Store { .. } | Self::Runtime { .. } | Self::Key { .. } | Self::WriteBack { .. } => {
                ErrorKind::Collaborator
            }
        }
    }

    pub(crate) fn store(op: &'static str, id: &NodeId, source: StoreError) -> Self {
        Self::Store {
            op,
            id: id.clone(),
            source,
        }
    }

    pub(crate) fn runtime(op: &'static str, id: &NodeId, source: RuntimeError) -> Self {
        Self::Runtime {
            op,
            id: id.clone(),
            source,
        }
    }
}
