//! Node lifecycle control plane.
//!
//! [`LifecycleController`] implements the create, start, listen, status and
//! stop operations on top of three collaborators:
//! - a [`NodeRegistry`](p2pd_node_registry::NodeRegistry) of live handles,
//!   the only source of truth for whether a node is running
//! - a [`NodeSpecStore`](p2pd_storage::NodeSpecStore) holding every node's
//!   durable spec
//! - a [`NodeRuntime`](p2pd_runtime::NodeRuntime) that materializes nodes
//!
//! Listen address changes reach the store through the [`writeback`] queue,
//! which runs off the request path.
//!
//! The remaining modules are daemon infrastructure:
//! - [`args`] - CLI argument structs doubling as config sections
//! - [`config`] - TOML configuration loading
//! - [`dirs`] - data directory management
//! - [`logging`] - tracing subscriber initialization

pub mod args;
pub mod config;
pub mod constants;
pub mod dirs;
pub mod logging;
pub mod writeback;

mod blocking;
mod controller;
mod error;
mod handle;
mod metrics;

pub use controller::{LifecycleController, NodeStatus};
pub use error::{ControlError, ControlResult, ErrorKind, WriteBackError};
pub use handle::NodeHandle;
