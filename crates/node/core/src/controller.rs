//! Node lifecycle controller.

use std::sync::Arc;

use p2pd_node_registry::NodeRegistry;
use p2pd_primitives::{Multiaddr, NodeId, NodeSpec, NodeState, PeerId};
use p2pd_runtime::NodeRuntime;
use p2pd_storage::NodeSpecStore;
use p2pd_tasks::TaskExecutor;
use tracing::{debug, info, instrument, warn};

use crate::{
    ControlError, ControlResult, NodeHandle, WriteBackError,
    blocking::with_store,
    metrics::ControlMetrics,
    writeback::{self, WriteBackQueue},
};

const OP_CREATE: &str = "create node";
const OP_START: &str = "start node";
const OP_LISTEN: &str = "listen node";
const OP_STATUS: &str = "status node";
const OP_STOP: &str = "stop node";

/// Observable state of a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeStatus {
    pub peer_id: PeerId,
    pub state: NodeState,
    /// Live addresses when started, stored addresses when stopped.
    pub listen_addrs: Vec<String>,
}

/// Coordinates the node registry, the spec store and the runtime.
///
/// Every operation takes `&self` and may run concurrently with any other.
/// Uniqueness of live nodes rests entirely on
/// [`NodeRegistry::try_register`]: a request that loses the race closes
/// the instance it materialized and reports [`ControlError::AlreadyExists`].
///
/// Nothing is awaited between a successful registration and the end of an
/// operation, so dropping a request future never leaves a node half
/// registered. Instances dropped before registration shut themselves down.
pub struct LifecycleController<R: NodeRuntime> {
    runtime: R,
    registry: Arc<NodeRegistry<NodeHandle<R::Instance>>>,
    store: Arc<dyn NodeSpecStore>,
    writeback: WriteBackQueue,
    metrics: ControlMetrics,
}

impl<R: NodeRuntime> std::fmt::Debug for LifecycleController<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleController")
            .field("running", &self.registry.len())
            .finish_non_exhaustive()
    }
}

impl<R: NodeRuntime> LifecycleController<R> {
    /// Create a controller and spawn its write-back worker on `executor`.
    pub fn new(runtime: R, store: Arc<dyn NodeSpecStore>, executor: &TaskExecutor) -> Self {
        let registry = Arc::new(NodeRegistry::new());
        let (writeback, worker) = writeback::channel(registry.clone(), store.clone());
        executor.spawn("writeback", worker.run());

        Self {
            runtime,
            registry,
            store,
            writeback,
            metrics: ControlMetrics,
        }
    }

    /// Number of running nodes.
    pub fn running(&self) -> usize {
        self.registry.len()
    }

    /// Create a node with a fresh identity.
    ///
    /// The new node is also started, with no listen addresses. Fails with
    /// [`ControlError::AlreadyExists`] if the node is running or a spec for
    /// it is already stored, since creating again would replace its identity.
    #[instrument(skip_all, fields(node_id = %id))]
    pub async fn create_node(&self, id: &NodeId) -> ControlResult<PeerId> {
        let result = self.create(id).await;
        self.observe(OP_CREATE, result)
    }

    /// Start a stopped node from its stored spec.
    ///
    /// The node listens on every stored address again, in order. Any address
    /// that fails to parse or bind aborts the start.
    #[instrument(skip_all, fields(node_id = %id))]
    pub async fn start_node(&self, id: &NodeId) -> ControlResult<NodeStatus> {
        let result = self.start(id).await;
        self.observe(OP_START, result)
    }

    /// Make a running node listen on `addr`.
    ///
    /// Returns the full live address list. The stored spec catches up
    /// through the write-back queue. A node stopped while the listen was in
    /// flight reports [`ControlError::NotRunning`].
    #[instrument(skip_all, fields(node_id = %id, %addr))]
    pub async fn listen_node(&self, id: &NodeId, addr: &str) -> ControlResult<NodeStatus> {
        let result = self.listen(id, addr).await;
        self.observe(OP_LISTEN, result)
    }

    /// Report a node's state without changing anything.
    #[instrument(skip_all, fields(node_id = %id))]
    pub fn status_node(&self, id: &NodeId) -> ControlResult<NodeStatus> {
        let result = self.status(id);
        self.observe(OP_STATUS, result)
    }

    /// Stop a running node, persisting its final listen addresses.
    ///
    /// The node is closed even if persisting fails.
    #[instrument(skip_all, fields(node_id = %id))]
    pub async fn stop_node(&self, id: &NodeId) -> ControlResult<NodeStatus> {
        let result = self.stop(id).await;
        self.observe(OP_STOP, result)
    }

    /// Stop every running node and drain the write-back queue.
    pub async fn shutdown(&self) {
        let nodes = self.registry.drain();
        info!(count = nodes.len(), "stopping all nodes");

        for (id, handle) in nodes {
            let spec = handle.spec();
            handle.close();
            if let Err(err) = self.writeback.persist(spec).await {
                warn!(node_id = %id, %err, "failed to persist node spec on shutdown");
            }
        }

        if let Err(err) = self.writeback.flush().await {
            warn!(%err, "failed to flush write-back queue");
        }
    }

    /// Wait until every write-back scheduled so far has been processed.
    pub async fn flush(&self) -> Result<(), WriteBackError> {
        self.writeback.flush().await
    }

    async fn create(&self, id: &NodeId) -> ControlResult<PeerId> {
        if self.registry.contains(id) {
            return Err(ControlError::AlreadyExists(id.clone()));
        }
        if self.load(OP_CREATE, id).await?.is_some() {
            return Err(ControlError::AlreadyExists(id.clone()));
        }

        let instance = self
            .runtime
            .create_node(id)
            .await
            .map_err(|err| ControlError::runtime(OP_CREATE, id, err))?;
        let handle = Arc::new(NodeHandle::new(id.clone(), instance));

        // The spec is claimed before the node becomes visible, so a
        // concurrent create that also got this far loses here
        let spec = handle.spec();
        match with_store(&self.store, move |store| store.put_new(&spec)).await {
            Ok(true) => {}
            Ok(false) => {
                handle.close();
                return Err(ControlError::AlreadyExists(id.clone()));
            }
            Err(err) => {
                handle.close();
                return Err(ControlError::store(OP_CREATE, id, err));
            }
        }

        if !self.registry.try_register(id.clone(), handle.clone()) {
            handle.close();
            return Err(ControlError::AlreadyExists(id.clone()));
        }

        info!(peer_id = %handle.peer_id(), "node created");
        Ok(handle.peer_id())
    }

    async fn start(&self, id: &NodeId) -> ControlResult<NodeStatus> {
        let spec = self
            .load(OP_START, id)
            .await?
            .ok_or_else(|| ControlError::UnknownNode(id.clone()))?;
        if self.registry.contains(id) {
            return Err(ControlError::AlreadyExists(id.clone()));
        }

        let addrs = spec
            .listen_addrs
            .iter()
            .map(|addr| parse_addr(addr))
            .collect::<ControlResult<Vec<_>>>()?;

        let instance = self
            .runtime
            .start_node(id, &spec.private_key)
            .await
            .map_err(|err| ControlError::runtime(OP_START, id, err))?;
        let handle = Arc::new(NodeHandle::new(id.clone(), instance));

        for addr in addrs {
            if let Err(err) = handle.listen(addr).await {
                handle.close();
                return Err(ControlError::runtime(OP_START, id, err));
            }
        }

        if !self.registry.try_register(id.clone(), handle.clone()) {
            handle.close();
            return Err(ControlError::AlreadyExists(id.clone()));
        }
        self.writeback.schedule(id.clone());

        info!(peer_id = %handle.peer_id(), addrs = spec.listen_addrs.len(), "node started");
        Ok(handle.status())
    }

    async fn listen(&self, id: &NodeId, addr: &str) -> ControlResult<NodeStatus> {
        let handle = self
            .registry
            .lookup(id)
            .ok_or_else(|| ControlError::NotRunning(id.clone()))?;
        let addr = parse_addr(addr)?;

        handle
            .listen(addr)
            .await
            .map_err(|err| ControlError::runtime(OP_LISTEN, id, err))?;

        // A stop that overlapped the listen has already snapshotted the node
        // without this address
        if !self.registry.is_registered(id, &handle) {
            return Err(ControlError::NotRunning(id.clone()));
        }
        self.writeback.schedule(id.clone());

        Ok(handle.status())
    }

    fn status(&self, id: &NodeId) -> ControlResult<NodeStatus> {
        if let Some(handle) = self.registry.lookup(id) {
            return Ok(handle.status());
        }

        // Reads stay on the caller's thread; only commits are moved off it
        let spec = self
            .store
            .get(id)
            .map_err(|err| ControlError::store(OP_STATUS, id, err))?
            .ok_or_else(|| ControlError::UnknownNode(id.clone()))?;
        let peer_id = spec.peer_id().map_err(|source| ControlError::Key {
            op: OP_STATUS,
            id: id.clone(),
            source,
        })?;

        Ok(NodeStatus {
            peer_id,
            state: NodeState::Stopped,
            listen_addrs: spec.listen_addrs,
        })
    }

    async fn stop(&self, id: &NodeId) -> ControlResult<NodeStatus> {
        let handle = self
            .registry
            .remove(id)
            .ok_or_else(|| ControlError::NotRunning(id.clone()))?;
        let spec = handle.spec();
        handle.close();

        // Queued behind any pending snapshot; survives this future being dropped
        self.writeback
            .persist(spec.clone())
            .await
            .map_err(|source| ControlError::WriteBack {
                op: OP_STOP,
                id: id.clone(),
                source,
            })?;

        info!(peer_id = %handle.peer_id(), "node stopped");
        Ok(NodeStatus {
            peer_id: handle.peer_id(),
            state: NodeState::Stopped,
            listen_addrs: spec.listen_addrs,
        })
    }

    async fn load(&self, op: &'static str, id: &NodeId) -> ControlResult<Option<NodeSpec>> {
        let key = id.clone();
        with_store(&self.store, move |store| store.get(&key))
            .await
            .map_err(|err| ControlError::store(op, id, err))
    }

    fn observe<T>(&self, op: &'static str, result: ControlResult<T>) -> ControlResult<T> {
        self.metrics.request(op);
        if let Err(err) = &result {
            self.metrics.error(op, err.kind());
            debug!(%err, "{op} failed");
        }
        result
    }
}

fn parse_addr(addr: &str) -> ControlResult<Multiaddr> {
    addr.parse().map_err(|source| ControlError::InvalidAddress {
        addr: addr.to_string(),
        source,
    })
}
