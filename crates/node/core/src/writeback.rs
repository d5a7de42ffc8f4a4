//! Asynchronous persistence of live node state.
//!
//! Start and Listen answer from the live registry and leave persisting the
//! node's listen addresses to this queue. A single [`WriteBackWorker`]
//! processes requests strictly in order, so a later snapshot of a node is
//! never overwritten by an earlier one. Stop routes its final spec through
//! the same queue and waits for it, which keeps it ordered behind every
//! snapshot scheduled before it.
//!
//! # Consistency
//!
//! Between a Start or Listen response and the worker's write, the stored
//! spec can lag the live listen addresses. A crash inside that window loses
//! the most recent additions. Snapshot failures are logged and counted but
//! never reported to callers.

use std::sync::Arc;

use p2pd_node_registry::NodeRegistry;
use p2pd_primitives::{NodeId, NodeSpec};
use p2pd_runtime::NodeInstance;
use p2pd_storage::{NodeSpecStore, StoreError};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace, warn};

use crate::{NodeHandle, WriteBackError, blocking::with_store, metrics::WriteBackMetrics};

enum Request {
    /// Persist whatever the live handle looks like when this is processed.
    Snapshot(NodeId),
    /// Persist a fixed spec and report the outcome.
    Persist {
        spec: NodeSpec,
        reply: oneshot::Sender<Result<(), StoreError>>,
    },
    /// Signal once everything queued before this has been processed.
    Flush(oneshot::Sender<()>),
}

/// Create a queue and the worker draining it.
///
/// The worker exits once every [`WriteBackQueue`] clone is dropped and the
/// remaining requests are processed.
pub fn channel<I: NodeInstance>(
    registry: Arc<NodeRegistry<NodeHandle<I>>>,
    store: Arc<dyn NodeSpecStore>,
) -> (WriteBackQueue, WriteBackWorker<I>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let worker = WriteBackWorker {
        rx,
        registry,
        store,
        metrics: WriteBackMetrics::default(),
    };
    (WriteBackQueue { tx }, worker)
}

/// Sending side of the write-back queue.
#[derive(Debug, Clone)]
pub struct WriteBackQueue {
    tx: mpsc::UnboundedSender<Request>,
}

impl WriteBackQueue {
    /// Schedule a snapshot of the live node `id`. Never blocks.
    pub fn schedule(&self, id: NodeId) {
        trace!(node_id = %id, "scheduling write-back");
        if self.tx.send(Request::Snapshot(id)).is_err() {
            warn!("write-back worker gone, dropping snapshot");
        }
    }

    /// Persist `spec` behind everything already queued and wait for the result.
    pub async fn persist(&self, spec: NodeSpec) -> Result<(), WriteBackError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Request::Persist { spec, reply })
            .map_err(|_| WriteBackError::Closed)?;
        rx.await.map_err(|_| WriteBackError::Closed)??;
        Ok(())
    }

    /// Wait until every request queued before this call has been processed.
    pub async fn flush(&self) -> Result<(), WriteBackError> {
        let (done, rx) = oneshot::channel();
        self.tx
            .send(Request::Flush(done))
            .map_err(|_| WriteBackError::Closed)?;
        rx.await.map_err(|_| WriteBackError::Closed)
    }
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Snapshot(id) => f.debug_tuple("Snapshot").field(id).finish(),
            Self::Persist { spec, .. } => f.debug_struct("Persist").field("spec", spec).finish(),
            Self::Flush(_) => f.write_str("Flush"),
        }
    }
}

/// Drains the write-back queue into the store.
pub struct WriteBackWorker<I> {
    rx: mpsc::UnboundedReceiver<Request>,
    registry: Arc<NodeRegistry<NodeHandle<I>>>,
    store: Arc<dyn NodeSpecStore>,
    metrics: WriteBackMetrics,
}

impl<I> std::fmt::Debug for WriteBackWorker<I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteBackWorker").finish_non_exhaustive()
    }
}

impl<I: NodeInstance> WriteBackWorker<I> {
    /// Process requests until the queue is closed and empty.
    pub async fn run(mut self) {
        while let Some(request) = self.rx.recv().await {
            match request {
                Request::Snapshot(id) => self.snapshot(&id).await,
                Request::Persist { spec, reply } => {
                    let _ = reply.send(self.put(spec).await);
                }
                Request::Flush(done) => {
                    let _ = done.send(());
                }
            }
        }
        debug!("write-back queue closed");
    }

    async fn snapshot(&self, id: &NodeId) {
        // The node may have stopped since the request was queued; its final
        // spec is persisted by the stop itself
        let Some(spec) = self.registry.lookup(id).map(|handle| handle.spec()) else {
            trace!(node_id = %id, "node no longer running, skipping write-back");
            self.metrics.skipped_total.increment(1);
            return;
        };
        let _ = self.put(spec).await;
    }

    async fn put(&self, spec: NodeSpec) -> Result<(), StoreError> {
        let (id, addrs) = (spec.id.clone(), spec.listen_addrs.len());
        match with_store(&self.store, move |store| store.put(&spec)).await {
            Ok(()) => {
                self.metrics.completed_total.increment(1);
                trace!(node_id = %id, addrs, "persisted node spec");
                Ok(())
            }
            Err(err) => {
                self.metrics.failed_total.increment(1);
                warn!(node_id = %id, %err, "failed to persist node spec");
                Err(err)
            }
        }
    }
}
