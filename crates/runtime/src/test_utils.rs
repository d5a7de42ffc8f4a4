//! Scripted in-process runtime for exercising the control plane without
//! opening sockets.

use std::{
    collections::HashSet,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use p2pd_primitives::{Multiaddr, NodeId, PeerId, derive_peer_id};
use parking_lot::{Mutex, RwLock};
use tokio::sync::Notify;

use crate::{NodeInstance, NodeRuntime, RuntimeError};

#[derive(Debug, Default)]
struct MockState {
    started: AtomicUsize,
    closed: AtomicUsize,
    fail_start: AtomicBool,
    failing_addrs: Mutex<HashSet<Multiaddr>>,
    listen_gate: Mutex<Option<ListenGate>>,
}

/// Holds the next listen between accepting it and binding the address.
#[derive(Debug, Clone, Default)]
pub struct ListenGate {
    entered: Arc<Notify>,
    release: Arc<Notify>,
}

impl ListenGate {
    /// Wait until a listen is parked at the gate.
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    /// Let the parked listen finish.
    pub fn release(&self) {
        self.release.notify_one();
    }
}

/// [`NodeRuntime`] that tracks every instance it hands out.
#[derive(Debug, Clone, Default)]
pub struct MockRuntime {
    state: Arc<MockState>,
}

impl MockRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of instances created or started so far.
    pub fn started(&self) -> usize {
        self.state.started.load(Ordering::SeqCst)
    }

    /// Number of instances that were closed or dropped.
    pub fn closed(&self) -> usize {
        self.state.closed.load(Ordering::SeqCst)
    }

    /// Number of instances still running.
    pub fn live(&self) -> usize {
        self.started() - self.closed()
    }

    /// Make every subsequent start fail.
    pub fn fail_start(&self, fail: bool) {
        self.state.fail_start.store(fail, Ordering::SeqCst);
    }

    /// Make listening on `addr` fail.
    pub fn fail_listen_on(&self, addr: Multiaddr) {
        self.state.failing_addrs.lock().insert(addr);
    }

    /// Park the next listen on any instance after it has been accepted.
    pub fn pause_next_listen(&self) -> ListenGate {
        let gate = ListenGate::default();
        *self.state.listen_gate.lock() = Some(gate.clone());
        gate
    }
}

#[async_trait]
impl NodeRuntime for MockRuntime {
    type Instance = MockNode;

    async fn start_node(&self, _id: &NodeId, private_key: &[u8]) -> Result<MockNode, RuntimeError> {
        // Let concurrent requests interleave here like a real key generation would
        tokio::task::yield_now().await;

        if self.state.fail_start.load(Ordering::SeqCst) {
            return Err(RuntimeError::Transport("injected start failure".to_string()));
        }
        let peer_id = derive_peer_id(private_key).map_err(RuntimeError::Key)?;
        self.state.started.fetch_add(1, Ordering::SeqCst);

        Ok(MockNode {
            peer_id,
            private_key: private_key.to_vec(),
            listen_addrs: RwLock::new(Vec::new()),
            closed: AtomicBool::new(false),
            state: self.state.clone(),
        })
    }
}

/// Instance produced by [`MockRuntime`].
#[derive(Debug)]
pub struct MockNode {
    peer_id: PeerId,
    private_key: Vec<u8>,
    listen_addrs: RwLock<Vec<Multiaddr>>,
    closed: AtomicBool,
    state: Arc<MockState>,
}

impl MockNode {
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NodeInstance for MockNode {
    fn peer_id(&self) -> PeerId {
        self.peer_id
    }

    fn private_key(&self) -> &[u8] {
        &self.private_key
    }

    async fn add_listen_addr(&self, addr: Multiaddr) -> Result<(), RuntimeError> {
        if self.is_closed() {
            return Err(RuntimeError::Closed);
        }
        if self.state.failing_addrs.lock().contains(&addr) {
            return Err(RuntimeError::Listen {
                addr,
                reason: "injected listen failure".to_string(),
            });
        }

        let gate = self.state.listen_gate.lock().take();
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }

        let mut addrs = self.listen_addrs.write();
        if !addrs.contains(&addr) {
            addrs.push(addr);
        }
        Ok(())
    }

    fn listen_addrs(&self) -> Vec<Multiaddr> {
        self.listen_addrs.read().clone()
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.state.closed.fetch_add(1, Ordering::SeqCst);
        }
    }
}

impl Drop for MockNode {
    fn drop(&mut self) {
        self.close();
    }
}
