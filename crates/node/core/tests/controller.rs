//! Lifecycle controller behaviour against a scripted runtime.

use std::sync::Arc;

use assert_matches::assert_matches;
use p2pd_node_core::{ControlError, ErrorKind, LifecycleController};
use p2pd_primitives::{NodeId, NodeSpec, NodeState};
use p2pd_runtime::{NodeInstance, NodeRuntime, RuntimeError, test_utils::MockRuntime};
use p2pd_storage::{MemoryNodeSpecStore, NodeSpecStore, StoreError, StoreResult};
use p2pd_tasks::TaskManager;

const ADDR_A: &str = "/ip4/127.0.0.1/tcp/4001";
const ADDR_B: &str = "/ip4/127.0.0.1/tcp/4002";

struct Fixture {
    controller: LifecycleController<MockRuntime>,
    runtime: MockRuntime,
    store: Arc<MemoryNodeSpecStore>,
}

fn fixture() -> Fixture {
    let store = Arc::new(MemoryNodeSpecStore::new());
    fixture_with_store(store.clone(), store)
}

fn fixture_with_store(
    backend: Arc<dyn NodeSpecStore>,
    store: Arc<MemoryNodeSpecStore>,
) -> Fixture {
    let runtime = MockRuntime::new();
    let executor = TaskManager::current().unwrap().executor();
    let controller = LifecycleController::new(runtime.clone(), backend, &executor);
    Fixture {
        controller,
        runtime,
        store,
    }
}

fn id(s: &str) -> NodeId {
    NodeId::new(s).unwrap()
}

/// Store whose writes fail while reads see nothing.
struct ReadOnlyStore;

impl NodeSpecStore for ReadOnlyStore {
    fn get(&self, _id: &NodeId) -> StoreResult<Option<NodeSpec>> {
        Ok(None)
    }

    fn put(&self, _spec: &NodeSpec) -> StoreResult<()> {
        Err(StoreError::Database("read-only".into()))
    }

    fn put_new(&self, _spec: &NodeSpec) -> StoreResult<bool> {
        Err(StoreError::Database("read-only".into()))
    }
}

#[tokio::test]
async fn status_of_unknown_node() {
    let f = fixture();
    let err = f.controller.status_node(&id("nope")).unwrap_err();
    assert_matches!(err, ControlError::UnknownNode(_));
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn create_twice_fails_second_time() {
    let f = fixture();
    f.controller.create_node(&id("a")).await.unwrap();

    assert_matches!(
        f.controller.create_node(&id("a")).await,
        Err(ControlError::AlreadyExists(_))
    );
    assert_eq!(f.controller.running(), 1);
    assert_eq!(f.runtime.live(), 1);
}

#[tokio::test]
async fn create_is_an_implicit_start() {
    let f = fixture();
    let peer_id = f.controller.create_node(&id("a")).await.unwrap();

    let status = f.controller.status_node(&id("a")).unwrap();
    assert_eq!(status.state, NodeState::Started);
    assert_eq!(status.peer_id, peer_id);
    assert!(status.listen_addrs.is_empty());

    let stored = f.store.get(&id("a")).unwrap().unwrap();
    assert_eq!(stored.peer_id().unwrap(), peer_id);
}

#[tokio::test]
async fn create_rejects_stopped_node() {
    let f = fixture();
    let peer_id = f.controller.create_node(&id("a")).await.unwrap();
    f.controller.stop_node(&id("a")).await.unwrap();

    assert_matches!(
        f.controller.create_node(&id("a")).await,
        Err(ControlError::AlreadyExists(_))
    );
    // Identity is untouched
    let stored = f.store.get(&id("a")).unwrap().unwrap();
    assert_eq!(stored.peer_id().unwrap(), peer_id);
}

#[tokio::test]
async fn create_store_failure_leaves_nothing_running() {
    let f = fixture_with_store(Arc::new(ReadOnlyStore), Arc::new(MemoryNodeSpecStore::new()));

    let err = f.controller.create_node(&id("a")).await.unwrap_err();
    assert_matches!(err, ControlError::Store { op: "create node", .. });
    assert_eq!(err.kind(), ErrorKind::Collaborator);
    assert_eq!(f.controller.running(), 0);
    assert_eq!(f.runtime.live(), 0);
}

#[tokio::test]
async fn create_runtime_failure_is_propagated() {
    let f = fixture();
    f.runtime.fail_start(true);

    assert_matches!(
        f.controller.create_node(&id("a")).await,
        Err(ControlError::Runtime {
            source: RuntimeError::Transport(_),
            ..
        })
    );
    assert!(f.store.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_creates_have_one_winner() {
    const K: usize = 16;
    let f = Arc::new(fixture());

    let tasks: Vec<_> = (0..K)
        .map(|_| {
            let f = f.clone();
            tokio::spawn(async move { f.controller.create_node(&id("contended")).await })
        })
        .collect();

    let mut winners = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => winners += 1,
            Err(err) => assert_matches!(err, ControlError::AlreadyExists(_)),
        }
    }

    assert_eq!(winners, 1);
    assert_eq!(f.controller.running(), 1);
    // Every instance a loser materialized has been closed
    assert_eq!(f.runtime.live(), 1);
    assert_eq!(f.store.len(), 1);
}

#[tokio::test]
async fn start_unknown_node() {
    let f = fixture();
    assert_matches!(
        f.controller.start_node(&id("nope")).await,
        Err(ControlError::UnknownNode(_))
    );
    assert_eq!(f.runtime.started(), 0);
}

#[tokio::test]
async fn start_running_node() {
    let f = fixture();
    f.controller.create_node(&id("a")).await.unwrap();

    assert_matches!(
        f.controller.start_node(&id("a")).await,
        Err(ControlError::AlreadyExists(_))
    );
    assert_eq!(f.runtime.started(), 1);
}

#[tokio::test]
async fn listen_accumulates_addrs_in_order() {
    let f = fixture();
    let peer_id = f.controller.create_node(&id("a")).await.unwrap();

    let status = f.controller.listen_node(&id("a"), ADDR_A).await.unwrap();
    assert_eq!(status.peer_id, peer_id);
    assert_eq!(status.listen_addrs, vec![ADDR_A]);

    let status = f.controller.listen_node(&id("a"), ADDR_B).await.unwrap();
    assert_eq!(status.listen_addrs, vec![ADDR_A, ADDR_B]);

    // Re-adding is a no-op
    let status = f.controller.listen_node(&id("a"), ADDR_A).await.unwrap();
    assert_eq!(status.listen_addrs, vec![ADDR_A, ADDR_B]);
}

#[tokio::test]
async fn listen_requires_running_node() {
    let f = fixture();
    assert_matches!(
        f.controller.listen_node(&id("nope"), ADDR_A).await,
        Err(ControlError::NotRunning(_))
    );

    // A stored spec is not enough
    f.controller.create_node(&id("a")).await.unwrap();
    f.controller.stop_node(&id("a")).await.unwrap();
    assert_matches!(
        f.controller.listen_node(&id("a"), ADDR_A).await,
        Err(ControlError::NotRunning(_))
    );
}

#[tokio::test]
async fn listen_rejects_bad_address() {
    let f = fixture();
    f.controller.create_node(&id("a")).await.unwrap();

    let err = f
        .controller
        .listen_node(&id("a"), "not a multiaddr")
        .await
        .unwrap_err();
    assert_matches!(err, ControlError::InvalidAddress { .. });
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn listen_runtime_failure_is_propagated() {
    let f = fixture();
    f.controller.create_node(&id("a")).await.unwrap();
    f.runtime.fail_listen_on(ADDR_A.parse().unwrap());

    assert_matches!(
        f.controller.listen_node(&id("a"), ADDR_A).await,
        Err(ControlError::Runtime {
            op: "listen node",
            source: RuntimeError::Listen { .. },
            ..
        })
    );
    let status = f.controller.status_node(&id("a")).unwrap();
    assert!(status.listen_addrs.is_empty());
}

#[tokio::test]
async fn listen_is_written_back() {
    let f = fixture();
    f.controller.create_node(&id("a")).await.unwrap();
    f.controller.listen_node(&id("a"), ADDR_A).await.unwrap();
    f.controller.listen_node(&id("a"), ADDR_B).await.unwrap();

    f.controller.flush().await.unwrap();

    let stored = f.store.get(&id("a")).unwrap().unwrap();
    assert_eq!(stored.listen_addrs, vec![ADDR_A, ADDR_B]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn listen_overlapping_stop_is_not_acknowledged() {
    let f = Arc::new(fixture());
    f.controller.create_node(&id("a")).await.unwrap();

    let gate = f.runtime.pause_next_listen();
    let listening = tokio::spawn({
        let f = f.clone();
        async move { f.controller.listen_node(&id("a"), ADDR_A).await }
    });
    gate.entered().await;

    let stopped = f.controller.stop_node(&id("a")).await.unwrap();
    assert!(stopped.listen_addrs.is_empty());
    gate.release();

    assert_matches!(
        listening.await.unwrap(),
        Err(ControlError::NotRunning(_))
    );
    f.controller.flush().await.unwrap();

    let status = f.controller.status_node(&id("a")).unwrap();
    assert_eq!(status.state, NodeState::Stopped);
    assert!(status.listen_addrs.is_empty());
    assert!(f.store.get(&id("a")).unwrap().unwrap().listen_addrs.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn listen_overlapping_restart_is_not_acknowledged() {
    let f = Arc::new(fixture());
    f.controller.create_node(&id("a")).await.unwrap();

    let gate = f.runtime.pause_next_listen();
    let listening = tokio::spawn({
        let f = f.clone();
        async move { f.controller.listen_node(&id("a"), ADDR_A).await }
    });
    gate.entered().await;

    // The listen finishes on an instance that is no longer the registered one
    f.controller.stop_node(&id("a")).await.unwrap();
    f.controller.start_node(&id("a")).await.unwrap();
    gate.release();

    assert_matches!(
        listening.await.unwrap(),
        Err(ControlError::NotRunning(_))
    );
    let status = f.controller.status_node(&id("a")).unwrap();
    assert_eq!(status.state, NodeState::Started);
    assert!(status.listen_addrs.is_empty());
}

#[tokio::test]
async fn status_of_stored_node_matches_later_start() {
    let f = fixture();

    // A spec written by an earlier daemon run, never started in this one
    let key = {
        let instance = f.runtime.create_node(&id("b")).await.unwrap();
        instance.private_key().to_vec()
    };
    let mut spec = NodeSpec::new(id("b"), key);
    spec.listen_addrs = vec![ADDR_A.to_string()];
    f.store.put(&spec).unwrap();
    let live_before = f.runtime.live();

    let status = f.controller.status_node(&id("b")).unwrap();
    assert_eq!(status.state, NodeState::Stopped);
    assert_eq!(status.listen_addrs, vec![ADDR_A]);

    // Status touched neither the registry, the runtime nor the store
    assert_eq!(f.controller.running(), 0);
    assert_eq!(f.runtime.live(), live_before);
    assert_eq!(f.store.get(&id("b")).unwrap().unwrap(), spec);

    let started = f.controller.start_node(&id("b")).await.unwrap();
    assert_eq!(started.peer_id, status.peer_id);
    assert_eq!(started.listen_addrs, vec![ADDR_A]);
}

#[tokio::test]
async fn stopped_status_derives_peer_id() {
    let f = fixture();
    let peer_id = f.controller.create_node(&id("a")).await.unwrap();
    f.controller.listen_node(&id("a"), ADDR_A).await.unwrap();
    f.controller.stop_node(&id("a")).await.unwrap();

    let status = f.controller.status_node(&id("a")).unwrap();
    assert_eq!(status.state, NodeState::Stopped);
    assert_eq!(status.peer_id, peer_id);
    assert_eq!(status.listen_addrs, vec![ADDR_A]);

    // Status never starts anything
    assert_eq!(f.controller.running(), 0);
    assert_eq!(f.runtime.live(), 0);
}

#[tokio::test]
async fn stop_then_start_restores_node() {
    let f = fixture();
    let peer_id = f.controller.create_node(&id("a")).await.unwrap();
    f.controller.listen_node(&id("a"), ADDR_A).await.unwrap();
    f.controller.listen_node(&id("a"), ADDR_B).await.unwrap();

    let stopped = f.controller.stop_node(&id("a")).await.unwrap();
    assert_eq!(stopped.state, NodeState::Stopped);
    assert_eq!(stopped.listen_addrs, vec![ADDR_A, ADDR_B]);
    assert_eq!(f.runtime.live(), 0);

    let started = f.controller.start_node(&id("a")).await.unwrap();
    assert_eq!(started.state, NodeState::Started);
    assert_eq!(started.peer_id, peer_id);
    assert_eq!(started.listen_addrs, vec![ADDR_A, ADDR_B]);
    assert_eq!(f.runtime.live(), 1);
}

#[tokio::test]
async fn stop_requires_running_node() {
    let f = fixture();
    assert_matches!(
        f.controller.stop_node(&id("a")).await,
        Err(ControlError::NotRunning(_))
    );
}

#[tokio::test]
async fn start_aborts_when_stored_addr_fails() {
    let f = fixture();
    f.controller.create_node(&id("a")).await.unwrap();
    f.controller.listen_node(&id("a"), ADDR_A).await.unwrap();
    f.controller.stop_node(&id("a")).await.unwrap();

    f.runtime.fail_listen_on(ADDR_A.parse().unwrap());
    assert_matches!(
        f.controller.start_node(&id("a")).await,
        Err(ControlError::Runtime { op: "start node", .. })
    );
    assert_eq!(f.controller.running(), 0);
    assert_eq!(f.runtime.live(), 0);
}

#[tokio::test]
async fn corrupt_key_material() {
    let f = fixture();
    f.store
        .put(&NodeSpec::new(id("bad"), vec![0xde, 0xad]))
        .unwrap();

    assert_matches!(
        f.controller.status_node(&id("bad")),
        Err(ControlError::Key { op: "status node", .. })
    );
    assert_matches!(
        f.controller.start_node(&id("bad")).await,
        Err(ControlError::Runtime {
            source: RuntimeError::Key(_),
            ..
        })
    );
}

#[tokio::test]
async fn shutdown_stops_and_persists_everything() {
    let f = fixture();
    f.controller.create_node(&id("a")).await.unwrap();
    f.controller.create_node(&id("b")).await.unwrap();
    f.controller.listen_node(&id("b"), ADDR_B).await.unwrap();

    f.controller.shutdown().await;

    assert_eq!(f.controller.running(), 0);
    assert_eq!(f.runtime.live(), 0);
    assert_eq!(
        f.store.get(&id("b")).unwrap().unwrap().listen_addrs,
        vec![ADDR_B]
    );
    assert_eq!(
        f.controller.status_node(&id("a")).unwrap().state,
        NodeState::Stopped
    );
}
