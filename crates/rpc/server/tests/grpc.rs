//! Control service over a real gRPC connection.

use std::sync::Arc;

use p2pd_node_core::LifecycleController;
use p2pd_rpc_server::{
    GrpcServer, GrpcServerConfig,
    proto::control::{
        CreateNodeRequest, ListenNodeRequest, NodeState, StatusNodeRequest,
        control_client::ControlClient,
    },
};
use p2pd_runtime::test_utils::MockRuntime;
use p2pd_storage::MemoryNodeSpecStore;
use p2pd_tasks::TaskManager;
use tokio::net::TcpListener;
use tonic::Code;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn control_service_round_trip() {
    let executor = TaskManager::current().unwrap().executor();
    let controller = Arc::new(LifecycleController::new(
        MockRuntime::new(),
        Arc::new(MemoryNodeSpecStore::new()),
        &executor,
    ));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = GrpcServer::new(GrpcServerConfig { addr }, controller.clone());
    assert_eq!(server.address(), addr);
    let serving = tokio::spawn({
        let server = server.clone();
        async move { server.serve(listener).await }
    });

    let mut client = ControlClient::connect(format!("http://{addr}"))
        .await
        .unwrap();

    let created = client
        .create_node(CreateNodeRequest {
            node_id: "remote".to_string(),
        })
        .await
        .unwrap()
        .into_inner();
    assert!(!created.node_peer_id.is_empty());

    let listened = client
        .listen_node(ListenNodeRequest {
            node_id: "remote".to_string(),
            addr: "/ip4/127.0.0.1/tcp/4001".to_string(),
        })
        .await
        .unwrap()
        .into_inner();
    assert_eq!(listened.node_listen_addrs, vec!["/ip4/127.0.0.1/tcp/4001"]);

    let status = client
        .status_node(StatusNodeRequest {
            node_id: "remote".to_string(),
        })
        .await
        .unwrap()
        .into_inner();
    assert_eq!(status.node_state(), NodeState::Started);
    assert_eq!(status.node_peer_id, created.node_peer_id);

    let err = client
        .status_node(StatusNodeRequest {
            node_id: "missing".to_string(),
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::NotFound);

    drop(client);
    server.stop();
    serving.await.unwrap().unwrap();
    assert!(!server.is_running());

    controller.shutdown().await;
    assert_eq!(controller.running(), 0);
}
