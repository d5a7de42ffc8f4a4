//! gRPC server for the p2pd control plane.
//!
//! This crate exposes the [`LifecycleController`] over gRPC:
//!
//! - Control service (create, start, listen, status and stop nodes)
//! - Reflection, for tools like grpcurl
//!
//! # Usage
//!
//! ```ignore
//! use p2pd_rpc_server::{GrpcServer, GrpcServerConfig};
//!
//! let server = GrpcServer::new(GrpcServerConfig { addr }, controller.clone());
//! executor.spawn_critical("grpc", async move { server.start().await });
//! ```

mod control;

use std::{
    net::{Ipv4Addr, SocketAddr},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use p2pd_node_core::{LifecycleController, constants::DEFAULT_GRPC_PORT};
use p2pd_runtime::NodeRuntime;
use tokio::{net::TcpListener, sync::watch};
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;
use tracing::{info, warn};

pub use control::ControlService;

// Re-export generated types for external use
pub mod proto {
    pub mod control {
        tonic::include_proto!("p2pd.control.v1");
    }

    /// File descriptor set for gRPC reflection.
    pub const FILE_DESCRIPTOR_SET: &[u8] = tonic::include_file_descriptor_set!("p2pd_descriptor");
}

/// Configuration for the gRPC server.
#[derive(Debug, Clone)]
pub struct GrpcServerConfig {
    /// Address to bind to.
    pub addr: SocketAddr,
}

impl Default for GrpcServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::new(Ipv4Addr::LOCALHOST.into(), DEFAULT_GRPC_PORT),
        }
    }
}

/// gRPC server for the control service.
pub struct GrpcServer<R: NodeRuntime> {
    config: GrpcServerConfig,
    controller: Arc<LifecycleController<R>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    running: AtomicBool,
}

impl<R: NodeRuntime> std::fmt::Debug for GrpcServer<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GrpcServer")
            .field("config", &self.config)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl<R: NodeRuntime> GrpcServer<R> {
    /// Create a new gRPC server with the given configuration.
    pub fn new(config: GrpcServerConfig, controller: Arc<LifecycleController<R>>) -> Arc<Self> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Arc::new(Self {
            config,
            controller,
            shutdown_tx,
            shutdown_rx,
            running: AtomicBool::new(false),
        })
    }

    /// Bind the configured address and serve until [`GrpcServer::stop`] is called.
    pub async fn start(&self) -> eyre::Result<()> {
        let listener = TcpListener::bind(self.config.addr).await?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener until [`GrpcServer::stop`] is called.
    pub async fn serve(&self, listener: TcpListener) -> eyre::Result<()> {
        let control_service = ControlService::new(self.controller.clone());
        let control_server = proto::control::control_server::ControlServer::new(control_service);

        // Enable gRPC reflection for tools like grpcurl
        let reflection_service = tonic_reflection::server::Builder::configure()
            .register_encoded_file_descriptor_set(proto::FILE_DESCRIPTOR_SET)
            .build_v1()?;

        let addr = listener.local_addr()?;
        info!(%addr, "Starting gRPC server");
        self.running.store(true, Ordering::SeqCst);

        let mut shutdown_rx = self.shutdown_rx.clone();

        let result = Server::builder()
            .add_service(control_server)
            .add_service(reflection_service)
            .serve_with_incoming_shutdown(TcpListenerStream::new(listener), async move {
                // Already stopped before we started waiting
                if *shutdown_rx.borrow_and_update() {
                    return;
                }
                shutdown_rx.changed().await.ok();
            })
            .await;

        self.running.store(false, Ordering::SeqCst);

        match result {
            Ok(()) => {
                info!("gRPC server stopped");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "gRPC server error");
                Err(e.into())
            }
        }
    }

    /// Signal the server to stop accepting connections and finish in-flight requests.
    pub fn stop(&self) {
        info!("Stopping gRPC server");
        self.shutdown_tx.send_replace(true);
    }

    /// Configured bind address.
    pub fn address(&self) -> SocketAddr {
        self.config.addr
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}
