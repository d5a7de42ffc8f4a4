//! `p2pd run`: serve the control plane until interrupted.

use std::sync::Arc;

use clap::Args;
use eyre::{Result, WrapErr, eyre};
use p2pd_node_core::{
    LifecycleController,
    args::{ApiArgs, DataDirArgs, DatabaseArgs},
    config::P2pdConfig,
    dirs::DataDirs,
};
use p2pd_rpc_server::{GrpcServer, GrpcServerConfig};
use p2pd_runtime::{Libp2pRuntime, RuntimeConfig};
use p2pd_storage::{MemoryNodeSpecStore, NodeSpecStore};
use p2pd_storage_redb::RedbNodeSpecStore;
use p2pd_tasks::TaskManager;
use tracing::{error, info};

/// Arguments for the `run` command.
#[derive(Debug, Args)]
pub(crate) struct RunArgs {
    /// Data directory configuration.
    #[command(flatten)]
    pub(crate) datadir: DataDirArgs,

    /// Database configuration.
    #[command(flatten)]
    pub(crate) database: DatabaseArgs,

    /// API configuration.
    #[command(flatten)]
    pub(crate) api: ApiArgs,
}

pub(crate) async fn run(args: RunArgs) -> Result<()> {
    let dirs = DataDirs::new(&args.datadir)?;

    // Load configuration and apply CLI overrides
    let mut config = P2pdConfig::load_or_create(dirs.config_file())?;
    config.apply_cli_args(&args.api, &args.database);
    info!(datadir = %dirs.root.display(), "Starting p2pd {}", env!("CARGO_PKG_VERSION"));

    let mut tasks = TaskManager::current()?;
    let executor = tasks.executor();

    let store: Arc<dyn NodeSpecStore> = if config.database.memory_only {
        info!("Using in-memory node spec store, nothing will be persisted");
        Arc::new(MemoryNodeSpecStore::new())
    } else {
        let path = config.db_path(&dirs);
        Arc::new(RedbNodeSpecStore::open(&path).wrap_err_with(|| {
            format!("failed to open node spec database: {}", path.display())
        })?)
    };

    let runtime = Libp2pRuntime::new(RuntimeConfig::default(), executor.clone());
    let controller = Arc::new(LifecycleController::new(runtime, store, &executor));

    let server = GrpcServer::new(
        GrpcServerConfig {
            addr: config.grpc_socket_addr()?,
        },
        controller.clone(),
    );
    executor.spawn_critical("grpc-server", {
        let server = server.clone();
        async move { server.start().await }
    });
    info!(grpc = %server.address(), "p2pd running, press Ctrl-C to stop");

    let failure = tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.wrap_err("failed to listen for Ctrl-C")?;
            info!("Received Ctrl-C, shutting down");
            None
        }
        err = tasks.critical_failure() => {
            error!(%err, "Shutting down after critical task failure");
            Some(err)
        }
    };

    server.stop();
    controller.shutdown().await;
    info!("Shutdown complete");

    match failure {
        Some(err) => Err(eyre!(err)),
        None => Ok(()),
    }
}
