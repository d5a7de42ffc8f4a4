//! `p2pd node`: drive the control service of a running daemon.

use clap::{Args, Subcommand};
use eyre::{Result, WrapErr};
use p2pd_rpc_server::proto::control::{
    CreateNodeRequest, ListenNodeRequest, StartNodeRequest, StatusNodeRequest, StopNodeRequest,
    control_client::ControlClient,
};

/// Arguments for the `node` command.
#[derive(Debug, Args)]
pub(crate) struct NodeCommand {
    /// Control service endpoint.
    #[arg(long, default_value = "http://127.0.0.1:5050", env = "P2PD_ENDPOINT")]
    pub(crate) endpoint: String,

    #[command(subcommand)]
    pub(crate) action: NodeAction,
}

#[derive(Debug, Subcommand)]
pub(crate) enum NodeAction {
    /// Create and start a node with a fresh identity.
    Create { node_id: String },
    /// Start a stopped node.
    Start { node_id: String },
    /// Make a running node listen on a multiaddr.
    Listen { node_id: String, addr: String },
    /// Show a node's state.
    Status { node_id: String },
    /// Stop a running node.
    Stop { node_id: String },
}

pub(crate) async fn run(command: NodeCommand) -> Result<()> {
    let mut client = ControlClient::connect(command.endpoint.clone())
        .await
        .wrap_err_with(|| format!("failed to connect to {}", command.endpoint))?;

    match command.action {
        NodeAction::Create { node_id } => {
            let resp = client
                .create_node(CreateNodeRequest { node_id })
                .await?
                .into_inner();
            println!("peer_id: {}", resp.node_peer_id);
        }
        NodeAction::Start { node_id } => {
            let resp = client
                .start_node(StartNodeRequest { node_id })
                .await?
                .into_inner();
            print_node(&resp.node_peer_id, None, &resp.node_listen_addrs);
        }
        NodeAction::Listen { node_id, addr } => {
            let resp = client
                .listen_node(ListenNodeRequest { node_id, addr })
                .await?
                .into_inner();
            print_node(&resp.node_peer_id, None, &resp.node_listen_addrs);
        }
        NodeAction::Status { node_id } => {
            let resp = client
                .status_node(StatusNodeRequest { node_id })
                .await?
                .into_inner();
            let state = resp.node_state().as_str_name();
            print_node(&resp.node_peer_id, Some(state), &resp.node_listen_addrs);
        }
        NodeAction::Stop { node_id } => {
            let resp = client
                .stop_node(StopNodeRequest { node_id })
                .await?
                .into_inner();
            print_node(&resp.node_peer_id, None, &resp.node_listen_addrs);
        }
    }

    Ok(())
}

fn print_node(peer_id: &str, state: Option<&str>, addrs: &[String]) {
    println!("peer_id: {peer_id}");
    if let Some(state) = state {
        println!("state: {state}");
    }
    for addr in addrs {
        println!("listen: {addr}");
    }
}
