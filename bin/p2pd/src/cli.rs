//! CLI entry point.

use clap::{Parser, Subcommand};
use color_eyre::eyre;
use p2pd_node_core::{args::LogArgs, logging};

use crate::commands::{self, ConfigArgs, NodeCommand, RunArgs};

/// p2pd - libp2p node lifecycle daemon
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub(crate) struct Cli {
    /// Logging configuration (applies to all subcommands).
    #[command(flatten)]
    pub(crate) logs: LogArgs,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub(crate) command: Commands,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub(crate) enum Commands {
    /// Run the daemon.
    Run(RunArgs),

    /// Print the effective configuration.
    Config(ConfigArgs),

    /// Control nodes on a running daemon.
    Node(NodeCommand),
}

/// Parse the command line and dispatch.
pub(crate) async fn run() -> eyre::Result<()> {
    // Setup error handling
    color_eyre::install()?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => {
            logging::init_logging(&cli.logs)?;
            commands::run::run(args).await
        }
        Commands::Config(args) => commands::config::run(args),
        Commands::Node(command) => commands::node::run(command).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run() {
        let cli = Cli::try_parse_from([
            "p2pd",
            "-vv",
            "run",
            "--datadir",
            "/tmp/p2pd",
            "--db.memory",
            "--grpc.port",
            "6000",
        ])
        .unwrap();

        assert_eq!(cli.logs.verbosity, 2);
        let Commands::Run(args) = cli.command else {
            panic!("expected run command");
        };
        assert!(args.database.memory_only);
        assert_eq!(args.api.grpc_port, 6000);
        assert_eq!(args.api.grpc_addr, "127.0.0.1");
    }

    #[test]
    fn test_parse_node_listen() {
        let cli = Cli::try_parse_from([
            "p2pd",
            "node",
            "--endpoint",
            "http://10.0.0.1:5050",
            "listen",
            "n1",
            "/ip4/0.0.0.0/tcp/4001",
        ])
        .unwrap();

        assert!(matches!(cli.command, Commands::Node(_)));
    }
}
