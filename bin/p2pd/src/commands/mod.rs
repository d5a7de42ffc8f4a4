//! Subcommand implementations.

pub(crate) mod config;
pub(crate) mod node;
pub(crate) mod run;

pub(crate) use config::ConfigArgs;
pub(crate) use node::NodeCommand;
pub(crate) use run::RunArgs;
