//! `p2pd config`: print the effective configuration.

use clap::Args;
use eyre::Result;
use p2pd_node_core::{
    args::{ApiArgs, DataDirArgs, DatabaseArgs},
    config::P2pdConfig,
    dirs::DataDirs,
};

/// Arguments for the `config` command.
#[derive(Debug, Args)]
pub(crate) struct ConfigArgs {
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

pub(crate) fn run(args: ConfigArgs) -> Result<()> {
    let dirs = DataDirs::new(&args.datadir)?;
    let mut config = P2pdConfig::load_or_create(dirs.config_file())?;
    config.apply_cli_args(&args.api, &args.database);

    println!("# {}", dirs.config_file().display());
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}
