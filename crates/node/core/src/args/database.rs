//! Database CLI arguments.

use clap::Args;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Node spec database configuration.
#[derive(Debug, Args, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[command(next_help_heading = "Database")]
#[serde(default)]
pub struct DatabaseArgs {
    /// Use in-memory database (no persistence).
    #[arg(long = "db.memory")]
    pub memory_only: bool,

    /// Database file path. Defaults to a file in the data directory.
    #[arg(long = "db.path", value_name = "PATH")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}
