//! Directory management for the p2pd daemon.

use crate::{
    args::DataDirArgs,
    constants::{CONFIG_FILE_NAME, DB_FILE_NAME, DEFAULT_DATA_DIR_NAME},
};
use directories::ProjectDirs;
use eyre::{Result, WrapErr};
use std::{fs, path::PathBuf};

/// Returns the default project directories for p2pd.
pub fn default_project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("rs", "p2pd", "p2pd")
}

/// Returns the default data directory path.
pub fn default_data_dir() -> Option<PathBuf> {
    default_project_dirs().map(|dirs| dirs.data_dir().to_path_buf())
}

/// Resolved data directory layout.
#[derive(Debug, Clone)]
pub struct DataDirs {
    /// Root data directory
    pub root: PathBuf,
}

impl DataDirs {
    /// Resolve the data directory from command line args and make sure it exists.
    pub fn new(args: &DataDirArgs) -> Result<Self> {
        let root = args
            .datadir
            .clone()
            .or_else(default_data_dir)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR_NAME));

        fs::create_dir_all(&root)
            .wrap_err_with(|| format!("Failed to create directory {}", root.display()))?;

        Ok(Self { root })
    }

    /// Returns the path to the config file.
    pub fn config_file(&self) -> PathBuf {
        self.root.join(CONFIG_FILE_NAME)
    }

    /// Returns the path to the node spec database.
    pub fn db_file(&self) -> PathBuf {
        self.root.join(DB_FILE_NAME)
    }
}
