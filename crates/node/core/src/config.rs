//! Daemon configuration handling.

use crate::{
    args::{ApiArgs, DatabaseArgs},
    dirs::DataDirs,
};
use eyre::{Result, WrapErr};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    net::{IpAddr, SocketAddr},
    path::{Path, PathBuf},
};

/// Configuration for the p2pd daemon.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct P2pdConfig {
    /// Control API configuration
    pub api: ApiArgs,

    /// Node spec database configuration
    pub database: DatabaseArgs,
}

impl P2pdConfig {
    /// Load the configuration from the given path, or create a default one if it doesn't exist.
    pub fn load_or_create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if path.exists() {
            let content = fs::read_to_string(path)
                .wrap_err_with(|| format!("Failed to read config {}", path.display()))?;
            let config: Self = toml::from_str(&content)
                .wrap_err_with(|| format!("Failed to parse config {}", path.display()))?;
            Ok(config)
        } else {
            let config = Self::default();
            config.save(path)?;
            Ok(config)
        }
    }

    /// Save the configuration to the given path.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;

        Ok(())
    }

    /// Apply command line arguments to override the configuration.
    pub fn apply_cli_args(&mut self, api_args: &ApiArgs, database_args: &DatabaseArgs) {
        self.api = api_args.clone();

        if database_args.memory_only {
            self.database.memory_only = true;
        }
        if let Some(path) = &database_args.path {
            self.database.path = Some(path.clone());
        }
    }

    /// Get the gRPC server socket address.
    pub fn grpc_socket_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self
            .api
            .grpc_addr
            .parse()
            .wrap_err_with(|| format!("Invalid gRPC address {:?}", self.api.grpc_addr))?;
        Ok(SocketAddr::new(ip, self.api.grpc_port))
    }

    /// Database file path, defaulting to a file in the data directory.
    pub fn db_path(&self, dirs: &DataDirs) -> PathBuf {
        self.database.path.clone().unwrap_or_else(|| dirs.db_file())
    }
}
