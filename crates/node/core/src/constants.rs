//! Defaults used by the daemon.

/// Default port for the gRPC control service.
pub const DEFAULT_GRPC_PORT: u16 = 5050;

/// Default bind address for the gRPC control service (local only).
pub const DEFAULT_LOCALHOST_ADDR: &str = "127.0.0.1";

/// Fallback data directory when no platform data dir is available.
pub const DEFAULT_DATA_DIR_NAME: &str = ".p2pd";

/// Config file name inside the data directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Node spec database file name inside the data directory.
pub const DB_FILE_NAME: &str = "nodes.redb";
