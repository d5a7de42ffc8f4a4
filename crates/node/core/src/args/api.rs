//! Control API CLI arguments.

use crate::constants::{DEFAULT_GRPC_PORT, DEFAULT_LOCALHOST_ADDR};
use clap::Args;
use serde::{Deserialize, Serialize};

/// Control API configuration.
#[derive(Debug, Args, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[command(next_help_heading = "API")]
#[serde(default)]
pub struct ApiArgs {
    /// gRPC control service listen address.
    #[arg(long = "grpc.addr", default_value = DEFAULT_LOCALHOST_ADDR)]
    pub grpc_addr: String,

    /// gRPC control service listen port.
    #[arg(long = "grpc.port", default_value_t = DEFAULT_GRPC_PORT)]
    pub grpc_port: u16,
}

impl Default for ApiArgs {
    fn default() -> Self {
        Self {
            grpc_addr: DEFAULT_LOCALHOST_ADDR.to_string(),
            grpc_port: DEFAULT_GRPC_PORT,
        }
    }
}
