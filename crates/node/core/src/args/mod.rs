//! CLI argument structs for daemon configuration.
//!
//! These args serve dual purposes:
//! - CLI parsing via clap (`#[derive(Args)]`)
//! - Configuration serialization via serde (`#[derive(Serialize, Deserialize)]`)

mod api;
mod database;
mod datadir;
mod log;

pub use api::ApiArgs;
pub use database::DatabaseArgs;
pub use datadir::DataDirArgs;
pub use log::LogArgs;
