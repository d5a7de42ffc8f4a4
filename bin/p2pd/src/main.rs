//! p2pd node lifecycle daemon binary.

mod cli;
mod commands;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    cli::run().await
}
