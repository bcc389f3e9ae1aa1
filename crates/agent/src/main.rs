#![forbid(unsafe_code)]

mod cli;
mod control_socket;
mod shutdown;
mod startup;

use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::parse();
    startup::run(&cli).await
}
