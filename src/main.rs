use anyhow::Result;
use clap::Parser;
use sentinel_batch::cli::{self, Cli};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    cli::setup_logging(cli.verbose);
    cli::run(cli).await
}
