mod cli;
mod config;
mod error;
mod journal;
mod logging;
mod migration;
mod model;
mod providers;
mod util;

use anyhow::Result;
use clap::Parser;

use cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);
    cli.execute().await
}
