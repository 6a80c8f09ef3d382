mod app;
mod cli;
mod logging;
mod render;

use clap::Parser;

use crate::cli::Cli;
use crate::logging::LogDestination;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let destination = if cli.log_to_terminal {
        LogDestination::Both
    } else {
        LogDestination::File
    };
    logging::initialize(destination, cli.verbose);

    app::run(cli).await
}
