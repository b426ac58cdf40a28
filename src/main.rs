use anyhow::Result;
use clap::Parser;
use islandviewer_client::cli;
use tracing::error;

fn main() -> Result<()> {
    let args = cli::Args::parse();
    if let Err(err) = cli::dispatch(args) {
        error!("{:#}", err);
        // Printed regardless of the log filter.
        eprintln!("{}", cli::fatal_message(&err));
        std::process::exit(1);
    }
    Ok(())
}
