//! Collection Runner - run API test collections against spreadsheet data
//!
//! Converts the selected spreadsheet to CSV, launches newman with it as
//! iteration data, follows the run's progress and opens the HTML report.

use clap::Parser;
use collection_runner::{cli, commands, common::logging};
use commands::Commands;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "collection-runner", about = "Run API test collections against spreadsheet data")]
#[command(version, long_about = None)]
struct Cli {
    /// Configuration file to use instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    let guard = logging::init_cli();

    let cli = Cli::parse();
    let result = cli::dispatch(cli.command, cli.config.as_deref()).await;

    if let Err(e) = result {
        eprintln!("Error: {e}");
        drop(guard);
        std::process::exit(1);
    }
}
