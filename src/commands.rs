//! CLI command definitions
//!
//! Defines the clap commands for the collection runner CLI.

use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Convert a data file and run the collection against it
    Run {
        /// Spreadsheet path, relative to the repository
        file: PathBuf,

        /// Repository holding the data file
        #[arg(long, short)]
        repo: String,

        /// Don't open the HTML report when the run succeeds
        #[arg(long)]
        no_open: bool,

        /// Emit run events as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Convert a spreadsheet to CSV without running anything
    Convert {
        /// Spreadsheet (or CSV) to read
        input: PathBuf,

        /// CSV file to write, overwritten if present
        output: PathBuf,
    },

    /// List repository checkouts
    #[command(alias = "ls")]
    Repos {
        /// Only show names containing this text (case-insensitive)
        #[arg(long, short)]
        search: Option<String>,

        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the spreadsheets of a repository
    Files {
        /// Repository name
        repo: String,

        /// Only show paths containing this text (case-insensitive)
        #[arg(long, short)]
        search: Option<String>,

        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show configuration, runner location and run history
    Status {
        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },
}
