//! CLI command handling
//!
//! Dispatches CLI commands and formats their output.

mod render;

use std::path::{Path, PathBuf};

use colored::Colorize;

use crate::commands::Commands;
use crate::common::config::{Config, Layout};
use crate::common::{logging, now_stamp, Error, Result};
use crate::convert;
use crate::run::{RunContext, RunSession, RunSummary, SystemOpener};
use crate::workspace;

pub use render::{JsonObserver, ProgressObserver};

/// Dispatch a CLI command
pub async fn dispatch(command: Commands, config_path: Option<&Path>) -> Result<()> {
    let mut config = Config::load(config_path)?;
    let layout = config.paths.resolve(&std::env::current_dir()?);

    match command {
        Commands::Run {
            file,
            repo,
            no_open,
            json,
        } => {
            let result = run_collection(&config, layout, &repo, file, no_open, json).await;
            record_history(&mut config, config_path, &result);

            if let (true, Err(e)) = (json, &result) {
                println!(
                    "{}",
                    serde_json::json!({
                        "event": "error",
                        "code": e.code(),
                        "message": e.to_string(),
                    })
                );
            }

            let summary = result?;
            if json {
                println!("{}", serde_json::to_string(&summary)?);
            } else {
                print_summary(&summary);
            }
            Ok(())
        }

        Commands::Convert { input, output } => {
            let conversion = convert::convert(&input, &output)?;
            println!(
                "{} Wrote {} ({} columns, {} data rows)",
                "✓".green(),
                conversion.output.display(),
                conversion.columns,
                conversion.data_rows
            );
            Ok(())
        }

        Commands::Repos { search, json } => {
            let repos = workspace::list_repositories(&layout.repositories, search.as_deref())?;

            if json {
                println!(
                    "{}",
                    serde_json::json!({
                        "root": layout.repositories,
                        "repositories": repos,
                    })
                );
            } else if repos.is_empty() {
                println!(
                    "No repositories in {}",
                    layout.repositories.display().to_string().dimmed()
                );
            } else {
                for name in &repos {
                    println!("  {}", name);
                }
            }
            Ok(())
        }

        Commands::Files { repo, search, json } => {
            let root = layout.repositories.join(&repo);
            let files = workspace::list_spreadsheets(&root, search.as_deref())?;

            if json {
                println!(
                    "{}",
                    serde_json::json!({
                        "repository": repo,
                        "files": files,
                    })
                );
            } else if files.is_empty() {
                println!("No spreadsheets in {}", repo);
            } else {
                for file in &files {
                    println!("  {}", file.display());
                }
            }
            Ok(())
        }

        Commands::Status { json } => {
            print_status(&config, config_path, &layout, json);
            Ok(())
        }
    }
}

async fn run_collection(
    config: &Config,
    layout: Layout,
    repo: &str,
    file: PathBuf,
    no_open: bool,
    json: bool,
) -> Result<RunSummary> {
    let repository = layout.repositories.join(repo);
    if !repository.is_dir() {
        return Err(Error::Configuration(format!(
            "Repository '{}' not found in '{}'",
            repo,
            layout.repositories.display()
        )));
    }

    let mut runner = config.runner.clone();
    if no_open {
        runner.open_report = false;
    }

    if !json {
        println!("Running {} from {}", file.display().to_string().bold(), repo);
    }

    let mut session = RunSession::new(RunContext::new(repository, file), layout, runner);
    if json {
        session.execute(&SystemOpener, &mut JsonObserver).await
    } else {
        let mut observer = ProgressObserver::default();
        session.execute(&SystemOpener, &mut observer).await
    }
}

/// Remember when the last run happened and what it produced
fn record_history(config: &mut Config, config_path: Option<&Path>, result: &Result<RunSummary>) {
    config.history.last_run = Some(now_stamp());
    if let Ok(summary) = result {
        config.history.last_report = Some(summary.report.clone());
    }

    let Some(path) = Config::location(config_path) else {
        tracing::debug!("No configuration location, run history not saved");
        return;
    };
    if let Err(e) = config.save_to(&path) {
        tracing::warn!(error = %e, "Failed to save run history");
    }
}

fn print_summary(summary: &RunSummary) {
    println!();
    println!(
        "{} {} {}",
        "✓".green().bold(),
        "Run finished".green().bold(),
        format!("(exit code {})", summary.exit_code).dimmed()
    );
    println!("  Report: {}", summary.report.display());
    println!("  Log:    {}", summary.log.display());
    if let Some(reason) = &summary.open_error {
        println!("  {} {}", "!".yellow().bold(), reason.yellow());
    }
}

fn print_status(config: &Config, config_path: Option<&Path>, layout: &Layout, json: bool) {
    let location = Config::location(config_path);
    let runner = config.runner.resolve_program();

    if json {
        println!(
            "{}",
            serde_json::json!({
                "config": location,
                "config_exists": location.as_ref().map(|p| p.exists()).unwrap_or(false),
                "runner": {
                    "program": config.runner.program,
                    "path": runner.as_ref().ok(),
                    "error": runner.as_ref().err().map(|e| e.to_string()),
                },
                "repositories": layout.repositories,
                "collections": layout.collections,
                "last_update": config.defaults.last_update,
                "last_run": config.history.last_run,
                "last_report": config.history.last_report,
                "log": logging::log_path(),
            })
        );
        return;
    }

    let config_line = match &location {
        Some(path) if path.exists() => path.display().to_string(),
        Some(path) => format!("{} {}", path.display(), "(not created, using defaults)".dimmed()),
        None => "unavailable, using defaults".dimmed().to_string(),
    };
    println!("Config:        {}", config_line);

    match &runner {
        Ok(path) => println!("Runner:        {} {}", "✓".green(), path.display()),
        Err(e) => println!("Runner:        {} {}", "✗".red(), e),
    }

    println!("Repositories:  {}", layout.repositories.display());
    println!("Collections:   {}", layout.collections.display());
    println!("Last update:   {}", or_never(config.defaults.last_update.as_deref()));
    println!("Last run:      {}", or_never(config.history.last_run.as_deref()));
    let last_report = config
        .history
        .last_report
        .as_ref()
        .map(|p| p.display().to_string());
    println!("Last report:   {}", or_never(last_report.as_deref()));
}

fn or_never(value: Option<&str>) -> String {
    value.map(str::to_string).unwrap_or_else(|| "never".dimmed().to_string())
}
