//! Terminal rendering of run events

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use crate::run::{Progress, RunEvent, RunObserver, RunState};

/// Renders a run as check marks and a progress bar
#[derive(Default)]
pub struct ProgressObserver {
    bar: Option<ProgressBar>,
}

impl ProgressObserver {
    fn show(&mut self, completed: u64, total: u64) {
        let bar = self.bar.get_or_insert_with(|| {
            let bar = ProgressBar::new(total);
            bar.set_style(bar_style());
            bar
        });
        bar.set_length(total);
        bar.set_position(completed);
        bar.set_message(Progress { completed, total }.to_string());
    }

    fn line(&self, text: String) {
        match &self.bar {
            Some(bar) => bar.println(text),
            None => println!("{text}"),
        }
    }
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("  [{bar:40.cyan/blue}] {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
}

impl RunObserver for ProgressObserver {
    fn on_event(&mut self, event: &RunEvent) {
        match event {
            RunEvent::State { state } => match state {
                RunState::Succeeded { .. } => {
                    if let Some(bar) = &self.bar {
                        bar.finish();
                    }
                }
                RunState::Failed { .. } => {
                    if let Some(bar) = &self.bar {
                        bar.abandon();
                    }
                }
                _ => {}
            },
            RunEvent::Converted { csv, data_rows } => {
                self.line(format!(
                    "  {} Converted {} data rows to {}",
                    "✓".green(),
                    data_rows,
                    csv.display().to_string().dimmed()
                ));
            }
            RunEvent::Launched { program, log, .. } => {
                self.line(format!(
                    "  {} Started {} (output in {})",
                    "✓".green(),
                    program.display(),
                    log.display().to_string().dimmed()
                ));
            }
            RunEvent::Progress {
                completed, total, ..
            } => self.show(*completed, *total),
            RunEvent::Warning { message } => {
                self.line(format!("  {} {}", "!".yellow().bold(), message.yellow()));
            }
            RunEvent::Finished { exit_code, success } => {
                if !success {
                    self.line(format!(
                        "  {} Runner exited with code {}",
                        "✗".red(),
                        exit_code
                    ));
                }
            }
        }
    }
}

/// Prints every event as one JSON object per line
pub struct JsonObserver;

impl RunObserver for JsonObserver {
    fn on_event(&mut self, event: &RunEvent) {
        match serde_json::to_string(event) {
            Ok(line) => println!("{line}"),
            Err(e) => tracing::warn!(error = %e, "Failed to serialize run event"),
        }
    }
}
