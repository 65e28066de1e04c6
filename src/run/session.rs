//! Run state machine
//!
//! A [`RunSession`] walks one run through
//! `Idle → Converting → Estimating → Running → Succeeded | Failed`.
//! Each step is an explicit method so a front end can drive the run itself,
//! or call [`RunSession::execute`] to do everything. Progress is published
//! as [`RunEvent`]s to a [`RunObserver`]; the session never renders anything.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use serde::Serialize;
use tokio::process::{Child, Command};

use super::descriptor::{RunContext, RunDescriptor};
use super::opener::ReportOpener;
use super::progress::{estimate_total, LogTail, Progress};
use crate::common::config::{Layout, RunnerConfig};
use crate::common::{paths, Error, Result};
use crate::convert;

/// Where a run currently is
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Converting,
    Estimating { total: u64 },
    Running { completed: u64, total: u64 },
    Succeeded { report: PathBuf },
    Failed { reason: String },
}

impl RunState {
    pub fn name(&self) -> &'static str {
        match self {
            RunState::Idle => "idle",
            RunState::Converting => "converting",
            RunState::Estimating { .. } => "estimating",
            RunState::Running { .. } => "running",
            RunState::Succeeded { .. } => "succeeded",
            RunState::Failed { .. } => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Succeeded { .. } | RunState::Failed { .. })
    }
}

/// Notifications published while a run progresses
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunEvent {
    State {
        state: RunState,
    },
    Converted {
        csv: PathBuf,
        data_rows: usize,
    },
    Launched {
        program: PathBuf,
        log: PathBuf,
        report: PathBuf,
    },
    Progress {
        completed: u64,
        total: u64,
        percent: u64,
    },
    Warning {
        message: String,
    },
    Finished {
        exit_code: i32,
        success: bool,
    },
}

impl RunEvent {
    fn progress(progress: Progress) -> Self {
        RunEvent::Progress {
            completed: progress.completed,
            total: progress.total,
            percent: progress.percent(),
        }
    }
}

/// Receives run events, e.g. to render a progress bar
pub trait RunObserver {
    fn on_event(&mut self, event: &RunEvent);
}

impl RunObserver for Vec<RunEvent> {
    fn on_event(&mut self, event: &RunEvent) {
        self.push(event.clone());
    }
}

/// Result of a run whose exit code matched the success policy
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub report: PathBuf,
    pub log: PathBuf,
    pub exit_code: i32,
    pub progress: Progress,
    /// Set when the report could not be opened; the run still succeeded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open_error: Option<String>,
}

/// One run of the external runner against one data file
pub struct RunSession {
    context: RunContext,
    layout: Layout,
    runner: RunnerConfig,
    state: RunState,
    descriptor: Option<RunDescriptor>,
    progress: Progress,
    tail: Option<LogTail>,
    child: Option<Child>,
    exit_code: Option<i32>,
}

impl RunSession {
    pub fn new(context: RunContext, layout: Layout, runner: RunnerConfig) -> Self {
        Self {
            context,
            layout,
            runner,
            state: RunState::Idle,
            descriptor: None,
            progress: Progress::new(1),
            tail: None,
            child: None,
            exit_code: None,
        }
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    /// Run every step, from conversion to the terminal state
    ///
    /// Any error leaves the session in `Failed`, with the child reaped.
    pub async fn execute(
        &mut self,
        opener: &dyn ReportOpener,
        observer: &mut dyn RunObserver,
    ) -> Result<RunSummary> {
        let result = self.drive(opener, observer).await;

        if let Err(e) = &result {
            self.reap().await;
            if !matches!(self.state, RunState::Failed { .. }) {
                self.transition(
                    RunState::Failed {
                        reason: e.to_string(),
                    },
                    observer,
                );
            }
        }

        result
    }

    async fn drive(
        &mut self,
        opener: &dyn ReportOpener,
        observer: &mut dyn RunObserver,
    ) -> Result<RunSummary> {
        self.convert(observer)?;
        self.estimate(observer)?;
        self.launch(observer)?;

        let interval = Duration::from_millis(self.runner.poll_interval_ms);
        while self.poll(observer).await?.is_none() {
            tokio::time::sleep(interval).await;
        }

        self.finish(opener, observer).await
    }

    /// Idle → Converting: resolve the descriptor and write the CSV
    pub fn convert(&mut self, observer: &mut dyn RunObserver) -> Result<()> {
        self.require("convert", matches!(self.state, RunState::Idle))?;
        self.transition(RunState::Converting, observer);

        let descriptor = RunDescriptor::build(&self.context, &self.layout)?;
        let conversion = convert::convert(&self.context.source(), &descriptor.csv)?;

        observer.on_event(&RunEvent::Converted {
            csv: conversion.output,
            data_rows: conversion.data_rows,
        });
        self.descriptor = Some(descriptor);
        Ok(())
    }

    /// Converting → Estimating: count the iterations in the CSV
    pub fn estimate(&mut self, observer: &mut dyn RunObserver) -> Result<u64> {
        self.require("estimate", matches!(self.state, RunState::Converting))?;
        let csv = self.current_descriptor("estimate")?.csv.clone();

        let total = estimate_total(&csv);
        self.progress = Progress::new(total);
        tracing::debug!(total, "Estimated iterations");

        self.transition(RunState::Estimating { total }, observer);
        Ok(total)
    }

    /// Estimating → Running: start the runner with output captured to the log
    pub fn launch(&mut self, observer: &mut dyn RunObserver) -> Result<()> {
        self.require("launch", matches!(self.state, RunState::Estimating { .. }))?;
        let descriptor = self.current_descriptor("launch")?.clone();

        let program = self.runner.resolve_program()?;
        let args = descriptor.args(&self.runner);

        paths::ensure_parent(&descriptor.log)?;
        paths::ensure_parent(&descriptor.report)?;
        let stdout = std::fs::File::create(&descriptor.log)?;
        let stderr = stdout.try_clone()?;

        tracing::info!(
            program = %program.display(),
            args = ?args,
            log = %descriptor.log.display(),
            "Launching runner"
        );

        let child = Command::new(&program)
            .args(&args)
            .current_dir(&self.layout.collections)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .spawn()
            .map_err(|e| Error::launch(&self.runner.program, e))?;

        self.child = Some(child);
        self.tail = Some(LogTail::new(&descriptor.log, &self.runner.iteration_marker));

        observer.on_event(&RunEvent::Launched {
            program,
            log: descriptor.log.clone(),
            report: descriptor.report.clone(),
        });
        self.transition(
            RunState::Running {
                completed: 0,
                total: self.progress.total,
            },
            observer,
        );
        observer.on_event(&RunEvent::progress(self.progress));
        Ok(())
    }

    /// One polling tick while Running
    ///
    /// Returns the exit code once the runner has exited. The log is read
    /// after the exit check so the last tick sees the final output.
    pub async fn poll(&mut self, observer: &mut dyn RunObserver) -> Result<Option<i32>> {
        self.require("poll", matches!(self.state, RunState::Running { .. }))?;

        if self.exit_code.is_none() {
            let child = self
                .child
                .as_mut()
                .ok_or_else(|| Error::invalid_state("poll", "running without a child process"))?;
            self.exit_code = child.try_wait()?.map(exit_code);
        }

        self.refresh_progress(observer).await;
        Ok(self.exit_code)
    }

    async fn refresh_progress(&mut self, observer: &mut dyn RunObserver) {
        let Some(tail) = self.tail.as_mut() else {
            return;
        };

        match tail.poll().await {
            Ok(completed) if completed != self.progress.completed => {
                self.progress.completed = completed;
                self.state = RunState::Running {
                    completed,
                    total: self.progress.total,
                };
                observer.on_event(&RunEvent::progress(self.progress));
            }
            Ok(_) => {}
            Err(e) => tracing::debug!(error = %e, "Cannot read runner log"),
        }
    }

    /// Running (exited) → Succeeded | Failed
    pub async fn finish(
        &mut self,
        opener: &dyn ReportOpener,
        observer: &mut dyn RunObserver,
    ) -> Result<RunSummary> {
        let code = match (&self.state, self.exit_code) {
            (RunState::Running { .. }, Some(code)) => code,
            _ => return Err(Error::invalid_state("finish", self.state.name())),
        };
        let descriptor = self.current_descriptor("finish")?.clone();
        self.child = None;

        let success = self.runner.is_success(code);
        observer.on_event(&RunEvent::Finished {
            exit_code: code,
            success,
        });

        if !success {
            let log = match tokio::fs::read(&descriptor.log).await {
                Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                Err(e) => format!("(runner log '{}' unavailable: {})", descriptor.log.display(), e),
            };
            tracing::debug!(code, log = %descriptor.log.display(), "Runner reported a failed run");
            self.transition(
                RunState::Failed {
                    reason: format!("runner exited with code {code}"),
                },
                observer,
            );
            return Err(Error::RunFailure { code, log });
        }

        self.progress.complete();
        observer.on_event(&RunEvent::progress(self.progress));

        let mut open_error = None;
        if self.runner.open_report {
            if let Err(e) = opener.open(&descriptor.report) {
                let err = Error::report_open(&descriptor.report, e);
                tracing::debug!(error = %err, "Report was generated but could not be opened");
                observer.on_event(&RunEvent::Warning {
                    message: err.to_string(),
                });
                open_error = Some(err.to_string());
            }
        }

        tracing::debug!(code, report = %descriptor.report.display(), "Run finished");
        self.transition(
            RunState::Succeeded {
                report: descriptor.report.clone(),
            },
            observer,
        );

        Ok(RunSummary {
            report: descriptor.report,
            log: descriptor.log,
            exit_code: code,
            progress: self.progress,
            open_error,
        })
    }

    async fn reap(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.wait().await {
                tracing::warn!(error = %e, "Failed to wait for runner process");
            }
        }
    }

    fn current_descriptor(&self, action: &str) -> Result<&RunDescriptor> {
        self.descriptor
            .as_ref()
            .ok_or_else(|| Error::invalid_state(action, self.state.name()))
    }

    fn require(&self, action: &str, allowed: bool) -> Result<()> {
        if allowed {
            Ok(())
        } else {
            Err(Error::invalid_state(action, self.state.name()))
        }
    }

    fn transition(&mut self, state: RunState, observer: &mut dyn RunObserver) {
        tracing::debug!(from = self.state.name(), to = state.name(), "Run state change");
        self.state = state.clone();
        observer.on_event(&RunEvent::State { state });
    }
}

/// Exit code, or -1 when the runner was killed by a signal
fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}
