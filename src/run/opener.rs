//! Opening generated reports with the platform's default handler

use std::io;
use std::path::Path;
use std::process::{Command, Stdio};

/// Something that can show a finished report to the user
pub trait ReportOpener {
    fn open(&self, report: &Path) -> io::Result<()>;
}

/// Opens files through `open`, `cmd /C start` or `xdg-open`
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemOpener;

impl ReportOpener for SystemOpener {
    fn open(&self, report: &Path) -> io::Result<()> {
        tracing::debug!(report = %report.display(), "Opening report");

        let status = platform_command(report)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()?;

        if status.success() {
            Ok(())
        } else {
            Err(io::Error::other(format!("opener exited with {status}")))
        }
    }
}

#[cfg(target_os = "macos")]
fn platform_command(report: &Path) -> Command {
    let mut cmd = Command::new("open");
    cmd.arg(report);
    cmd
}

#[cfg(windows)]
fn platform_command(report: &Path) -> Command {
    // The empty string is the window title `start` expects first
    let mut cmd = Command::new("cmd");
    cmd.args(["/C", "start", ""]).arg(report);
    cmd
}

#[cfg(not(any(target_os = "macos", windows)))]
fn platform_command(report: &Path) -> Command {
    let mut cmd = Command::new("xdg-open");
    cmd.arg(report);
    cmd
}
