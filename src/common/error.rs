//! Error types for the collection runner
//!
//! Messages are meant to be shown to the user as-is, so they name the file
//! or setting involved and, where it helps, what to do about it.

use std::io;
use std::path::Path;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the collection runner
#[derive(Error, Debug)]
pub enum Error {
    // === Run pipeline errors ===
    #[error("Cannot read spreadsheet '{path}': {reason}")]
    FileFormat { path: String, reason: String },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Failed to launch '{program}': {reason}")]
    Launch { program: String, reason: String },

    #[error("Runner exited with code {code}:\n{log}")]
    RunFailure { code: i32, log: String },

    #[error("Could not open report file '{path}': {reason}")]
    ReportOpen { path: String, reason: String },

    // === State machine errors ===
    #[error("Cannot {action} while run is {state}")]
    InvalidState { action: String, state: String },

    // === Configuration file errors ===
    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    #[error("Failed to write configuration file: {0}")]
    ConfigWrite(String),

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Serialization Errors ===
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a spreadsheet format error for a source file
    pub fn file_format(path: &Path, reason: impl ToString) -> Self {
        Self::FileFormat {
            path: path.display().to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create a launch error for the runner program
    pub fn launch(program: &str, reason: impl ToString) -> Self {
        Self::Launch {
            program: program.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create a report open error
    pub fn report_open(path: &Path, reason: impl ToString) -> Self {
        Self::ReportOpen {
            path: path.display().to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create an invalid state error
    pub fn invalid_state(action: &str, state: &str) -> Self {
        Self::InvalidState {
            action: action.to_string(),
            state: state.to_string(),
        }
    }

    /// Create a file read error
    pub fn file_read(path: &Path, error: impl ToString) -> Self {
        Self::FileRead {
            path: path.display().to_string(),
            error: error.to_string(),
        }
    }

    /// Short machine-readable code, used in JSON output
    pub fn code(&self) -> &'static str {
        match self {
            Error::FileFormat { .. } => "FILE_FORMAT",
            Error::Configuration(_) => "CONFIGURATION",
            Error::Launch { .. } => "LAUNCH",
            Error::RunFailure { .. } => "RUN_FAILURE",
            Error::ReportOpen { .. } => "REPORT_OPEN",
            Error::InvalidState { .. } => "INVALID_STATE",
            Error::ConfigParse(_) | Error::ConfigWrite(_) => "CONFIG_FILE",
            _ => "INTERNAL_ERROR",
        }
    }
}
