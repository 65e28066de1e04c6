//! Collection Runner - run API test collections against spreadsheet data
//!
//! This library converts spreadsheets to iteration CSV files, drives the
//! newman runner over them and tracks progress from its output.

pub mod cli;
pub mod commands;
pub mod common;
pub mod convert;
pub mod run;
pub mod workspace;

// Re-export commonly used types for tests
pub use common::{Error, Result};
pub use run::{RunContext, RunEvent, RunSession, RunState};
