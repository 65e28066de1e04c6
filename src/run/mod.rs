//! Collection runs
//!
//! Everything between "the user picked a spreadsheet" and "the report is
//! open": resolving file locations, launching the runner, following its log
//! to estimate progress and handling the outcome.

pub mod descriptor;
pub mod opener;
pub mod progress;
pub mod session;

pub use descriptor::{find_collection, RunContext, RunDescriptor};
pub use opener::{ReportOpener, SystemOpener};
pub use progress::{estimate_total, LogTail, Progress};
pub use session::{RunEvent, RunObserver, RunSession, RunState, RunSummary};
