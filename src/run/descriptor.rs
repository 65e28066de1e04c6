//! Run context and run descriptor
//!
//! A [`RunContext`] says what the user picked, a [`RunDescriptor`] says where
//! every file of one run lives and how the runner is invoked.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::common::config::{Layout, RunnerConfig};
use crate::common::{Error, Result};

/// File name suffix identifying a collection export
pub const COLLECTION_SUFFIX: &str = ".postman_collection.json";

/// File name suffix of the environment paired with a collection
pub const ENVIRONMENT_SUFFIX: &str = ".postman_environment.json";

/// Suffix of the captured runner output
pub const LOG_SUFFIX: &str = ".txt";

/// Format of the report timestamp token
const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// The repository and data file a run targets
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunContext {
    /// Root of the repository checkout
    pub repository: PathBuf,
    /// Spreadsheet path, relative to the repository root
    pub data_file: PathBuf,
}

impl RunContext {
    pub fn new(repository: impl Into<PathBuf>, data_file: impl Into<PathBuf>) -> Self {
        Self {
            repository: repository.into(),
            data_file: data_file.into(),
        }
    }

    /// Absolute location of the selected spreadsheet
    pub fn source(&self) -> PathBuf {
        self.repository.join(&self.data_file)
    }

    /// Base name of the data file without its extension
    pub fn data_stem(&self) -> String {
        self.data_file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "data".to_string())
    }
}

/// Every path needed for one runner invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunDescriptor {
    /// Collection base name, without suffix
    pub collection_name: String,
    pub collection: PathBuf,
    pub environment: PathBuf,
    /// Converted iteration data
    pub csv: PathBuf,
    /// HTML report target
    pub report: PathBuf,
    /// Combined stdout/stderr of the runner
    pub log: PathBuf,
    /// Seconds-resolution token embedded in the report name
    pub timestamp: String,
}

impl RunDescriptor {
    /// Build a descriptor stamped with the current local time
    pub fn build(context: &RunContext, layout: &Layout) -> Result<Self> {
        let timestamp = chrono::Local::now().format(TIMESTAMP_FORMAT).to_string();
        Self::build_with_timestamp(context, layout, &timestamp)
    }

    /// Build a descriptor with an explicit timestamp token
    pub fn build_with_timestamp(
        context: &RunContext,
        layout: &Layout,
        timestamp: &str,
    ) -> Result<Self> {
        let collection = find_collection(&layout.collections)?;
        let collection_name = collection
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_suffix(COLLECTION_SUFFIX))
            .unwrap_or_default()
            .to_string();

        let environment = layout
            .collections
            .join(format!("{collection_name}{ENVIRONMENT_SUFFIX}"));

        Ok(Self {
            csv: layout.csv.join(format!("{}.csv", context.data_stem())),
            report: layout
                .reports
                .join(format!("{collection_name}-{timestamp}.html")),
            log: layout.logs.join(format!("{}{LOG_SUFFIX}", context.data_stem())),
            collection,
            environment,
            collection_name,
            timestamp: timestamp.to_string(),
        })
    }

    /// Runner arguments, after any configured prefix arguments
    pub fn args(&self, runner: &RunnerConfig) -> Vec<OsString> {
        let reporter = &runner.reporter;
        let mut args: Vec<OsString> = runner.args.iter().map(OsString::from).collect();

        args.push("run".into());
        args.push(self.collection.clone().into());
        args.push("-e".into());
        args.push(self.environment.clone().into());
        args.push(format!("--timeout-script={}", runner.timeout_script_ms).into());
        args.push(flag_with_path("--iteration-data=", &self.csv));
        if runner.insecure {
            args.push("--insecure".into());
        }
        args.push(format!("--reporters={reporter},cli").into());
        args.push(format!("--reporter-{reporter}-logs=true").into());
        args.push(flag_with_path(
            &format!("--reporter-{reporter}-export="),
            &self.report,
        ));
        args
    }
}

fn flag_with_path(flag: &str, path: &Path) -> OsString {
    let mut arg = OsString::from(flag);
    arg.push(path.as_os_str());
    arg
}

/// Find the collection export in `dir`
///
/// Several matches resolve to the first in name order.
pub fn find_collection(dir: &Path) -> Result<PathBuf> {
    let entries = std::fs::read_dir(dir).map_err(|e| {
        Error::Configuration(format!(
            "Cannot scan '{}' for a collection: {}",
            dir.display(),
            e
        ))
    })?;

    let mut found: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| n.ends_with(COLLECTION_SUFFIX))
                    .unwrap_or(false)
        })
        .collect();
    found.sort();

    if found.len() > 1 {
        tracing::warn!(
            dir = %dir.display(),
            count = found.len(),
            "Several collection files found, using the first"
        );
    }

    found.into_iter().next().ok_or_else(|| {
        Error::Configuration(format!(
            "No collection file (*{}) found in '{}'",
            COLLECTION_SUFFIX,
            dir.display()
        ))
    })
}
