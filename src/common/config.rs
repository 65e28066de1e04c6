//! Configuration file handling
//!
//! A single TOML file holds folder overrides, runner settings and a small
//! amount of history written back after each run.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::paths::{self, config_path};
use super::{Error, Result};

/// Main configuration structure
#[derive(Debug, Deserialize, Serialize, Default, Clone)]
pub struct Config {
    /// General settings
    #[serde(default)]
    pub defaults: Defaults,

    /// Folder layout
    #[serde(default)]
    pub paths: PathsConfig,

    /// External runner settings
    #[serde(default)]
    pub runner: RunnerConfig,

    /// Written back after each run
    #[serde(default)]
    pub history: History,
}

/// General settings
#[derive(Debug, Deserialize, Serialize, Default, Clone)]
pub struct Defaults {
    /// When the local checkout of the tool was last updated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update: Option<String>,
}

/// Folder layout, relative entries resolve against the working directory
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PathsConfig {
    /// Folder holding one checkout per test repository
    #[serde(default = "default_repositories")]
    pub repositories: PathBuf,

    /// Folder scanned for the collection and environment files
    #[serde(default = "default_collections")]
    pub collections: PathBuf,

    /// Where converted iteration data is written
    #[serde(default = "default_csv")]
    pub csv: PathBuf,

    /// Where HTML reports are exported
    #[serde(default = "default_reports")]
    pub reports: PathBuf,

    /// Where runner output is captured
    #[serde(default = "default_logs")]
    pub logs: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            repositories: default_repositories(),
            collections: default_collections(),
            csv: default_csv(),
            reports: default_reports(),
            logs: default_logs(),
        }
    }
}

fn default_repositories() -> PathBuf {
    PathBuf::from("repositories")
}
fn default_collections() -> PathBuf {
    PathBuf::from(".")
}
fn default_csv() -> PathBuf {
    PathBuf::from("csv")
}
fn default_reports() -> PathBuf {
    PathBuf::from("html_reports")
}
fn default_logs() -> PathBuf {
    PathBuf::from("log")
}

impl PathsConfig {
    /// Resolve every folder against `base`
    pub fn resolve(&self, base: &Path) -> Layout {
        Layout {
            repositories: paths::resolve(base, &self.repositories),
            collections: paths::resolve(base, &self.collections),
            csv: paths::resolve(base, &self.csv),
            reports: paths::resolve(base, &self.reports),
            logs: paths::resolve(base, &self.logs),
        }
    }
}

/// Folder layout with every entry resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub repositories: PathBuf,
    pub collections: PathBuf,
    pub csv: PathBuf,
    pub reports: PathBuf,
    pub logs: PathBuf,
}

/// External runner settings
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RunnerConfig {
    /// Runner executable, a name looked up on PATH or a path
    #[serde(default = "default_program")]
    pub program: String,

    /// Arguments placed before `run`, e.g. `["newman"]` with `program = "npx"`
    #[serde(default)]
    pub args: Vec<String>,

    /// HTML reporter name passed to `--reporters`
    #[serde(default = "default_reporter")]
    pub reporter: String,

    /// Value for `--timeout-script`, in milliseconds
    #[serde(default = "default_timeout_script")]
    pub timeout_script_ms: u64,

    /// Pass `--insecure` (skip TLS verification)
    #[serde(default = "default_true")]
    pub insecure: bool,

    /// Delay between progress polls
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Case-insensitive substring marking one iteration in the runner output
    #[serde(default = "default_iteration_marker")]
    pub iteration_marker: String,

    /// Exit codes treated as a completed run
    ///
    /// newman exits 1 when assertions fail but the run itself finished and
    /// the report was exported, so both 0 and 1 count by default.
    #[serde(default = "default_success_exit_codes")]
    pub success_exit_codes: Vec<i32>,

    /// Open the HTML report after a successful run
    #[serde(default = "default_true")]
    pub open_report: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: Vec::new(),
            reporter: default_reporter(),
            timeout_script_ms: default_timeout_script(),
            insecure: true,
            poll_interval_ms: default_poll_interval(),
            iteration_marker: default_iteration_marker(),
            success_exit_codes: default_success_exit_codes(),
            open_report: true,
        }
    }
}

fn default_program() -> String {
    "newman".to_string()
}
fn default_reporter() -> String {
    "htmlextra".to_string()
}
fn default_timeout_script() -> u64 {
    9_999_999
}
fn default_true() -> bool {
    true
}
fn default_poll_interval() -> u64 {
    500
}
fn default_iteration_marker() -> String {
    "iteration ".to_string()
}
fn default_success_exit_codes() -> Vec<i32> {
    vec![0, 1]
}

impl RunnerConfig {
    /// Locate the runner executable
    ///
    /// Names are searched on PATH, paths are checked directly.
    pub fn resolve_program(&self) -> Result<PathBuf> {
        which::which(&self.program).map_err(|e| Error::launch(&self.program, e))
    }

    /// Whether an exit code counts as a completed run
    pub fn is_success(&self, code: i32) -> bool {
        self.success_exit_codes.contains(&code)
    }
}

/// Run history
#[derive(Debug, Deserialize, Serialize, Default, Clone)]
pub struct History {
    /// Timestamp of the last finished run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run: Option<String>,

    /// Report produced by the last successful run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_report: Option<PathBuf>,
}

impl Config {
    /// Config file location: the override if given, else the platform default
    pub fn location(explicit: Option<&Path>) -> Option<PathBuf> {
        explicit.map(Path::to_path_buf).or_else(config_path)
    }

    /// Load configuration from `explicit` or the default config file
    ///
    /// Returns default configuration if the file doesn't exist
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match Self::location(explicit) {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load configuration from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::file_read(path, e))?;
        toml::from_str(&content).map_err(|e| Error::ConfigParse(e.to_string()))
    }

    /// Write configuration to a specific file, creating its folder
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| Error::ConfigWrite(e.to_string()))?;
        paths::ensure_parent(path)?;
        std::fs::write(path, content).map_err(|e| Error::ConfigWrite(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_classic_layout() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.paths.csv, PathBuf::from("csv"));
        assert_eq!(config.paths.reports, PathBuf::from("html_reports"));
        assert_eq!(config.paths.logs, PathBuf::from("log"));
        assert_eq!(config.runner.program, "newman");
        assert_eq!(config.runner.poll_interval_ms, 500);
        assert!(config.runner.insecure);
        assert!(config.defaults.last_update.is_none());
    }

    #[test]
    fn test_partial_sections_keep_other_defaults() {
        let config: Config = toml::from_str(
            r#"
            [defaults]
            last_update = "2024-05-02 10:11:12"

            [paths]
            reports = "/srv/reports"

            [runner]
            success_exit_codes = [0]
            "#,
        )
        .unwrap();

        assert_eq!(config.defaults.last_update.as_deref(), Some("2024-05-02 10:11:12"));
        assert_eq!(config.paths.reports, PathBuf::from("/srv/reports"));
        assert_eq!(config.paths.csv, PathBuf::from("csv"));
        assert!(config.runner.is_success(0));
        assert!(!config.runner.is_success(1));
        assert_eq!(config.runner.reporter, "htmlextra");
    }

    #[test]
    fn test_default_policy_accepts_assertion_failures() {
        let runner = RunnerConfig::default();
        assert!(runner.is_success(0));
        assert!(runner.is_success(1));
        assert!(!runner.is_success(2));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.history.last_run = Some("2024-01-01 00:00:00".to_string());
        config.history.last_report = Some(PathBuf::from("html_reports/x.html"));
        config.save_to(&path).unwrap();

        let loaded = Config::load(Some(&path)).unwrap();
        assert_eq!(loaded.history.last_run, config.history.last_run);
        assert_eq!(loaded.history.last_report, config.history.last_report);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(config.runner.iteration_marker, "iteration ");
    }

    #[test]
    fn test_invalid_file_is_config_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[runner\nprogram = ").unwrap();
        assert!(matches!(Config::load(Some(&path)), Err(Error::ConfigParse(_))));
    }

    #[test]
    fn test_layout_resolves_relative_folders() {
        let base = Path::new("/work");
        let layout = PathsConfig::default().resolve(base);
        assert_eq!(layout.csv, base.join("csv"));
        assert_eq!(layout.collections, base.join("."));
    }

    #[test]
    fn test_unknown_program_is_launch_error() {
        let runner = RunnerConfig {
            program: "definitely-not-a-real-runner-binary".to_string(),
            ..RunnerConfig::default()
        };
        assert!(matches!(runner.resolve_program(), Err(Error::Launch { .. })));
    }
}
