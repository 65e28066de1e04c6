//! Repository and data file discovery

use std::path::{Path, PathBuf};

use crate::common::{Error, Result};

/// Extension of the data files offered for a run
const DATA_EXTENSION: &str = "xlsx";

/// Names of repository checkouts under `root`, filtered by `search`
///
/// The folder is created when missing so a fresh install lists nothing
/// instead of failing.
pub fn list_repositories(root: &Path, search: Option<&str>) -> Result<Vec<String>> {
    std::fs::create_dir_all(root)?;

    let mut names: Vec<String> = std::fs::read_dir(root)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
        .filter(|name| matches_search(name, search))
        .collect();
    names.sort();
    Ok(names)
}

/// Spreadsheets inside `repo`, relative to it, filtered by `search`
pub fn list_spreadsheets(repo: &Path, search: Option<&str>) -> Result<Vec<PathBuf>> {
    if !repo.is_dir() {
        return Err(Error::Configuration(format!(
            "Repository '{}' does not exist",
            repo.display()
        )));
    }

    let mut found = Vec::new();
    collect_spreadsheets(repo, repo, &mut found)?;

    let mut files: Vec<PathBuf> = found
        .into_iter()
        .filter(|path| matches_search(&path.to_string_lossy(), search))
        .collect();
    files.sort();
    Ok(files)
}

fn collect_spreadsheets(root: &Path, dir: &Path, found: &mut Vec<PathBuf>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();

        if path.is_dir() {
            if entry.file_name() == ".git" {
                continue;
            }
            collect_spreadsheets(root, &path, found)?;
        } else if is_data_file(&path) {
            if let Ok(relative) = path.strip_prefix(root) {
                found.push(relative.to_path_buf());
            }
        }
    }
    Ok(())
}

fn is_data_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(DATA_EXTENSION))
        .unwrap_or(false)
}

fn matches_search(candidate: &str, search: Option<&str>) -> bool {
    match search {
        Some(s) if !s.is_empty() => candidate.to_lowercase().contains(&s.to_lowercase()),
        _ => true,
    }
}
