//! Progress estimation
//!
//! The total comes from the converted CSV before launch. The completed count
//! is scraped from the runner's log: every line containing the iteration
//! marker counts as one finished iteration. The count can overshoot the
//! total when the marker shows up in unrelated output, and it is not clamped.

use std::fmt;
use std::io::{self, SeekFrom};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

/// Completed and total iteration counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub completed: u64,
    pub total: u64,
}

impl Progress {
    /// Start a run of `total` iterations; zero is raised to one
    pub fn new(total: u64) -> Self {
        Self {
            completed: 0,
            total: total.max(1),
        }
    }

    /// floor(completed / total * 100)
    pub fn percent(&self) -> u64 {
        self.completed * 100 / self.total
    }

    /// Mark every iteration as done
    pub fn complete(&mut self) {
        self.completed = self.total;
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}% ({}/{})", self.percent(), self.completed, self.total)
    }
}

/// Number of iterations in a converted CSV file
///
/// Records minus the header. Anything that prevents counting (missing file,
/// malformed CSV, header only) yields 1.
pub fn estimate_total(csv_path: &Path) -> u64 {
    match count_data_rows(csv_path) {
        Ok(rows) if rows >= 1 => rows,
        Ok(_) => 1,
        Err(e) => {
            tracing::warn!(csv = %csv_path.display(), error = %e, "Cannot count iterations, assuming 1");
            1
        }
    }
}

fn count_data_rows(path: &Path) -> csv::Result<u64> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;

    let mut rows = 0u64;
    for record in reader.records() {
        record?;
        rows += 1;
    }
    Ok(rows.saturating_sub(1))
}

/// Incremental reader counting iteration markers in a growing log
///
/// Each poll opens the file, reads what was appended since the last poll
/// and closes it again. Complete lines are counted once; the trailing
/// partial line is carried over and counted provisionally.
#[derive(Debug)]
pub struct LogTail {
    path: PathBuf,
    marker: String,
    offset: u64,
    partial: Vec<u8>,
    complete_hits: u64,
}

impl LogTail {
    pub fn new(path: impl Into<PathBuf>, marker: &str) -> Self {
        Self {
            path: path.into(),
            marker: marker.to_lowercase(),
            offset: 0,
            partial: Vec::new(),
            complete_hits: 0,
        }
    }

    /// Lines seen so far that contain the marker
    pub fn count(&self) -> u64 {
        let provisional = u64::from(line_has_marker(&self.partial, &self.marker));
        self.complete_hits + provisional
    }

    /// Read newly appended content and return the updated count
    ///
    /// A missing file leaves the count unchanged. A file that shrank was
    /// replaced, so counting restarts from its beginning.
    pub async fn poll(&mut self) -> io::Result<u64> {
        let mut file = match tokio::fs::File::open(&self.path).await {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(self.count()),
            Err(e) => return Err(e),
        };

        let len = file.metadata().await?.len();
        if len < self.offset {
            tracing::debug!(log = %self.path.display(), "Log shrank, restarting count");
            self.reset();
        }
        if len == self.offset {
            return Ok(self.count());
        }

        file.seek(SeekFrom::Start(self.offset)).await?;
        let mut appended = Vec::with_capacity((len - self.offset) as usize);
        file.read_to_end(&mut appended).await?;
        self.offset += appended.len() as u64;

        self.consume(&appended);
        Ok(self.count())
    }

    fn consume(&mut self, appended: &[u8]) {
        self.partial.extend_from_slice(appended);

        let Some(last_newline) = self.partial.iter().rposition(|&b| b == b'\n') else {
            return;
        };

        let hits = self.partial[..last_newline]
            .split(|&b| b == b'\n')
            .filter(|line| line_has_marker(line, &self.marker))
            .count() as u64;
        self.complete_hits += hits;
        self.partial.drain(..=last_newline);
    }

    fn reset(&mut self) {
        self.offset = 0;
        self.partial.clear();
        self.complete_hits = 0;
    }
}

fn line_has_marker(line: &[u8], marker: &str) -> bool {
    !line.is_empty() && String::from_utf8_lossy(line).to_lowercase().contains(marker)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    /// Marker lines in a complete log, read in one go
    fn count_markers(content: &str, marker: &str) -> u64 {
        let marker = marker.to_lowercase();
        content
            .lines()
            .filter(|line| line.to_lowercase().contains(&marker))
            .count() as u64
    }

    fn append(path: &Path, text: &str) {
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .unwrap();
        file.write_all(text.as_bytes()).unwrap();
    }

    #[test]
    fn test_percent_is_floored() {
        let mut progress = Progress::new(3);
        progress.completed = 1;
        assert_eq!(progress.percent(), 33);
        progress.completed = 2;
        assert_eq!(progress.percent(), 66);
        progress.complete();
        assert_eq!(progress.percent(), 100);
        assert_eq!(progress.to_string(), "100% (3/3)");
    }

    #[test]
    fn test_overshoot_is_not_clamped() {
        let mut progress = Progress::new(2);
        progress.completed = 3;
        assert_eq!(progress.percent(), 150);
    }

    #[test]
    fn test_zero_total_never_divides_by_zero() {
        let mut progress = Progress::new(0);
        assert_eq!(progress.total, 1);
        progress.completed = 7;
        assert_eq!(progress.percent(), 700);
    }

    #[test]
    fn test_estimate_counts_rows_minus_header() {
        let dir = tempfile::tempdir().unwrap();
        let csv = dir.path().join("data.csv");
        std::fs::write(&csv, "a,b\r\n1,2\r\n3,4\r\n5,6\r\n7,8\r\n9,10\r\n").unwrap();
        assert_eq!(estimate_total(&csv), 5);
    }

    #[test]
    fn test_estimate_defaults_to_one() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(estimate_total(&dir.path().join("missing.csv")), 1);

        let header_only = dir.path().join("header.csv");
        std::fs::write(&header_only, "a,b\r\n").unwrap();
        assert_eq!(estimate_total(&header_only), 1);

        let empty = dir.path().join("empty.csv");
        std::fs::write(&empty, "").unwrap();
        assert_eq!(estimate_total(&empty), 1);
    }

    #[test]
    fn test_count_markers_ignores_case() {
        let log = "newman\n\nIteration 1/3\n→ GET /a\nITERATION 2/3\nno marker\niteration 3/3";
        assert_eq!(count_markers(log, "iteration "), 3);
    }

    #[tokio::test]
    async fn test_percentage_sequence_over_polls() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("run.txt");
        let mut tail = LogTail::new(&log, "iteration ");
        let mut progress = Progress::new(5);

        let mut seen = Vec::new();
        progress.completed = tail.poll().await.unwrap();
        seen.push(progress.percent());
        for i in 1..=5 {
            append(&log, &format!("Iteration {i}/5\n  ✓ Status code is 200\n"));
            progress.completed = tail.poll().await.unwrap();
            seen.push(progress.percent());
        }

        assert_eq!(seen, vec![0, 20, 40, 60, 80, 100]);
    }

    #[tokio::test]
    async fn test_partial_lines_are_counted_once() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("run.txt");
        let mut tail = LogTail::new(&log, "iteration ");

        append(&log, "Itera");
        assert_eq!(tail.poll().await.unwrap(), 0);
        append(&log, "tion 1/2");
        assert_eq!(tail.poll().await.unwrap(), 1);
        append(&log, "\nsome output\nIteration 2");
        assert_eq!(tail.poll().await.unwrap(), 2);
        append(&log, "/2\n");
        assert_eq!(tail.poll().await.unwrap(), 2);
        assert_eq!(tail.poll().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_incremental_count_matches_full_read() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("run.txt");
        let mut tail = LogTail::new(&log, "Iteration ");

        let chunks = ["┌\n│ iteration 1\n", "Iteration 2 of", " 4\r\nx\n", "ITERATION 3\n", "iteration 4"];
        for chunk in chunks {
            append(&log, chunk);
            tail.poll().await.unwrap();
        }

        let full = std::fs::read_to_string(&log).unwrap();
        assert_eq!(tail.count(), count_markers(&full, "iteration "));
        assert_eq!(tail.count(), 4);
    }

    #[tokio::test]
    async fn test_truncated_log_restarts_count() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("run.txt");
        let mut tail = LogTail::new(&log, "iteration ");

        append(&log, "iteration 1\niteration 2\niteration 3\n");
        assert_eq!(tail.poll().await.unwrap(), 3);

        std::fs::write(&log, "iteration 1\n").unwrap();
        assert_eq!(tail.poll().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_missing_log_keeps_count() {
        let dir = tempfile::tempdir().unwrap();
        let mut tail = LogTail::new(dir.path().join("absent.txt"), "iteration ");
        assert_eq!(tail.poll().await.unwrap(), 0);
    }
}
