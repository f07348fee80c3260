use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::error::Result;
use crate::pipeline::RunReport;

/// Run history: one JSON line per finished run, oldest first.
pub struct RunLog {
    path: PathBuf,
}

impl RunLog {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, report: &RunReport) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let line = serde_json::to_string(report)?;
        writeln!(file, "{}", line)?;
        Ok(())
    }

    /// The last `limit` runs, oldest first. Unreadable lines are skipped.
    pub fn recent(&self, limit: usize) -> Result<Vec<RunReport>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let reader = BufReader::new(File::open(&self.path)?);
        let mut reports = Vec::new();
        for (lineno, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<RunReport>(&line) {
                Ok(report) => reports.push(report),
                Err(e) => warn!("Skipping run log line {}: {}", lineno + 1, e),
            }
        }
        let skip = reports.len().saturating_sub(limit);
        Ok(reports.split_off(skip))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RunState;
    use chrono::NaiveDate;

    fn report(sec: u32, state: RunState) -> RunReport {
        let captured_at = NaiveDate::from_ymd_opt(2023, 7, 18)
            .unwrap()
            .and_hms_opt(23, 0, sec)
            .unwrap();
        let mut report = RunReport::new(captured_at);
        report.state = state;
        report
    }

    #[test]
    fn test_append_and_read_recent() {
        let dir = tempfile::tempdir().unwrap();
        let log = RunLog::new(dir.path().join("runs").join("runs.ndjson"));
        assert!(log.recent(5).unwrap().is_empty());

        log.append(&report(1, RunState::Loaded)).unwrap();
        log.append(&report(2, RunState::Failed)).unwrap();
        log.append(&report(3, RunState::Loaded)).unwrap();

        let all = log.recent(10).unwrap();
        assert_eq!(all.len(), 3);
        let last_two = log.recent(2).unwrap();
        assert_eq!(last_two[0].state, RunState::Failed);
        assert_eq!(last_two[1].captured_at, all[2].captured_at);
    }

    #[test]
    fn test_garbage_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runs.ndjson");
        let log = RunLog::new(&path);
        log.append(&report(1, RunState::Loaded)).unwrap();
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "{{not json").unwrap();

        assert_eq!(log.recent(10).unwrap().len(), 1);
    }
}
