// src/engine/summary.rs

//! Collector for the events that go into the end-of-run summary block.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::{error, info};

use crate::types::StepName;

/// Delimiter printed before and after the summary block.
pub const SUMMARY_DELIMITER: &str = "------------";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SummaryKind {
    /// A leaf input file was not on disk.
    MissingFile,
    /// A command reported success but did not produce a declared output.
    MissingOutput,
    /// A command exited with an error (or the remote task failed).
    CommandFailed,
    /// The command template could not be rendered.
    TemplateError,
    /// The step never reported a status.
    NoStatus,
}

impl fmt::Display for SummaryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SummaryKind::MissingFile => write!(f, "missing file"),
            SummaryKind::MissingOutput => write!(f, "missing output"),
            SummaryKind::CommandFailed => write!(f, "command failed"),
            SummaryKind::TemplateError => write!(f, "template error"),
            SummaryKind::NoStatus => write!(f, "no status"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryEntry {
    pub kind: SummaryKind,
    pub step: StepName,
    pub path: Option<PathBuf>,
    pub detail: Option<String>,
}

/// Shared, append-only list of summary events for one run.
///
/// Cloning is cheap; all clones append to the same list.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    entries: Arc<Mutex<Vec<SummaryEntry>>>,
}

impl RunSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, entry: SummaryEntry) {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(entry);
    }

    pub fn missing_file(&self, step: &str, path: &Path) {
        self.record(SummaryEntry {
            kind: SummaryKind::MissingFile,
            step: step.to_string(),
            path: Some(path.to_path_buf()),
            detail: None,
        });
    }

    pub fn missing_output(&self, step: &str, path: &Path) {
        self.record(SummaryEntry {
            kind: SummaryKind::MissingOutput,
            step: step.to_string(),
            path: Some(path.to_path_buf()),
            detail: None,
        });
    }

    pub fn command_failed(&self, step: &str, detail: impl Into<String>) {
        self.record(SummaryEntry {
            kind: SummaryKind::CommandFailed,
            step: step.to_string(),
            path: None,
            detail: Some(detail.into()),
        });
    }

    pub fn template_error(&self, step: &str, detail: impl Into<String>) {
        self.record(SummaryEntry {
            kind: SummaryKind::TemplateError,
            step: step.to_string(),
            path: None,
            detail: Some(detail.into()),
        });
    }

    pub fn no_status(&self, step: &str) {
        self.record(SummaryEntry {
            kind: SummaryKind::NoStatus,
            step: step.to_string(),
            path: None,
            detail: None,
        });
    }

    /// Snapshot of everything recorded so far, in recording order.
    pub fn entries(&self) -> Vec<SummaryEntry> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn has_errors(&self) -> bool {
        !self.entries().is_empty()
    }

    pub fn count(&self, kind: SummaryKind) -> usize {
        self.entries().iter().filter(|e| e.kind == kind).count()
    }

    /// Log the delimited summary block, one event per entry.
    pub fn emit(&self) {
        info!("{SUMMARY_DELIMITER}");
        for entry in self.entries() {
            match (&entry.path, &entry.detail) {
                (Some(path), _) => {
                    error!(step = %entry.step, path = %path.display(), "{}", entry.kind)
                }
                (None, Some(detail)) => {
                    error!(step = %entry.step, error = %detail, "{}", entry.kind)
                }
                (None, None) => error!(step = %entry.step, "{}", entry.kind),
            }
        }
        info!("{SUMMARY_DELIMITER}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn json_summary_block_is_one_object_per_line() {
        let capture = Capture::default();
        let writer = capture.clone();
        let subscriber = tracing_subscriber::fmt()
            .json()
            .with_writer(move || writer.clone())
            .finish();

        let summary = RunSummary::new();
        summary.missing_file("leaf", Path::new("/data/a.txt"));
        summary.command_failed("mid", "exit 3");
        tracing::subscriber::with_default(subscriber, || summary.emit());

        let out = String::from_utf8(capture.0.lock().unwrap().clone()).unwrap();
        let lines: Vec<serde_json::Value> = out
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0]["fields"]["message"], SUMMARY_DELIMITER);
        assert_eq!(lines[1]["fields"]["message"], "missing file");
        assert_eq!(lines[2]["fields"]["step"], "mid");
        assert_eq!(lines[3]["fields"]["message"], SUMMARY_DELIMITER);
    }

    #[test]
    fn no_status_entries_are_counted() {
        let summary = RunSummary::new();
        summary.no_status("mid");
        assert!(summary.has_errors());
        assert_eq!(summary.count(SummaryKind::NoStatus), 1);
    }
}
