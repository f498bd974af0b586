//! Run reporting: per-test outcomes with step logs, rendered to a
//! self-contained HTML page.

use crate::result::{ManejarError, ManejarResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, SystemTime};
use tracing::info;

/// Final status of one test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TestStatus {
    /// Test completed without error
    Passed,
    /// Test surfaced an error
    Failed,
    /// Test did not run
    Skipped,
}

impl TestStatus {
    /// Lowercase status name, also used as a CSS class
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }
}

/// Severity of one step-log line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepLevel {
    /// Neutral progress note
    Info,
    /// An assertion that held
    Pass,
    /// An assertion or action that failed
    Fail,
}

impl StepLevel {
    /// Lowercase level name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Pass => "pass",
            Self::Fail => "fail",
        }
    }
}

/// One timestamped step-log line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepEntry {
    /// Step severity
    pub level: StepLevel,
    /// Step message
    pub message: String,
    /// When the step was recorded
    pub at: SystemTime,
}

/// Outcome of one test, accumulated step by step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestEntry {
    /// Test name
    pub name: String,
    /// Final status
    pub status: TestStatus,
    /// Wall-clock duration
    pub duration: Duration,
    /// Error message for failed tests
    pub error: Option<String>,
    /// Screenshot captured at failure, if any
    pub screenshot: Option<PathBuf>,
    /// Step log, in order
    pub steps: Vec<StepEntry>,
}

impl TestEntry {
    /// Start an entry for a named test; status defaults to skipped until a
    /// terminal call decides it
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: TestStatus::Skipped,
            duration: Duration::ZERO,
            error: None,
            screenshot: None,
            steps: Vec::new(),
        }
    }

    /// Append a step-log line
    pub fn step(&mut self, level: StepLevel, message: impl Into<String>) {
        self.steps.push(StepEntry {
            level,
            message: message.into(),
            at: SystemTime::now(),
        });
    }

    /// Mark the test passed
    #[must_use]
    pub fn passed(mut self, duration: Duration) -> Self {
        self.status = TestStatus::Passed;
        self.duration = duration;
        self
    }

    /// Mark the test failed with the surfaced error
    #[must_use]
    pub fn failed(mut self, duration: Duration, error: impl Into<String>) -> Self {
        self.status = TestStatus::Failed;
        self.duration = duration;
        self.error = Some(error.into());
        self
    }

    /// Attach the failure screenshot path
    #[must_use]
    pub fn with_screenshot(mut self, path: impl Into<PathBuf>) -> Self {
        self.screenshot = Some(path.into());
        self
    }
}

/// Aggregate counts over a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    /// Total recorded tests
    pub total: usize,
    /// Tests that passed
    pub passed: usize,
    /// Tests that failed
    pub failed: usize,
    /// Tests that were skipped
    pub skipped: usize,
}

/// Accumulates test entries for one run and renders them as HTML
///
/// Shared across contexts; recording locks only briefly.
#[derive(Debug)]
pub struct RunReport {
    title: String,
    started: SystemTime,
    entries: Mutex<Vec<TestEntry>>,
}

impl RunReport {
    /// Create an empty report
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            started: SystemTime::now(),
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Record one finished test
    pub fn record(&self, entry: TestEntry) {
        info!(test = %entry.name, status = entry.status.as_str(), "test recorded");
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(entry);
    }

    /// Snapshot of all recorded entries, in recording order
    #[must_use]
    pub fn entries(&self) -> Vec<TestEntry> {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Aggregate counts over the recorded entries
    #[must_use]
    pub fn summary(&self) -> ReportSummary {
        let entries = self.entries();
        ReportSummary {
            total: entries.len(),
            passed: entries
                .iter()
                .filter(|e| e.status == TestStatus::Passed)
                .count(),
            failed: entries
                .iter()
                .filter(|e| e.status == TestStatus::Failed)
                .count(),
            skipped: entries
                .iter()
                .filter(|e| e.status == TestStatus::Skipped)
                .count(),
        }
    }

    /// Render the report as a self-contained HTML page
    #[must_use]
    pub fn to_html(&self) -> String {
        let summary = self.summary();
        let started: chrono::DateTime<chrono::Local> = self.started.into();
        let mut html = String::new();
        html.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
        html.push_str(&format!("<title>{}</title>\n", escape(&self.title)));
        html.push_str(
            "<style>\n\
             body { font-family: sans-serif; margin: 2em; }\n\
             .passed { color: #2e7d32; }\n\
             .failed { color: #c62828; }\n\
             .skipped { color: #757575; }\n\
             table { border-collapse: collapse; }\n\
             td, th { border: 1px solid #ccc; padding: 4px 10px; text-align: left; }\n\
             ul.steps { margin: 0.3em 0; font-size: 0.9em; }\n\
             </style>\n</head>\n<body>\n",
        );
        html.push_str(&format!("<h1>{}</h1>\n", escape(&self.title)));
        html.push_str(&format!(
            "<p>Started {} &mdash; {} tests, <span class=\"passed\">{} passed</span>, \
             <span class=\"failed\">{} failed</span>, \
             <span class=\"skipped\">{} skipped</span></p>\n",
            started.format("%Y-%m-%d %H:%M:%S"),
            summary.total,
            summary.passed,
            summary.failed,
            summary.skipped,
        ));
        html.push_str("<table>\n<tr><th>Test</th><th>Status</th><th>Duration</th><th>Detail</th></tr>\n");
        for entry in self.entries() {
            html.push_str(&format!(
                "<tr><td>{}</td><td class=\"{status}\">{status}</td><td>{:.1}s</td><td>",
                escape(&entry.name),
                entry.duration.as_secs_f64(),
                status = entry.status.as_str(),
            ));
            if let Some(error) = &entry.error {
                html.push_str(&format!("<p>{}</p>", escape(error)));
            }
            if let Some(shot) = &entry.screenshot {
                html.push_str(&format!(
                    "<p><a href=\"{0}\">{0}</a></p>",
                    escape(&shot.display().to_string())
                ));
            }
            if !entry.steps.is_empty() {
                html.push_str("<ul class=\"steps\">");
                for step in &entry.steps {
                    html.push_str(&format!(
                        "<li class=\"{}\">{}</li>",
                        step.level.as_str(),
                        escape(&step.message)
                    ));
                }
                html.push_str("</ul>");
            }
            html.push_str("</td></tr>\n");
        }
        html.push_str("</table>\n</body>\n</html>\n");
        html
    }

    /// Render and write the report to `path`
    ///
    /// # Errors
    ///
    /// Returns [`ManejarError::Report`] when the write fails.
    pub async fn flush(&self, path: impl AsRef<Path>) -> ManejarResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| ManejarError::Report {
                        message: format!("cannot create '{}': {e}", parent.display()),
                    })?;
            }
        }
        tokio::fs::write(path, self.to_html())
            .await
            .map_err(|e| ManejarError::Report {
                message: format!("cannot write '{}': {e}", path.display()),
            })?;
        info!(path = %path.display(), "report flushed");
        Ok(())
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn sample() -> RunReport {
        let report = RunReport::new("Nightly regression");
        report.record(TestEntry::new("login_ok").passed(Duration::from_millis(2300)));
        let mut failing = TestEntry::new("login_bad_password");
        failing.step(StepLevel::Info, "typed credentials");
        failing.step(StepLevel::Fail, "expected error banner");
        report.record(
            failing
                .failed(Duration::from_millis(5100), "Element '#banner' not visible after 5000ms")
                .with_screenshot("screenshots/login_bad_password_20260825_101500.png"),
        );
        report
    }

    mod summary_tests {
        use super::*;

        #[test]
        fn test_summary_counts() {
            let report = sample();
            let summary = report.summary();
            assert_eq!(summary.total, 2);
            assert_eq!(summary.passed, 1);
            assert_eq!(summary.failed, 1);
            assert_eq!(summary.skipped, 0);
        }

        #[test]
        fn test_empty_report() {
            let report = RunReport::new("empty");
            assert_eq!(report.summary().total, 0);
            assert!(report.entries().is_empty());
        }
    }

    mod html_tests {
        use super::*;

        #[test]
        fn test_html_carries_outcomes() {
            let html = sample().to_html();
            assert!(html.contains("Nightly regression"));
            assert!(html.contains("login_ok"));
            assert!(html.contains("login_bad_password"));
            assert!(html.contains("expected error banner"));
            assert!(html.contains("login_bad_password_20260825_101500.png"));
        }

        #[test]
        fn test_html_escapes_markup() {
            let report = RunReport::new("suite");
            report.record(
                TestEntry::new("xss<script>")
                    .failed(Duration::ZERO, "value was '<empty>' & wrong"),
            );
            let html = report.to_html();
            assert!(!html.contains("<script>"));
            assert!(html.contains("xss&lt;script&gt;"));
            assert!(html.contains("&lt;empty&gt;"));
        }
    }

    mod flush_tests {
        use super::*;

        #[tokio::test]
        async fn test_flush_writes_html() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("reports").join("run.html");

            sample().flush(&path).await.unwrap();

            let contents = std::fs::read_to_string(&path).unwrap();
            assert!(contents.starts_with("<!DOCTYPE html>"));
            assert!(contents.contains("login_ok"));
        }
    }
}
