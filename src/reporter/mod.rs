//! Test-runner reporter.
//!
//! Receives raw runner events for one run, buffers the normalized
//! results, and hands them to the [`LifecycleManager`] when the run ends.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::identity::NAME_SEPARATOR;
use crate::lifecycle::{BatchReport, LifecycleManager};
use crate::results::{TestResult, TestStatus};

/// A single test as reported by the runner.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTestResult {
    /// Test file path, possibly absolute.
    #[serde(default)]
    pub file_path: String,
    /// Enclosing `describe` blocks, outermost first.
    #[serde(default)]
    pub ancestor_titles: Vec<String>,
    /// The test's own title.
    pub title: String,
    /// Runner status (`passed`, `failed`, `pending`, `skipped`, ...).
    pub status: String,
    /// Failure messages, usually one with the stack appended.
    #[serde(default)]
    pub failure_messages: Vec<String>,
    /// Wall time in milliseconds.
    #[serde(default)]
    pub duration: Option<f64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AggregatedReport {
    test_results: Vec<FileResults>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileResults {
    name: String,
    #[serde(default)]
    assertion_results: Vec<RawTestResult>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ReportFormat {
    Aggregated(AggregatedReport),
    Flat(Vec<RawTestResult>),
}

/// Parses a results file into raw test results.
///
/// Accepts a Jest-style aggregated report or a flat array of results.
///
/// # Errors
///
/// Returns an error if `json` matches neither format.
pub fn parse_report(json: &str) -> Result<Vec<RawTestResult>, String> {
    let format: ReportFormat =
        serde_json::from_str(json).map_err(|e| format!("unrecognized results format: {e}"))?;
    Ok(match format {
        ReportFormat::Flat(results) => results,
        ReportFormat::Aggregated(report) => report
            .test_results
            .into_iter()
            .flat_map(|file| {
                let FileResults { name, assertion_results } = file;
                assertion_results.into_iter().map(move |raw| RawTestResult {
                    file_path: if raw.file_path.is_empty() { name.clone() } else { raw.file_path },
                    ..raw
                })
            })
            .collect(),
    })
}

/// Converts a raw result into a [`TestResult`].
///
/// Returns `None` for statuses other than passed and failed. Paths under
/// `root` are made relative to it so identities survive checkout moves.
#[must_use]
pub fn normalize(raw: &RawTestResult, root: Option<&Path>) -> Option<TestResult> {
    let status = match raw.status.as_str() {
        "passed" => TestStatus::Passed,
        "failed" => TestStatus::Failed,
        other => {
            debug!(test = %raw.title, status = other, "ignoring result");
            return None;
        }
    };

    let ancestors: Vec<&str> =
        raw.ancestor_titles.iter().map(String::as_str).filter(|t| !t.is_empty()).collect();
    let test_suite_name = ancestors.join(NAME_SEPARATOR);
    let test_name = if test_suite_name.is_empty() {
        raw.title.clone()
    } else {
        format!("{test_suite_name}{NAME_SEPARATOR}{}", raw.title)
    };

    let (error_message, error_stack) = match raw.failure_messages.first() {
        Some(message) => split_failure(message),
        None => (None, None),
    };

    Some(TestResult {
        test_file_path: relative_path(&raw.file_path, root),
        test_suite_name,
        test_name,
        status,
        error_message,
        error_stack,
        duration_ms: raw.duration.and_then(millis),
    })
}

fn split_failure(message: &str) -> (Option<String>, Option<String>) {
    let (first, rest) = message.split_once('\n').unwrap_or((message, ""));
    let first = first.trim();
    let rest = rest.trim_end();
    (
        (!first.is_empty()).then(|| first.to_string()),
        (!rest.trim().is_empty()).then(|| rest.to_string()),
    )
}

fn relative_path(file_path: &str, root: Option<&Path>) -> String {
    let path = Path::new(file_path);
    root.and_then(|root| path.strip_prefix(root).ok())
        .map_or_else(|| file_path.to_string(), |rel| rel.to_string_lossy().replace('\\', "/"))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn millis(duration: f64) -> Option<u64> {
    (duration.is_finite() && duration >= 0.0).then(|| duration.round() as u64)
}

/// Collects results for one run and reconciles issues at the end.
pub struct Reporter<'a> {
    manager: LifecycleManager<'a>,
    root: Option<PathBuf>,
    pending: Vec<TestResult>,
}

impl<'a> Reporter<'a> {
    /// Creates a reporter for a single run.
    #[must_use]
    pub fn new(manager: LifecycleManager<'a>, root: Option<&Path>) -> Self {
        Self { manager, root: root.map(Path::to_path_buf), pending: Vec::new() }
    }

    /// Results buffered so far.
    #[must_use]
    pub fn pending(&self) -> &[TestResult] {
        &self.pending
    }

    /// Checks tracker availability up front when tracking is enabled.
    pub async fn on_run_start(&mut self) {
        if self.manager.options().is_enabled() {
            self.manager.check_availability().await;
        }
    }

    /// Buffers one runner result, dropping skipped and pending tests.
    pub fn on_test_result(&mut self, raw: &RawTestResult) {
        if let Some(result) = normalize(raw, self.root.as_deref()) {
            self.pending.push(result);
        }
    }

    /// Processes every buffered result and saves the mapping store once.
    pub async fn on_run_complete(mut self) -> BatchReport {
        let report = self.manager.process_results(&self.pending).await;
        self.manager.save_changes();
        report
    }
}
