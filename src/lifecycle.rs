//! Issue lifecycle manager.
//!
//! Maps a batch of test results onto tracker operations:
//!
//! ```text
//! untracked + failed  -> create   (create_issues)
//! open      + passed  -> close    (close_issues)
//! closed    + failed  -> reopen   (per ReopenPolicy)
//! anything else       -> unchanged
//! ```
//!
//! Transitions are planned against the mapping store, tracker calls run
//! concurrently (one per test at most), and store mutations are applied
//! afterwards on the calling task. The store is flushed once per batch.

use std::collections::HashMap;
use std::fmt::{self, Write};
use std::path::Path;
use std::str::FromStr;

use futures_util::stream::{self, StreamExt};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::context::ServiceContext;
use crate::identity::TestIdentity;
use crate::mapping::{FixProvenance, IssueMapping, IssueStatus, MappingUpdate};
use crate::ports::filesystem::PortError;
use crate::ports::issues::TrackerError;
use crate::results::{TestResult, TestStatus};
use crate::store::MappingStore;
use crate::template;

/// Default cap on concurrent tracker calls within a batch.
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;

/// Which capability allows a closed issue to be reopened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReopenPolicy {
    /// Reopen when closing is enabled.
    #[default]
    Track,
    /// Reopen when creating is enabled.
    Generate,
    /// Reopen when either is enabled.
    Either,
}

impl FromStr for ReopenPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "track" => Ok(Self::Track),
            "generate" => Ok(Self::Generate),
            "either" => Ok(Self::Either),
            other => Err(format!(
                "unknown reopen policy `{other}` (expected track, generate, or either)"
            )),
        }
    }
}

/// Switches controlling which tracker mutations a batch may perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingOptions {
    /// Open issues for newly failing tests.
    pub create_issues: bool,
    /// Close issues for tests that pass again.
    pub close_issues: bool,
    /// Gate for reopening closed issues.
    pub reopen_policy: ReopenPolicy,
    /// Labels attached to created issues.
    pub labels: Vec<String>,
    /// Upper bound on tracker calls in flight.
    pub max_concurrency: usize,
}

impl Default for TrackingOptions {
    fn default() -> Self {
        Self {
            create_issues: false,
            close_issues: false,
            reopen_policy: ReopenPolicy::default(),
            labels: Vec::new(),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }
}

impl TrackingOptions {
    /// Returns `true` if any tracker mutation is allowed.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.create_issues || self.close_issues
    }

    /// Returns `true` if closed issues may be reopened.
    #[must_use]
    pub fn reopen_allowed(&self) -> bool {
        match self.reopen_policy {
            ReopenPolicy::Track => self.close_issues,
            ReopenPolicy::Generate => self.create_issues,
            ReopenPolicy::Either => self.create_issues || self.close_issues,
        }
    }
}

/// What a single result does to its test's issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Open a new issue.
    Create,
    /// Close the mapped issue.
    Close {
        /// The mapped issue.
        issue_number: u64,
    },
    /// Reopen the mapped issue.
    Reopen {
        /// The mapped issue.
        issue_number: u64,
    },
    /// Leave the tracker alone.
    Unchanged,
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => f.write_str("open"),
            Self::Close { .. } => f.write_str("close"),
            Self::Reopen { .. } => f.write_str("reopen"),
            Self::Unchanged => f.write_str("leave"),
        }
    }
}

/// Decides the transition for one result given the test's current record.
///
/// A record without an issue number counts as untracked.
#[must_use]
pub fn plan_transition(
    mapping: Option<&IssueMapping>,
    status: TestStatus,
    options: &TrackingOptions,
) -> Transition {
    match (mapping.filter(|m| m.has_issue()), status) {
        (None, TestStatus::Failed) if options.create_issues => Transition::Create,
        (Some(m), TestStatus::Passed) if m.status == IssueStatus::Open && options.close_issues => {
            Transition::Close { issue_number: m.issue_number }
        }
        (Some(m), TestStatus::Failed)
            if m.status == IssueStatus::Closed && options.reopen_allowed() =>
        {
            Transition::Reopen { issue_number: m.issue_number }
        }
        _ => Transition::Unchanged,
    }
}

/// An issue that was opened, closed, or reopened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueChange {
    /// The test's identity.
    pub identity: TestIdentity,
    /// Full test name.
    pub test_name: String,
    /// The issue acted on.
    pub issue_number: u64,
}

/// A tracker call that failed; the mapping was left as it was.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueFailure {
    /// The test's identity.
    pub identity: TestIdentity,
    /// Full test name.
    pub test_name: String,
    /// The transition that was attempted.
    pub transition: Transition,
    /// The tracker's error message.
    pub error: String,
}

/// Summary of one processed batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// `None` when tracking was disabled and the tracker was not consulted.
    pub tracker_available: Option<bool>,
    /// Newly opened issues.
    pub created: Vec<IssueChange>,
    /// Closed issues.
    pub closed: Vec<IssueChange>,
    /// Reopened issues.
    pub reopened: Vec<IssueChange>,
    /// Failed tracker calls.
    pub failures: Vec<IssueFailure>,
    /// Tests whose issue state needed no change.
    pub unchanged: usize,
}

impl BatchReport {
    /// Number of tracker mutations that succeeded.
    #[must_use]
    pub fn changes(&self) -> usize {
        self.created.len() + self.closed.len() + self.reopened.len()
    }
}

/// A planned tracker call with its rendered text.
struct Job<'r> {
    index: usize,
    identity: TestIdentity,
    result: &'r TestResult,
    transition: Transition,
    title: String,
    text: String,
}

/// Runs the issue state machine over batches of results.
///
/// Owns the mapping store for the duration of a run.
pub struct LifecycleManager<'a> {
    ctx: &'a ServiceContext,
    store: MappingStore<'a>,
    options: TrackingOptions,
    availability: Option<bool>,
}

impl<'a> LifecycleManager<'a> {
    /// Loads the mapping database at `database_path` and prepares a manager.
    #[must_use]
    pub fn new(ctx: &'a ServiceContext, database_path: &Path, options: TrackingOptions) -> Self {
        let store = MappingStore::open(ctx.fs.as_ref(), ctx.clock.as_ref(), database_path);
        Self { ctx, store, options, availability: None }
    }

    /// The options this manager applies.
    #[must_use]
    pub fn options(&self) -> &TrackingOptions {
        &self.options
    }

    /// Asks the tracker whether it is usable, once per manager.
    pub async fn check_availability(&mut self) -> bool {
        if let Some(available) = self.availability {
            return available;
        }
        let available = self.ctx.issues.is_available().await;
        if !available {
            warn!("issue tracker is unavailable; issue tracking is disabled for this run");
        }
        self.availability = Some(available);
        available
    }

    /// Applies the transition table to every result.
    ///
    /// Tracker errors are logged and reported per test; they never stop
    /// the batch. Changes stay in memory until [`Self::save_changes`].
    pub async fn process_results(&mut self, results: &[TestResult]) -> BatchReport {
        let mut report = BatchReport::default();
        if !self.options.is_enabled() {
            debug!("issue creation and tracking are both disabled");
            return report;
        }
        let available = self.check_availability().await;
        report.tracker_available = Some(available);
        if !available {
            return report;
        }

        let mut planned = Vec::new();
        for (identity, result) in coalesce(results) {
            match plan_transition(self.store.get(&identity), result.status, &self.options) {
                Transition::Unchanged => {
                    self.store.backfill(&identity, &result.test_file_path, &result.test_name);
                    report.unchanged += 1;
                }
                transition => planned.push((identity, result, transition)),
            }
        }
        if planned.is_empty() {
            return report;
        }

        let provenance = planned
            .iter()
            .any(|(_, _, t)| matches!(t, Transition::Close { .. }))
            .then(|| self.fix_provenance());
        let jobs: Vec<Job<'_>> = planned
            .into_iter()
            .enumerate()
            .map(|(index, (identity, result, transition))| {
                let (title, text) = self.render(&identity, result, transition, provenance.as_ref());
                Job { index, identity, result, transition, title, text }
            })
            .collect();
        debug!(calls = jobs.len(), "dispatching tracker calls");

        let ctx = self.ctx;
        let tracker = ctx.issues.as_ref();
        let labels = self.options.labels.as_slice();
        let mut outcomes: Vec<(Job<'_>, Result<u64, TrackerError>)> = stream::iter(jobs)
            .map(|job| async move {
                let outcome = match job.transition {
                    Transition::Create => tracker.create_issue(&job.title, &job.text, labels).await,
                    Transition::Close { issue_number } => {
                        tracker.close_issue(issue_number, Some(&job.text)).await
                    }
                    Transition::Reopen { issue_number } => {
                        tracker.reopen_issue(issue_number, Some(&job.text)).await
                    }
                    Transition::Unchanged => Ok(0),
                };
                (job, outcome)
            })
            .buffer_unordered(self.options.max_concurrency.max(1))
            .collect()
            .await;
        outcomes.sort_by_key(|(job, _)| job.index);

        for (job, outcome) in outcomes {
            self.apply(job, outcome, provenance.as_ref(), &mut report);
        }
        report
    }

    /// Flushes the mapping store. Returns `false` if the write failed.
    pub fn save_changes(&mut self) -> bool {
        self.store.save()
    }

    fn render(
        &self,
        identity: &TestIdentity,
        result: &TestResult,
        transition: Transition,
        provenance: Option<&FixProvenance>,
    ) -> (String, String) {
        match transition {
            Transition::Create => (template::issue_title(result), template::issue_body(result)),
            Transition::Close { .. } => {
                (String::new(), template::close_comment(result, provenance))
            }
            Transition::Reopen { .. } => (
                String::new(),
                self.store
                    .get(identity)
                    .map(|mapping| template::reopen_comment(result, mapping))
                    .unwrap_or_default(),
            ),
            Transition::Unchanged => (String::new(), String::new()),
        }
    }

    fn apply(
        &mut self,
        job: Job<'_>,
        outcome: Result<u64, TrackerError>,
        provenance: Option<&FixProvenance>,
        report: &mut BatchReport,
    ) {
        let Job { identity, result, transition, .. } = job;
        let issue_number = match outcome {
            Ok(number) => number,
            Err(err) => {
                warn!(test = %result.test_name, "failed to {transition} issue: {err}");
                report.failures.push(IssueFailure {
                    identity,
                    test_name: result.test_name.clone(),
                    transition,
                    error: err.to_string(),
                });
                return;
            }
        };

        let change = IssueChange {
            identity: identity.clone(),
            test_name: result.test_name.clone(),
            issue_number,
        };
        match transition {
            Transition::Create => {
                info!(issue = issue_number, test = %result.test_name, "opened issue");
                let mapping = IssueMapping::opened(
                    issue_number,
                    self.ctx.clock.now(),
                    &result.test_file_path,
                    &result.test_name,
                );
                self.store.set(identity, mapping);
                report.created.push(change);
            }
            Transition::Close { .. } => {
                info!(issue = issue_number, test = %result.test_name, "closed issue");
                self.store.update(
                    &identity,
                    MappingUpdate::status(IssueStatus::Closed),
                    provenance,
                );
                self.store.backfill(&identity, &result.test_file_path, &result.test_name);
                report.closed.push(change);
            }
            Transition::Reopen { .. } => {
                info!(issue = issue_number, test = %result.test_name, "reopened issue");
                self.store.update(&identity, MappingUpdate::status(IssueStatus::Open), None);
                self.store.backfill(&identity, &result.test_file_path, &result.test_name);
                report.reopened.push(change);
            }
            Transition::Unchanged => report.unchanged += 1,
        }
    }

    fn fix_provenance(&self) -> FixProvenance {
        let git = self.ctx.git.as_ref();
        FixProvenance {
            fixed_by: git_value("author", git.last_commit_author()),
            fix_commit: git_value("commit", git.current_commit()),
            fix_message: git_value("commit subject", git.last_commit_subject()),
        }
    }
}

fn git_value(what: &str, value: Result<String, PortError>) -> Option<String> {
    match value {
        Ok(value) => Some(value.trim().to_string()).filter(|v| !v.is_empty()),
        Err(err) => {
            debug!("could not read {what} from git: {err}");
            None
        }
    }
}

/// Keeps one result per test: the last one observed, in first-seen order.
fn coalesce(results: &[TestResult]) -> Vec<(TestIdentity, &TestResult)> {
    let mut order = Vec::new();
    let mut latest: HashMap<TestIdentity, usize> = HashMap::new();
    for (index, result) in results.iter().enumerate() {
        let identity = result.identity();
        if latest.insert(identity.clone(), index).is_none() {
            order.push(identity);
        }
    }
    order
        .into_iter()
        .map(|identity| {
            let index = latest[&identity];
            (identity, &results[index])
        })
        .collect()
}

/// Formats a batch report for the console.
#[must_use]
pub fn format_report(report: &BatchReport) -> String {
    match report.tracker_available {
        None => return "Issue tracking disabled.".to_string(),
        Some(false) => return "Issue tracker unavailable; no issues were updated.".to_string(),
        Some(true) => {}
    }

    let mut out = String::new();
    for (verb, changes) in
        [("OPENED", &report.created), ("CLOSED", &report.closed), ("REOPENED", &report.reopened)]
    {
        for change in changes {
            let _ = writeln!(out, "  {verb} #{}: {}", change.issue_number, change.test_name);
        }
    }
    for failure in &report.failures {
        let _ = writeln!(
            out,
            "  FAILED to {} issue for {}: {}",
            failure.transition, failure.test_name, failure.error
        );
    }
    let _ = write!(
        out,
        "{} opened, {} closed, {} reopened, {} failed, {} unchanged",
        report.created.len(),
        report.closed.len(),
        report.reopened.len(),
        report.failures.len(),
        report.unchanged
    );
    out
}
