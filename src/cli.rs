//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::{parse_bool, Overrides, TrackerKind};
use crate::lifecycle::ReopenPolicy;

/// Top-level CLI parser for `testtrack`.
#[derive(Debug, Parser)]
#[command(name = "testtrack", version, about = "Keep tracker issues in step with failing tests")]
pub struct Cli {
    /// YAML config file (defaults to `.testtrack.yaml` when present).
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Mapping database path.
    #[arg(long = "db", global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Issue tracker to use.
    #[arg(long, global = true, value_enum)]
    pub tracker: Option<TrackerKind>,

    /// Repository as `owner/name`.
    #[arg(long, global = true, value_name = "OWNER/NAME")]
    pub repo: Option<String>,

    /// The command to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Supported top-level subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Reconcile issues with a test results file.
    Report(ReportArgs),
    /// List tracked tests and their issues.
    Status {
        /// Only show tests whose issue is open.
        #[arg(long)]
        open: bool,
    },
    /// Check whether the issue tracker is reachable.
    Check,
}

/// Arguments for `testtrack report`.
#[derive(Debug, Args)]
pub struct ReportArgs {
    /// Jest JSON report or flat array of results.
    #[arg(value_name = "RESULTS_JSON")]
    pub results: PathBuf,

    /// Open issues for newly failing tests.
    #[arg(
        long,
        value_name = "BOOL",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true",
        value_parser = parse_bool
    )]
    pub generate_issues: Option<bool>,

    /// Close issues for tests that pass again.
    #[arg(
        long,
        value_name = "BOOL",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true",
        value_parser = parse_bool
    )]
    pub track_issues: Option<bool>,

    /// Which setting allows closed issues to be reopened.
    #[arg(long = "reopen-on", value_enum)]
    pub reopen_policy: Option<ReopenPolicy>,

    /// Label for new issues (repeatable).
    #[arg(long = "label", value_name = "LABEL")]
    pub labels: Vec<String>,
}

impl Cli {
    /// Collects the command-line values that take part in config resolution.
    #[must_use]
    pub fn overrides(&self) -> Overrides {
        let mut overrides = Overrides {
            db_path: self.db_path.clone(),
            tracker: self.tracker,
            repo: self.repo.clone(),
            ..Overrides::default()
        };
        if let Command::Report(args) = &self.command {
            overrides.generate_issues = args.generate_issues;
            overrides.track_issues = args.track_issues;
            overrides.reopen_policy = args.reopen_policy;
            overrides.labels.clone_from(&args.labels);
        }
        overrides
    }
}
