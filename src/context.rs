//! Service context bundling all port trait objects.

use crate::adapters::live::clock::LiveClock;
use crate::adapters::live::filesystem::LiveFileSystem;
use crate::adapters::live::git::LiveGitRepo;
use crate::adapters::live::issues::{GhCliTracker, GithubApiTracker, LocalTracker};
use crate::adapters::live::shell::LiveShellExecutor;
use crate::config::{Config, TrackerKind};
use crate::ports::clock::Clock;
use crate::ports::filesystem::FileSystem;
use crate::ports::git::GitRepo;
use crate::ports::issues::{IssueTracker, TrackerError};

/// Bundles all port trait objects into a single context.
///
/// Each field provides access to one external boundary. A context is
/// built once per process; tests assemble one from in-memory fakes.
pub struct ServiceContext {
    /// Clock for obtaining the current time.
    pub clock: Box<dyn Clock>,
    /// Filesystem for the mapping file.
    pub fs: Box<dyn FileSystem>,
    /// Git repository used for fix provenance.
    pub git: Box<dyn GitRepo>,
    /// Issue tracker selected by configuration.
    pub issues: Box<dyn IssueTracker>,
}

impl ServiceContext {
    /// Creates a live context with real adapters and the configured tracker.
    ///
    /// # Errors
    ///
    /// Returns an error if the selected tracker is missing required settings.
    pub fn live(config: &Config) -> Result<Self, TrackerError> {
        Ok(Self {
            clock: Box::new(LiveClock),
            fs: Box::new(LiveFileSystem),
            git: Box::new(LiveGitRepo),
            issues: live_tracker(config)?,
        })
    }
}

fn live_tracker(config: &Config) -> Result<Box<dyn IssueTracker>, TrackerError> {
    let settings = &config.tracker;
    Ok(match settings.kind {
        TrackerKind::Gh => {
            Box::new(GhCliTracker::new(LiveShellExecutor, settings.repo.as_deref())?)
        }
        TrackerKind::Github => Box::new(GithubApiTracker::new(
            &settings.api_url,
            settings.repo.as_deref(),
            settings.token.as_deref(),
        )?),
        TrackerKind::Local => {
            Box::new(LocalTracker::new(Box::new(LiveFileSystem), &settings.local_path))
        }
    })
}
