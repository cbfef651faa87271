//! Issue tracker backed by a local JSON file.
//!
//! Useful offline and in CI dry runs: issues are numbered from 1 and kept
//! in a single file next to the mapping database.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use crate::mapping::IssueStatus;
use crate::ports::filesystem::FileSystem;
use crate::ports::issues::{AvailabilityFuture, IssueTracker, TrackerError, TrackerFuture};
use crate::store::replace_file;

/// An issue stored by [`LocalTracker`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalIssue {
    /// Issue title.
    pub title: String,
    /// Issue body.
    pub body: String,
    /// Labels attached at creation.
    #[serde(default)]
    pub labels: Vec<String>,
    /// Current state.
    pub state: IssueStatus,
    /// Close and reopen comments, oldest first.
    #[serde(default)]
    pub comments: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LocalIssueFile {
    next_number: u64,
    issues: BTreeMap<u64, LocalIssue>,
}

impl Default for LocalIssueFile {
    fn default() -> Self {
        Self { next_number: 1, issues: BTreeMap::new() }
    }
}

/// File-backed tracker; always available.
///
/// Calls are serialized by a lock and run on the blocking pool. Every
/// change replaces the issue file atomically.
pub struct LocalTracker {
    inner: Arc<Inner>,
}

struct Inner {
    fs: Box<dyn FileSystem>,
    path: PathBuf,
    lock: Mutex<()>,
}

impl LocalTracker {
    /// Creates a tracker storing its issues at `path`.
    #[must_use]
    pub fn new(fs: Box<dyn FileSystem>, path: &Path) -> Self {
        Self { inner: Arc::new(Inner { fs, path: path.to_path_buf(), lock: Mutex::new(()) }) }
    }

    /// Returns every stored issue keyed by number.
    ///
    /// # Errors
    ///
    /// Returns an error if the issue file cannot be read or parsed.
    pub fn issues(&self) -> Result<BTreeMap<u64, LocalIssue>, TrackerError> {
        let _guard = self.inner.guard()?;
        Ok(self.inner.read()?.issues)
    }

    async fn update<T, F>(&self, apply: F) -> Result<T, TrackerError>
    where
        T: Send + 'static,
        F: FnOnce(&mut LocalIssueFile) -> Result<T, TrackerError> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || inner.update(apply))
            .await
            .map_err(|e| TrackerError::Io(format!("local tracker task failed: {e}")))?
    }

    async fn transition(
        &self,
        number: u64,
        state: IssueStatus,
        comment: Option<&str>,
    ) -> Result<u64, TrackerError> {
        let comment = comment.filter(|c| !c.trim().is_empty()).map(String::from);
        self.update(move |file| {
            let issue = file.issues.get_mut(&number).ok_or_else(|| {
                TrackerError::InvalidResponse(format!("issue #{number} does not exist"))
            })?;
            issue.state = state;
            issue.comments.extend(comment);
            Ok(number)
        })
        .await
    }
}

impl Inner {
    fn guard(&self) -> Result<MutexGuard<'_, ()>, TrackerError> {
        self.lock.lock().map_err(|_| TrackerError::Io("local tracker lock poisoned".into()))
    }

    fn update<T>(
        &self,
        apply: impl FnOnce(&mut LocalIssueFile) -> Result<T, TrackerError>,
    ) -> Result<T, TrackerError> {
        let _guard = self.guard()?;
        let mut file = self.read()?;
        let value = apply(&mut file)?;
        let json =
            serde_json::to_string_pretty(&file).map_err(|e| TrackerError::Io(e.to_string()))?;
        replace_file(self.fs.as_ref(), &self.path, &json)
            .map_err(|e| TrackerError::Io(e.to_string()))?;
        Ok(value)
    }

    fn read(&self) -> Result<LocalIssueFile, TrackerError> {
        if !self.fs.exists(&self.path) {
            return Ok(LocalIssueFile::default());
        }
        let contents = self.fs.read_to_string(&self.path).map_err(|e| {
            TrackerError::Io(format!("failed to read {}: {e}", self.path.display()))
        })?;
        serde_json::from_str(&contents).map_err(|e| {
            TrackerError::InvalidResponse(format!("{} is corrupt: {e}", self.path.display()))
        })
    }
}

impl IssueTracker for LocalTracker {
    fn is_available(&self) -> AvailabilityFuture<'_> {
        Box::pin(async { true })
    }

    fn create_issue<'a>(
        &'a self,
        title: &'a str,
        body: &'a str,
        labels: &'a [String],
    ) -> TrackerFuture<'a> {
        let issue = LocalIssue {
            title: title.to_string(),
            body: body.to_string(),
            labels: labels.to_vec(),
            state: IssueStatus::Open,
            comments: Vec::new(),
        };
        Box::pin(self.update(move |file| {
            let number = file.next_number;
            file.next_number += 1;
            file.issues.insert(number, issue);
            Ok(number)
        }))
    }

    fn close_issue<'a>(&'a self, number: u64, comment: Option<&'a str>) -> TrackerFuture<'a> {
        Box::pin(self.transition(number, IssueStatus::Closed, comment))
    }

    fn reopen_issue<'a>(&'a self, number: u64, comment: Option<&'a str>) -> TrackerFuture<'a> {
        Box::pin(self.transition(number, IssueStatus::Open, comment))
    }
}
