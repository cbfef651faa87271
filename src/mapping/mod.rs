//! Issue mapping records and the on-disk database layout.
//!
//! ```json
//! {
//!   "testIdentifiers": {
//!     "<identity>": {
//!       "issueNumber": 42,
//!       "status": "open",
//!       "lastFailure": "2025-03-15T14:30:00Z",
//!       "lastUpdate": "2025-03-15T14:30:00Z",
//!       "testFilePath": "src/parser.test.ts",
//!       "testName": "Parser › handles empty input"
//!     }
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::TestIdentity;

/// Fallback recorded when the fixing author or commit is unknown.
pub const UNKNOWN: &str = "Unknown";

/// Tracker state of a mapped issue, as last observed or set by testtrack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueStatus {
    /// The issue is open: the test is failing.
    Open,
    /// The issue is closed: the test passed after failing.
    Closed,
}

impl fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => f.write_str("open"),
            Self::Closed => f.write_str("closed"),
        }
    }
}

/// One persisted record linking a test to its tracker issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueMapping {
    /// Tracker issue number; `0` means none has been assigned yet.
    #[serde(default)]
    pub issue_number: u64,
    /// Last known issue state.
    pub status: IssueStatus,
    /// Most recent failure observation.
    #[serde(rename = "lastFailure")]
    pub last_failure_at: DateTime<Utc>,
    /// Most recent mutation of this record.
    #[serde(rename = "lastUpdate")]
    pub last_update_at: DateTime<Utc>,
    /// Author of the commit that made the test pass.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed_by: Option<String>,
    /// Hash of the commit that made the test pass.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix_commit: Option<String>,
    /// Subject of the commit that made the test pass.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix_message: Option<String>,
    /// Test file the identity was derived from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_file_path: Option<String>,
    /// Full test name the identity was derived from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_name: Option<String>,
}

impl IssueMapping {
    /// Builds the record for a freshly created, open issue.
    #[must_use]
    pub fn opened(
        issue_number: u64,
        now: DateTime<Utc>,
        test_file_path: &str,
        test_name: &str,
    ) -> Self {
        Self {
            issue_number,
            status: IssueStatus::Open,
            last_failure_at: now,
            last_update_at: now,
            fixed_by: None,
            fix_commit: None,
            fix_message: None,
            test_file_path: non_empty(test_file_path),
            test_name: non_empty(test_name),
        }
    }

    /// Returns `true` once a tracker issue number has been assigned.
    #[must_use]
    pub fn has_issue(&self) -> bool {
        self.issue_number != 0
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

/// The complete set of mappings, keyed by test identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingDatabase {
    /// All known records.
    #[serde(default)]
    pub test_identifiers: BTreeMap<TestIdentity, IssueMapping>,
}

/// Fields to merge into an existing record. `None` leaves a field alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingUpdate {
    /// New issue status.
    pub status: Option<IssueStatus>,
    /// Explicit test file path; overwrites any stored value.
    pub test_file_path: Option<String>,
    /// Explicit test name; overwrites any stored value.
    pub test_name: Option<String>,
}

impl MappingUpdate {
    /// An update that only changes the status.
    #[must_use]
    pub fn status(status: IssueStatus) -> Self {
        Self { status: Some(status), ..Self::default() }
    }
}

/// Who and what most likely fixed a test, taken from the latest commit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FixProvenance {
    /// Commit author name.
    pub fixed_by: Option<String>,
    /// Commit hash.
    pub fix_commit: Option<String>,
    /// Commit subject line.
    pub fix_message: Option<String>,
}
