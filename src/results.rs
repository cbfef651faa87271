//! Normalized test results consumed by the lifecycle manager.

use std::fmt;

use crate::identity::{identify, TestIdentity};

/// Outcome of a single test in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestStatus {
    /// The test passed.
    Passed,
    /// The test failed.
    Failed,
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Passed => f.write_str("passed"),
            Self::Failed => f.write_str("failed"),
        }
    }
}

/// One test observation, independent of the runner that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestResult {
    /// Test file, relative to the project root when possible.
    pub test_file_path: String,
    /// Ancestor suites joined with `" › "`; empty for top-level tests.
    pub test_suite_name: String,
    /// Full test name including suite ancestry.
    pub test_name: String,
    /// Pass or fail.
    pub status: TestStatus,
    /// First line of the failure message.
    pub error_message: Option<String>,
    /// Remainder of the failure message (usually a stack trace).
    pub error_stack: Option<String>,
    /// Wall time in milliseconds, when reported.
    pub duration_ms: Option<u64>,
}

impl TestResult {
    /// Computes this test's stable identity.
    #[must_use]
    pub fn identity(&self) -> TestIdentity {
        identify(&self.test_file_path, &self.test_name)
    }

    /// Convenience constructor for a result without failure details.
    #[must_use]
    pub fn new(test_file_path: &str, test_name: &str, status: TestStatus) -> Self {
        let test_suite_name = test_name
            .rsplit_once(crate::identity::NAME_SEPARATOR)
            .map(|(suite, _)| suite.to_string())
            .unwrap_or_default();
        Self {
            test_file_path: test_file_path.to_string(),
            test_suite_name,
            test_name: test_name.to_string(),
            status,
            error_message: None,
            error_stack: None,
            duration_ms: None,
        }
    }
}
