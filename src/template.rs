//! Issue titles, bodies, and lifecycle comments.
//!
//! Pure formatting: nothing here touches the store or the tracker.

use std::fmt::Write;

use crate::identity::describe;
use crate::mapping::{FixProvenance, IssueMapping, UNKNOWN};
use crate::results::TestResult;

/// Builds the issue title for a failing test.
#[must_use]
pub fn issue_title(result: &TestResult) -> String {
    let leaf = describe(&result.test_name);
    let leaf = if leaf.is_empty() { result.test_file_path.as_str() } else { leaf.as_str() };
    format!("Failing test: {leaf}")
}

/// Builds the issue body for a failing test.
///
/// The body ends with a hidden marker carrying the test identity so an
/// issue can be traced back to its mapping record.
#[must_use]
pub fn issue_body(result: &TestResult) -> String {
    let mut body = String::new();

    body.push_str("## Failing test\n\n");
    let _ = writeln!(body, "- **File:** `{}`", result.test_file_path);
    if !result.test_suite_name.is_empty() {
        let _ = writeln!(body, "- **Suite:** {}", result.test_suite_name);
    }
    let _ = writeln!(body, "- **Test:** {}", result.test_name);
    if let Some(ms) = result.duration_ms {
        let _ = writeln!(body, "- **Duration:** {ms} ms");
    }

    if let Some(message) = &result.error_message {
        body.push_str("\n## Error\n\n");
        let _ = writeln!(body, "{}", fenced(message));
    }
    if let Some(stack) = &result.error_stack {
        body.push_str("\n## Stack trace\n\n");
        let _ = writeln!(body, "{}", fenced(stack));
    }

    body.push_str(
        "\nThis issue is managed automatically: it closes when the test passes \
         and reopens if it fails again.\n",
    );
    let _ = write!(body, "\n<!-- testtrack:{} -->\n", result.identity());
    body
}

/// Builds the comment left when a test passes and its issue is closed.
#[must_use]
pub fn close_comment(result: &TestResult, provenance: Option<&FixProvenance>) -> String {
    let mut comment = format!("`{}` is passing again.", result.test_name);
    if let Some(provenance) = provenance {
        let commit = provenance.fix_commit.as_deref().unwrap_or(UNKNOWN);
        let author = provenance.fixed_by.as_deref().unwrap_or(UNKNOWN);
        let _ = write!(comment, "\n\nLikely fixed in `{}` by {author}", short_commit(commit));
        match provenance.fix_message.as_deref().filter(|m| !m.is_empty()) {
            Some(message) => {
                let _ = write!(comment, ": {message}");
            }
            None => comment.push('.'),
        }
    }
    comment
}

/// Builds the comment left when a previously fixed test fails again.
#[must_use]
pub fn reopen_comment(result: &TestResult, mapping: &IssueMapping) -> String {
    let mut comment = format!("`{}` is failing again.", result.test_name);
    if let Some(commit) = mapping.fix_commit.as_deref().filter(|c| *c != UNKNOWN) {
        let _ = write!(comment, " It was last fixed in `{}`.", short_commit(commit));
    }
    if let Some(message) = &result.error_message {
        let _ = write!(comment, "\n\n{}", fenced(message));
    }
    comment
}

fn fenced(text: &str) -> String {
    format!("```\n{}\n```", text.trim_end())
}

fn short_commit(commit: &str) -> &str {
    commit.get(..12).unwrap_or(commit)
}
