//! Issue tracker backed by the GitHub CLI (`gh`).

use std::sync::Arc;

use tracing::debug;

use crate::ports::issues::{AvailabilityFuture, IssueTracker, TrackerError, TrackerFuture};
use crate::ports::shell::{ShellExecutor, ShellOutput};

const ENV_GH_BIN: &str = "TESTTRACK_GH_BIN";

/// Tracker that drives `gh issue create|close|reopen`.
///
/// Authentication and repository detection are left to `gh` itself; an
/// explicit `owner/name` repository is passed through `--repo` when set.
/// Each `gh` process runs on the blocking pool, so concurrent calls overlap.
pub struct GhCliTracker<S: ShellExecutor> {
    shell: Arc<S>,
    binary: String,
    repo: Option<String>,
}

impl<S: ShellExecutor + 'static> GhCliTracker<S> {
    /// Creates a tracker using `gh`, or the binary named by `TESTTRACK_GH_BIN`.
    ///
    /// # Errors
    ///
    /// Returns an error if `TESTTRACK_GH_BIN` is set but empty.
    pub fn new(shell: S, repo: Option<&str>) -> Result<Self, TrackerError> {
        let binary = std::env::var(ENV_GH_BIN).unwrap_or_else(|_| "gh".to_string());
        if binary.trim().is_empty() {
            return Err(TrackerError::Configuration(format!(
                "{ENV_GH_BIN} is set but empty. Provide a valid gh binary path or unset it."
            )));
        }
        Ok(Self::with_binary(shell, &binary, repo))
    }

    /// Creates a tracker using an explicit `gh` binary.
    #[must_use]
    pub fn with_binary(shell: S, binary: &str, repo: Option<&str>) -> Self {
        Self { shell: Arc::new(shell), binary: binary.to_string(), repo: repo.map(String::from) }
    }

    fn create_args(&self, title: &str, body: &str, labels: &[String]) -> Vec<String> {
        let mut args = vec![
            "issue".to_string(),
            "create".to_string(),
            "--title".to_string(),
            title.to_string(),
            "--body".to_string(),
            body.to_string(),
        ];
        for label in labels.iter().map(|l| l.trim()).filter(|l| !l.is_empty()) {
            args.push("--label".to_string());
            args.push(label.to_string());
        }
        self.push_repo(&mut args);
        args
    }

    fn state_args(&self, verb: &str, number: u64, comment: Option<&str>) -> Vec<String> {
        let mut args = vec!["issue".to_string(), verb.to_string(), number.to_string()];
        if let Some(comment) = comment.filter(|c| !c.trim().is_empty()) {
            args.push("--comment".to_string());
            args.push(comment.to_string());
        }
        self.push_repo(&mut args);
        args
    }

    fn push_repo(&self, args: &mut Vec<String>) {
        if let Some(repo) = &self.repo {
            args.push("--repo".to_string());
            args.push(repo.clone());
        }
    }

    async fn run_gh(&self, args: Vec<String>) -> Result<ShellOutput, TrackerError> {
        debug!(
            binary = %self.binary,
            command = %args.first().map_or("", String::as_str),
            "running gh"
        );
        let shell = Arc::clone(&self.shell);
        let binary = self.binary.clone();
        let (output, args) = tokio::task::spawn_blocking(move || {
            let output = shell.run(&binary, &args);
            (output, args)
        })
        .await
        .map_err(|e| TrackerError::Io(format!("GitHub CLI task failed: {e}")))?;

        let output = output.map_err(|e| {
            TrackerError::Unavailable(format!(
                "failed to execute GitHub CLI `{}`: {e}",
                self.binary
            ))
        })?;
        if output.success() {
            return Ok(output);
        }
        Err(TrackerError::CommandFailed {
            command: format!("{} {}", self.binary, render_args(&args)),
            detail: output.detail(),
        })
    }
}

/// Renders an argument list for error messages, eliding long bodies.
fn render_args(args: &[String]) -> String {
    args.iter()
        .map(|arg| {
            if arg.len() > 60 || arg.contains('\n') {
                "<...>".to_string()
            } else {
                arg.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Extracts the issue number from the URL `gh issue create` prints last.
pub(crate) fn parse_issue_number(stdout: &str) -> Option<u64> {
    let url = stdout.lines().map(str::trim).filter(|l| !l.is_empty()).next_back()?;
    url.trim_end_matches('/').rsplit('/').next()?.parse().ok()
}

impl<S: ShellExecutor + 'static> IssueTracker for GhCliTracker<S> {
    fn is_available(&self) -> AvailabilityFuture<'_> {
        Box::pin(async move {
            let args = vec!["auth".to_string(), "status".to_string()];
            match self.run_gh(args).await {
                Ok(_) => true,
                Err(err) => {
                    debug!("gh is not usable: {err}");
                    false
                }
            }
        })
    }

    fn create_issue<'a>(
        &'a self,
        title: &'a str,
        body: &'a str,
        labels: &'a [String],
    ) -> TrackerFuture<'a> {
        Box::pin(async move {
            let output = self.run_gh(self.create_args(title, body, labels)).await?;
            parse_issue_number(&output.stdout).ok_or_else(|| {
                TrackerError::InvalidResponse(format!(
                    "could not find an issue URL in gh output: {}",
                    output.stdout.trim()
                ))
            })
        })
    }

    fn close_issue<'a>(&'a self, number: u64, comment: Option<&'a str>) -> TrackerFuture<'a> {
        Box::pin(async move {
            self.run_gh(self.state_args("close", number, comment)).await?;
            Ok(number)
        })
    }

    fn reopen_issue<'a>(&'a self, number: u64, comment: Option<&'a str>) -> TrackerFuture<'a> {
        Box::pin(async move {
            self.run_gh(self.state_args("reopen", number, comment)).await?;
            Ok(number)
        })
    }
}
