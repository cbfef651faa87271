//! Live git adapter using `git` CLI commands.

use std::process::Command;

use crate::ports::filesystem::PortError;
use crate::ports::git::GitRepo;

/// Git adapter that shells out to the `git` CLI in the working directory.
pub struct LiveGitRepo;

impl LiveGitRepo {
    fn git(args: &[&str]) -> Result<String, PortError> {
        let output = Command::new("git").args(args).output()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(format!("git {} failed: {}", args.join(" "), stderr.trim()).into());
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

impl GitRepo for LiveGitRepo {
    fn current_commit(&self) -> Result<String, PortError> {
        Self::git(&["rev-parse", "HEAD"])
    }

    fn last_commit_author(&self) -> Result<String, PortError> {
        Self::git(&["log", "-1", "--format=%an"])
    }

    fn last_commit_subject(&self) -> Result<String, PortError> {
        Self::git(&["log", "-1", "--format=%s"])
    }
}
