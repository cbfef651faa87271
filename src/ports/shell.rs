//! Shell executor port for running external programs.

use super::filesystem::PortError;

/// The output of a finished process.
#[derive(Debug, Clone, Default)]
pub struct ShellOutput {
    /// The exit code of the process (`-1` when killed by a signal).
    pub exit_code: i32,
    /// The captured standard output.
    pub stdout: String,
    /// The captured standard error.
    pub stderr: String,
}

impl ShellOutput {
    /// Returns `true` when the process exited with status zero.
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Best human-readable detail: stderr, then stdout, then the exit code.
    #[must_use]
    pub fn detail(&self) -> String {
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return stderr.to_string();
        }
        let stdout = self.stdout.trim();
        if !stdout.is_empty() {
            return stdout.to_string();
        }
        format!("exit code {}", self.exit_code)
    }
}

/// Executes external programs with an explicit argument vector.
///
/// Arguments are never passed through a shell, so issue titles and
/// bodies containing quotes or newlines reach the program verbatim.
pub trait ShellExecutor: Send + Sync {
    /// Runs `program` with `args` and returns its captured output.
    ///
    /// # Errors
    ///
    /// Returns an error if the program cannot be spawned.
    fn run(&self, program: &str, args: &[String]) -> Result<ShellOutput, PortError>;
}
