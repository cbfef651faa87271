//! Git repository port used for fix provenance.

use super::filesystem::PortError;

/// Provides read access to the repository the tests ran in.
///
/// When a test's issue is closed, the author, hash, and subject of the
/// latest commit are recorded as the likely fix.
pub trait GitRepo: Send + Sync {
    /// Returns the hash of the current HEAD commit.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository has no commits or is invalid.
    fn current_commit(&self) -> Result<String, PortError>;

    /// Returns the author name of the HEAD commit.
    ///
    /// # Errors
    ///
    /// Returns an error if the author cannot be read.
    fn last_commit_author(&self) -> Result<String, PortError>;

    /// Returns the subject line of the HEAD commit message.
    ///
    /// # Errors
    ///
    /// Returns an error if the message cannot be read.
    fn last_commit_subject(&self) -> Result<String, PortError>;
}
