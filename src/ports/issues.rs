//! Issue tracker port for opening, closing, and reopening test issues.

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

/// Boxed future returned by tracker mutations, keeping the trait dyn-compatible.
pub type TrackerFuture<'a> = Pin<Box<dyn Future<Output = Result<u64, TrackerError>> + Send + 'a>>;

/// Boxed future returned by [`IssueTracker::is_available`].
pub type AvailabilityFuture<'a> = Pin<Box<dyn Future<Output = bool> + Send + 'a>>;

/// Why a tracker operation did not succeed.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// The tracker cannot be reached or is not authenticated.
    #[error("tracker unavailable: {0}")]
    Unavailable(String),
    /// A CLI-backed tracker command exited unsuccessfully.
    #[error("tracker command failed (`{command}`): {detail}")]
    CommandFailed {
        /// The rendered command line.
        command: String,
        /// Stderr, stdout, or the exit status of the command.
        detail: String,
    },
    /// The tracker API answered with a non-success status.
    #[error("tracker API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Message extracted from the response body.
        message: String,
    },
    /// The tracker answered with something that could not be interpreted.
    #[error("unexpected tracker response: {0}")]
    InvalidResponse(String),
    /// The tracker client is missing required settings.
    #[error("tracker misconfigured: {0}")]
    Configuration(String),
    /// Local I/O failed while talking to the tracker.
    #[error("tracker I/O error: {0}")]
    Io(String),
}

/// Manages issues in an external tracker.
///
/// Every method resolves instead of panicking: availability is a plain
/// boolean and mutations report failure through [`TrackerError`]. On
/// success each mutation yields the issue number it acted on.
pub trait IssueTracker: Send + Sync {
    /// Returns `true` when the tracker can currently accept operations.
    fn is_available(&self) -> AvailabilityFuture<'_>;

    /// Creates a new issue and returns its number.
    fn create_issue<'a>(
        &'a self,
        title: &'a str,
        body: &'a str,
        labels: &'a [String],
    ) -> TrackerFuture<'a>;

    /// Closes an existing issue, optionally leaving a comment.
    fn close_issue<'a>(&'a self, number: u64, comment: Option<&'a str>) -> TrackerFuture<'a>;

    /// Reopens a closed issue, optionally leaving a comment.
    fn reopen_issue<'a>(&'a self, number: u64, comment: Option<&'a str>) -> TrackerFuture<'a>;
}
