//! Port traits defining external boundaries.
//!
//! Each trait represents a boundary between the tracking core and an
//! external system (time, filesystem, git, shell, issue tracker).
//! Implementations live in `src/adapters/`.

pub mod clock;
pub mod filesystem;
pub mod git;
pub mod issues;
pub mod shell;

pub use clock::Clock;
pub use filesystem::FileSystem;
pub use git::GitRepo;
pub use issues::{AvailabilityFuture, IssueTracker, TrackerError, TrackerFuture};
pub use shell::{ShellExecutor, ShellOutput};
