//! Live adapters for the `IssueTracker` port.
//!
//! Three variants are available, selected by the `tracker` setting:
//! the GitHub CLI, the GitHub REST API, and a local JSON file.

pub mod gh_cli;
pub mod github_api;
pub mod local;

pub use gh_cli::GhCliTracker;
pub use github_api::GithubApiTracker;
pub use local::LocalTracker;
