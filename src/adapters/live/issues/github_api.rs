//! Issue tracker backed by the GitHub REST API.

use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::ports::issues::{AvailabilityFuture, IssueTracker, TrackerError, TrackerFuture};

/// Public GitHub API root.
pub const DEFAULT_API_URL: &str = "https://api.github.com";
const API_VERSION: &str = "2022-11-28";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Tracker that calls the GitHub issues API with a token.
pub struct GithubApiTracker {
    client: Client,
    api_url: String,
    repo: String,
    token: String,
}

#[derive(Serialize)]
struct CreateIssueRequest<'a> {
    title: &'a str,
    body: &'a str,
    labels: &'a [String],
}

#[derive(Serialize)]
struct StateRequest<'a> {
    state: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    state_reason: Option<&'a str>,
}

#[derive(Serialize)]
struct CommentRequest<'a> {
    body: &'a str,
}

#[derive(Deserialize)]
struct CreatedIssue {
    number: u64,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    message: String,
}

impl GithubApiTracker {
    /// Creates a client for `repo` (`owner/name`) under `api_url`.
    ///
    /// # Errors
    ///
    /// Returns an error when the repository or token is missing or
    /// malformed, or the HTTP client cannot be built.
    pub fn new(
        api_url: &str,
        repo: Option<&str>,
        token: Option<&str>,
    ) -> Result<Self, TrackerError> {
        let repo = repo.map(str::trim).filter(|r| !r.is_empty()).ok_or_else(|| {
            TrackerError::Configuration(
                "the github tracker needs a repository (--repo or TESTTRACK_REPO)".to_string(),
            )
        })?;
        if !is_valid_repo(repo) {
            return Err(TrackerError::Configuration(format!(
                "repository must look like owner/name, got `{repo}`"
            )));
        }
        let token = token.map(str::trim).filter(|t| !t.is_empty()).ok_or_else(|| {
            TrackerError::Configuration(
                "the github tracker needs a token (GITHUB_TOKEN or GH_TOKEN)".to_string(),
            )
        })?;
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("testtrack/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TrackerError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            repo: repo.to_string(),
            token: token.to_string(),
        })
    }

    fn repo_url(&self) -> String {
        format!("{}/repos/{}", self.api_url, self.repo)
    }

    fn issue_url(&self, number: u64) -> String {
        format!("{}/issues/{number}", self.repo_url())
    }

    async fn send(&self, request: RequestBuilder) -> Result<String, TrackerError> {
        let response = request
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
            .send()
            .await
            .map_err(|e| TrackerError::Unavailable(format!("GitHub API request failed: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| TrackerError::Io(format!("failed to read GitHub API response: {e}")))?;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorBody>(&text)
                .map(|e| e.message)
                .unwrap_or(text);
            return Err(TrackerError::Api { status: status.as_u16(), message });
        }
        Ok(text)
    }

    /// Changes the issue state, then comments without failing the call.
    ///
    /// Once the state has changed the issue number is returned even if
    /// the comment cannot be posted, so the caller records the new state.
    async fn transition(
        &self,
        number: u64,
        state: &str,
        state_reason: Option<&str>,
        comment: Option<&str>,
    ) -> Result<u64, TrackerError> {
        self.set_state(number, state, state_reason).await?;
        if let Err(err) = self.comment(number, comment).await {
            warn!(issue = number, state, "issue state changed but the comment failed: {err}");
        }
        Ok(number)
    }

    async fn comment(&self, number: u64, body: Option<&str>) -> Result<(), TrackerError> {
        let Some(body) = body.filter(|b| !b.trim().is_empty()) else {
            return Ok(());
        };
        let url = format!("{}/comments", self.issue_url(number));
        self.send(self.client.post(url).json(&CommentRequest { body })).await?;
        Ok(())
    }

    async fn set_state(
        &self,
        number: u64,
        state: &str,
        state_reason: Option<&str>,
    ) -> Result<(), TrackerError> {
        let request = StateRequest { state, state_reason };
        self.send(self.client.patch(self.issue_url(number)).json(&request)).await?;
        Ok(())
    }
}

fn is_valid_repo(repo: &str) -> bool {
    let mut parts = repo.split('/');
    matches!(
        (parts.next(), parts.next(), parts.next()),
        (Some(owner), Some(name), None) if !owner.is_empty() && !name.is_empty()
    )
}

impl IssueTracker for GithubApiTracker {
    fn is_available(&self) -> AvailabilityFuture<'_> {
        Box::pin(async move {
            match self.send(self.client.get(self.repo_url())).await {
                Ok(_) => true,
                Err(err) => {
                    debug!("GitHub API is not usable: {err}");
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
            let url = format!("{}/issues", self.repo_url());
            let request = CreateIssueRequest { title, body, labels };
            let text = self.send(self.client.post(url).json(&request)).await?;
            let created: CreatedIssue = serde_json::from_str(&text).map_err(|e| {
                TrackerError::InvalidResponse(format!("failed to parse created issue: {e}"))
            })?;
            Ok(created.number)
        })
    }

    fn close_issue<'a>(&'a self, number: u64, comment: Option<&'a str>) -> TrackerFuture<'a> {
        Box::pin(self.transition(number, "closed", Some("completed"), comment))
    }

    fn reopen_issue<'a>(&'a self, number: u64, comment: Option<&'a str>) -> TrackerFuture<'a> {
        Box::pin(self.transition(number, "open", None, comment))
    }
}
