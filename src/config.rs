//! Run configuration.
//!
//! Every setting is resolved once at startup. Precedence, highest first:
//! command-line flag, environment variable, YAML config file, default.
//!
//! ```yaml
//! # .testtrack.yaml
//! generate_issues: true
//! track_issues: true
//! reopen_on: either
//! tracker: github
//! repo: acme/widgets
//! labels: [test-failure]
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::adapters::live::issues::github_api::DEFAULT_API_URL;
use crate::lifecycle::{ReopenPolicy, TrackingOptions, DEFAULT_MAX_CONCURRENCY};
use crate::ports::FileSystem;

/// Config file looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = ".testtrack.yaml";
/// Default location of the mapping database.
pub const DEFAULT_DB_PATH: &str = ".testtrack/mappings.json";
/// Default location of the local tracker's issue file.
pub const DEFAULT_LOCAL_TRACKER_PATH: &str = ".testtrack/issues.json";

const ENV_GENERATE_ISSUES: &str = "TESTTRACK_GENERATE_ISSUES";
const ENV_TRACK_ISSUES: &str = "TESTTRACK_TRACK_ISSUES";
const ENV_REOPEN_ON: &str = "TESTTRACK_REOPEN_ON";
const ENV_DB_PATH: &str = "TESTTRACK_DB_PATH";
const ENV_TRACKER: &str = "TESTTRACK_TRACKER";
const ENV_REPO: &str = "TESTTRACK_REPO";
const ENV_LABELS: &str = "TESTTRACK_LABELS";
const ENV_API_URL: &str = "TESTTRACK_API_URL";
const ENV_LOCAL_TRACKER_PATH: &str = "TESTTRACK_LOCAL_TRACKER_PATH";
const ENV_MAX_CONCURRENCY: &str = "TESTTRACK_MAX_CONCURRENCY";
const ENV_TOKENS: [&str; 2] = ["GITHUB_TOKEN", "GH_TOKEN"];

/// Invalid configuration. These are the only errors that abort a run.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A setting had a value that could not be used.
    #[error("invalid value `{value}` for {key}: {reason}")]
    Invalid {
        /// Flag, variable, or file key that carried the value.
        key: String,
        /// The rejected value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },
    /// The config file could not be read.
    #[error("failed to read config file {}: {message}", .path.display())]
    Read {
        /// The config file.
        path: PathBuf,
        /// The underlying error message.
        message: String,
    },
    /// The config file is not valid YAML for this schema.
    #[error("config file {} is invalid: {message}", .path.display())]
    Parse {
        /// The config file.
        path: PathBuf,
        /// The YAML error.
        message: String,
    },
}

/// Which issue tracker backs the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TrackerKind {
    /// The `gh` command-line client.
    #[default]
    Gh,
    /// The GitHub REST API.
    Github,
    /// A JSON file on disk.
    Local,
}

impl fmt::Display for TrackerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gh => f.write_str("gh"),
            Self::Github => f.write_str("github"),
            Self::Local => f.write_str("local"),
        }
    }
}

impl FromStr for TrackerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gh" => Ok(Self::Gh),
            "github" => Ok(Self::Github),
            "local" => Ok(Self::Local),
            other => Err(format!("unknown tracker `{other}` (expected gh, github, or local)")),
        }
    }
}

/// Resolved tracker connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerSettings {
    /// Selected tracker.
    pub kind: TrackerKind,
    /// `owner/name` of the repository, if set.
    pub repo: Option<String>,
    /// API token for the REST tracker.
    pub token: Option<String>,
    /// REST API base URL.
    pub api_url: String,
    /// Issue file for the local tracker.
    pub local_path: PathBuf,
}

/// Fully resolved configuration for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Open issues for newly failing tests.
    pub generate_issues: bool,
    /// Close issues when tests pass again.
    pub track_issues: bool,
    /// Gate for reopening closed issues.
    pub reopen_policy: ReopenPolicy,
    /// Labels applied to new issues.
    pub labels: Vec<String>,
    /// Cap on concurrent tracker calls.
    pub max_concurrency: usize,
    /// Mapping database location.
    pub db_path: PathBuf,
    /// Tracker selection and credentials.
    pub tracker: TrackerSettings,
}

/// Values given on the command line; `None` means not given.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    /// `--generate-issues`
    pub generate_issues: Option<bool>,
    /// `--track-issues`
    pub track_issues: Option<bool>,
    /// `--reopen-on`
    pub reopen_policy: Option<ReopenPolicy>,
    /// `--label`, replacing other sources when non-empty.
    pub labels: Vec<String>,
    /// `--db`
    pub db_path: Option<PathBuf>,
    /// `--tracker`
    pub tracker: Option<TrackerKind>,
    /// `--repo`
    pub repo: Option<String>,
}

/// Contents of the YAML config file. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    /// Open issues for newly failing tests.
    pub generate_issues: Option<bool>,
    /// Close issues when tests pass again.
    pub track_issues: Option<bool>,
    /// Reopen gate.
    pub reopen_on: Option<ReopenPolicy>,
    /// Labels for new issues.
    pub labels: Option<Vec<String>>,
    /// Mapping database location.
    pub db_path: Option<PathBuf>,
    /// Tracker selection.
    pub tracker: Option<TrackerKind>,
    /// `owner/name` of the repository.
    pub repo: Option<String>,
    /// REST API base URL.
    pub api_url: Option<String>,
    /// Issue file for the local tracker.
    pub local_tracker_path: Option<PathBuf>,
    /// Cap on concurrent tracker calls.
    pub max_concurrency: Option<usize>,
}

impl FileConfig {
    /// Reads the config file at `path`.
    ///
    /// A missing file yields the empty config unless `required` is set.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is required but missing, unreadable,
    /// or not valid YAML.
    pub fn load(fs: &dyn FileSystem, path: &Path, required: bool) -> Result<Self, ConfigError> {
        if !fs.exists(path) {
            if required {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    message: "file not found".to_string(),
                });
            }
            debug!(path = %path.display(), "no config file");
            return Ok(Self::default());
        }
        let contents = fs
            .read_to_string(path)
            .map_err(|e| ConfigError::Read { path: path.to_path_buf(), message: e.to_string() })?;
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&contents)
            .map_err(|e| ConfigError::Parse { path: path.to_path_buf(), message: e.to_string() })
    }
}

impl Config {
    /// Merges command-line overrides, the environment, and the config file.
    ///
    /// `env` looks up a variable by name; empty values count as unset.
    ///
    /// # Errors
    ///
    /// Returns an error if an environment value cannot be parsed or the
    /// concurrency limit is zero.
    pub fn resolve(
        overrides: &Overrides,
        file: &FileConfig,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let lookup = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let generate_issues = match overrides.generate_issues {
            Some(value) => value,
            None => parsed(&lookup, ENV_GENERATE_ISSUES, parse_bool)?
                .or(file.generate_issues)
                .unwrap_or(false),
        };
        let track_issues = match overrides.track_issues {
            Some(value) => value,
            None => parsed(&lookup, ENV_TRACK_ISSUES, parse_bool)?
                .or(file.track_issues)
                .unwrap_or(false),
        };
        let reopen_policy = match overrides.reopen_policy {
            Some(policy) => policy,
            None => parsed(&lookup, ENV_REOPEN_ON, ReopenPolicy::from_str)?
                .or(file.reopen_on)
                .unwrap_or_default(),
        };
        let labels = if overrides.labels.is_empty() {
            lookup(ENV_LABELS)
                .map(|raw| split_labels(&raw))
                .or_else(|| file.labels.clone())
                .unwrap_or_default()
        } else {
            overrides.labels.clone()
        };
        let max_concurrency = parsed(&lookup, ENV_MAX_CONCURRENCY, |s| {
            s.trim().parse::<usize>().map_err(|e| e.to_string())
        })?
        .or(file.max_concurrency)
        .unwrap_or(DEFAULT_MAX_CONCURRENCY);
        if max_concurrency == 0 {
            return Err(ConfigError::Invalid {
                key: "max_concurrency".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        let db_path = overrides
            .db_path
            .clone()
            .or_else(|| lookup(ENV_DB_PATH).map(PathBuf::from))
            .or_else(|| file.db_path.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH));

        let kind = match overrides.tracker {
            Some(kind) => kind,
            None => parsed(&lookup, ENV_TRACKER, TrackerKind::from_str)?
                .or(file.tracker)
                .unwrap_or_default(),
        };
        let tracker = TrackerSettings {
            kind,
            repo: overrides.repo.clone().or_else(|| lookup(ENV_REPO)).or_else(|| file.repo.clone()),
            token: ENV_TOKENS.iter().find_map(|key| lookup(key)),
            api_url: lookup(ENV_API_URL)
                .or_else(|| file.api_url.clone())
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            local_path: lookup(ENV_LOCAL_TRACKER_PATH)
                .map(PathBuf::from)
                .or_else(|| file.local_tracker_path.clone())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOCAL_TRACKER_PATH)),
        };

        Ok(Self {
            generate_issues,
            track_issues,
            reopen_policy,
            labels,
            max_concurrency,
            db_path,
            tracker,
        })
    }

    /// Loads the config file and resolves against the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file or any value is invalid.
    pub fn load(
        fs: &dyn FileSystem,
        overrides: &Overrides,
        config_path: Option<&Path>,
    ) -> Result<Self, ConfigError> {
        let file = match config_path {
            Some(path) => FileConfig::load(fs, path, true)?,
            None => FileConfig::load(fs, Path::new(DEFAULT_CONFIG_FILE), false)?,
        };
        Self::resolve(overrides, &file, |key| std::env::var(key).ok())
    }

    /// Lifecycle switches derived from this configuration.
    #[must_use]
    pub fn tracking_options(&self) -> TrackingOptions {
        TrackingOptions {
            create_issues: self.generate_issues,
            close_issues: self.track_issues,
            reopen_policy: self.reopen_policy,
            labels: self.labels.clone(),
            max_concurrency: self.max_concurrency,
        }
    }
}

fn parsed<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    parse: impl Fn(&str) -> Result<T, String>,
) -> Result<Option<T>, ConfigError> {
    lookup(key)
        .map(|value| {
            parse(&value).map_err(|reason| ConfigError::Invalid {
                key: key.to_string(),
                value: value.clone(),
                reason,
            })
        })
        .transpose()
}

fn split_labels(raw: &str) -> Vec<String> {
    raw.split(',').map(str::trim).filter(|l| !l.is_empty()).map(String::from).collect()
}

/// Parses a boolean setting (`true/false`, `1/0`, `yes/no`, `on/off`).
///
/// # Errors
///
/// Returns an error for anything else.
pub fn parse_bool(value: &str) -> Result<bool, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(format!("expected a boolean, got `{other}`")),
    }
}
