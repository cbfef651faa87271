//! Stable fingerprints for individual tests.
//!
//! A test is identified by its file path and its full name (suite
//! ancestry included). The fingerprint is a SHA-256 digest over a
//! length-prefixed encoding of both, so no choice of path or name can
//! make two different pairs collide by concatenation.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Separator placed between suite ancestors and the test title.
pub const NAME_SEPARATOR: &str = " › ";

/// Opaque, deterministic identity of a test (64 lower-case hex chars).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TestIdentity(String);

impl TestIdentity {
    /// Wraps an identity string read back from storage.
    #[must_use]
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Returns the identity as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns a short prefix suitable for console output.
    #[must_use]
    pub fn short(&self) -> &str {
        self.0.get(..12).unwrap_or(&self.0)
    }
}

impl fmt::Display for TestIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Computes the identity of the test named `test_name` in `test_file_path`.
#[must_use]
pub fn identify(test_file_path: &str, test_name: &str) -> TestIdentity {
    let mut hasher = Sha256::new();
    for part in [test_file_path, test_name] {
        hasher.update((part.len() as u64).to_be_bytes());
        hasher.update(part.as_bytes());
    }
    let digest = hasher.finalize();
    TestIdentity(digest.iter().map(|byte| format!("{byte:02x}")).collect())
}

/// Returns the leaf test name, without its ancestor suites.
///
/// `"Parser › handles empty input"` becomes `"handles empty input"`.
/// Names without a separator are returned unchanged.
#[must_use]
pub fn describe(test_name: &str) -> String {
    match test_name.rsplit_once('›') {
        Some((_, leaf)) => leaf.trim().to_string(),
        None => test_name.to_string(),
    }
}
