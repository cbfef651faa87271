//! Clock port for stamping mapping records.

use chrono::{DateTime, Utc};

/// Provides the current time.
///
/// Every `lastFailure` / `lastUpdate` stamp is taken through this port so
/// tests can pin time and assert exact timestamps.
pub trait Clock: Send + Sync {
    /// Returns the current UTC time.
    fn now(&self) -> DateTime<Utc>;
}
