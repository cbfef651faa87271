//! `testtrack check` command.

use crate::config::Config;
use crate::context::ServiceContext;

/// Execute the `check` command.
///
/// # Errors
///
/// Returns an error string when the configured tracker is unavailable.
pub async fn run(ctx: &ServiceContext, config: &Config) -> Result<(), String> {
    println!("{}", describe(ctx, config).await?);
    Ok(())
}

async fn describe(ctx: &ServiceContext, config: &Config) -> Result<String, String> {
    let kind = config.tracker.kind;
    let target = config
        .tracker
        .repo
        .as_deref()
        .map(|repo| format!(" for {repo}"))
        .unwrap_or_default();
    if ctx.issues.is_available().await {
        Ok(format!("{kind} tracker{target} is available."))
    } else {
        Err(format!("{kind} tracker{target} is unavailable; issue tracking will be skipped."))
    }
}
