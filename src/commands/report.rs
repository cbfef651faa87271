//! `testtrack report` command.

use std::path::Path;

use tracing::info;

use crate::config::Config;
use crate::context::ServiceContext;
use crate::lifecycle::{format_report, BatchReport, LifecycleManager};
use crate::reporter::{parse_report, Reporter};

/// Execute the `report` command.
///
/// Tracker failures are logged and summarized but never fail the command.
///
/// # Errors
///
/// Returns an error string if the results file cannot be read or parsed.
pub async fn run(ctx: &ServiceContext, config: &Config, results_path: &Path) -> Result<(), String> {
    let root = std::env::current_dir().ok();
    let report = execute(ctx, config, results_path, root.as_deref()).await?;
    println!("{}", format_report(&report));
    Ok(())
}

/// Feeds every result in `results_path` through a reporter for one run.
///
/// # Errors
///
/// Returns an error string if the results file cannot be read or parsed.
pub async fn execute(
    ctx: &ServiceContext,
    config: &Config,
    results_path: &Path,
    root: Option<&Path>,
) -> Result<BatchReport, String> {
    let json = ctx
        .fs
        .read_to_string(results_path)
        .map_err(|e| format!("failed to read {}: {e}", results_path.display()))?;
    let results =
        parse_report(&json).map_err(|e| format!("{}: {e}", results_path.display()))?;

    let manager = LifecycleManager::new(ctx, &config.db_path, config.tracking_options());
    let mut reporter = Reporter::new(manager, root);
    reporter.on_run_start().await;
    for result in &results {
        reporter.on_test_result(result);
    }
    info!(total = results.len(), kept = reporter.pending().len(), "processing test results");
    Ok(reporter.on_run_complete().await)
}
