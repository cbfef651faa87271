//! `testtrack status` command.

use crate::config::Config;
use crate::context::ServiceContext;
use crate::mapping::IssueStatus;
use crate::store::MappingStore;

/// Execute the `status` command.
///
/// Displays a table of tracked tests showing issue number, state, last
/// failure time, and test name.
///
/// # Errors
///
/// Currently infallible: an unreadable database is listed as empty.
pub fn run(ctx: &ServiceContext, config: &Config, open_only: bool) -> Result<(), String> {
    let store = MappingStore::open(ctx.fs.as_ref(), ctx.clock.as_ref(), &config.db_path);
    print!("{}", render(&store, open_only));
    Ok(())
}

fn render(store: &MappingStore<'_>, open_only: bool) -> String {
    let mut rows: Vec<(u64, String, String, String)> = store
        .all_entries()
        .filter(|(_, m)| m.has_issue() && (!open_only || m.status == IssueStatus::Open))
        .map(|(id, m)| {
            (
                m.issue_number,
                m.status.to_string(),
                m.last_failure_at.format("%Y-%m-%d %H:%M").to_string(),
                m.test_name.clone().unwrap_or_else(|| id.short().to_string()),
            )
        })
        .collect();
    if rows.is_empty() {
        return format!("No tracked tests in {}.\n", store.path().display());
    }
    rows.sort_by_key(|row| row.0);

    // Calculate column widths.
    let issue_width = rows.iter().map(|r| r.0.to_string().len() + 1).max().unwrap_or(5).max(5);
    let status_width = rows.iter().map(|r| r.1.len()).max().unwrap_or(6).max(6);
    let failure_width = rows.iter().map(|r| r.2.len()).max().unwrap_or(12).max(12);

    let mut out = format!(
        "{:<issue_width$}  {:<status_width$}  {:<failure_width$}  TEST\n",
        "ISSUE", "STATUS", "LAST FAILURE",
    );
    out.push_str(&format!(
        "{:-<issue_width$}  {:-<status_width$}  {:-<failure_width$}  ----\n",
        "", "", "",
    ));
    for (number, status, failure, name) in &rows {
        let issue = format!("#{number}");
        out.push_str(&format!(
            "{issue:<issue_width$}  {status:<status_width$}  {failure:<failure_width$}  {name}\n"
        ));
    }
    out.push_str(&format!("\n{} test(s) tracked.\n", rows.len()));
    out
}
