//! Integration tests for top-level CLI behavior.

use std::path::Path;
use std::process::{Command, Output};

use serde_json::Value;

const ENV_VARS: [&str; 12] = [
    "TESTTRACK_GENERATE_ISSUES",
    "TESTTRACK_TRACK_ISSUES",
    "TESTTRACK_REOPEN_ON",
    "TESTTRACK_DB_PATH",
    "TESTTRACK_TRACKER",
    "TESTTRACK_REPO",
    "TESTTRACK_LABELS",
    "TESTTRACK_API_URL",
    "TESTTRACK_LOCAL_TRACKER_PATH",
    "TESTTRACK_MAX_CONCURRENCY",
    "GITHUB_TOKEN",
    "GH_TOKEN",
];

fn run_testtrack(dir: &Path, args: &[&str]) -> Output {
    run_with_env(dir, &[], args)
}

fn run_with_env(dir: &Path, env: &[(&str, &str)], args: &[&str]) -> Output {
    let bin = env!("CARGO_BIN_EXE_testtrack");
    let mut command = Command::new(bin);
    command.current_dir(dir).args(args);
    for var in ENV_VARS {
        command.env_remove(var);
    }
    command.envs(env.iter().copied());
    command.output().expect("failed to run testtrack binary")
}

fn write_results(dir: &Path, status: &str) {
    let failures: Vec<&str> = if status == "failed" {
        vec!["Error: expected 90, got 100\n    at cart.test.ts:12:7"]
    } else {
        Vec::new()
    };
    let report = serde_json::json!({
        "testResults": [{
            "name": dir.join("src/cart.test.ts"),
            "assertionResults": [
                {
                    "ancestorTitles": ["Cart"],
                    "title": "applies discounts",
                    "status": status,
                    "failureMessages": failures,
                    "duration": 8
                },
                {
                    "ancestorTitles": ["Cart"],
                    "title": "is pending",
                    "status": "pending",
                    "failureMessages": []
                }
            ]
        }]
    });
    std::fs::write(dir.join("results.json"), report.to_string()).unwrap();
}

fn read_json(path: &Path) -> Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn local_tracker_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let report =
        ["--tracker", "local", "report", "results.json", "--generate-issues", "--track-issues"];

    write_results(dir.path(), "failed");
    let output = run_testtrack(dir.path(), &report);
    assert!(output.status.success(), "{output:?}");
    assert!(stdout(&output).contains("OPENED #1: Cart › applies discounts"));

    let mappings = read_json(&dir.path().join(".testtrack/mappings.json"));
    let entries = mappings["testIdentifiers"].as_object().unwrap();
    assert_eq!(entries.len(), 1);
    let entry = entries.values().next().unwrap();
    assert_eq!(entry["issueNumber"], 1);
    assert_eq!(entry["status"], "open");
    assert_eq!(entry["testFilePath"], "src/cart.test.ts");

    write_results(dir.path(), "passed");
    let output = run_testtrack(dir.path(), &report);
    assert!(output.status.success());
    assert!(stdout(&output).contains("CLOSED #1"));
    let issues = read_json(&dir.path().join(".testtrack/issues.json"));
    assert_eq!(issues["issues"]["1"]["state"], "closed");

    write_results(dir.path(), "failed");
    let output = run_testtrack(dir.path(), &report);
    assert!(stdout(&output).contains("REOPENED #1"));
    let issues = read_json(&dir.path().join(".testtrack/issues.json"));
    assert_eq!(issues["nextNumber"], 2);
    assert_eq!(issues["issues"]["1"]["state"], "open");

    let output = run_testtrack(dir.path(), &["--tracker", "local", "status", "--open"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("#1"));
}

#[test]
fn report_without_flags_changes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    write_results(dir.path(), "failed");

    let output = run_testtrack(dir.path(), &["--tracker", "local", "report", "results.json"]);

    assert!(output.status.success());
    assert!(stdout(&output).contains("Issue tracking disabled."));
    assert!(!dir.path().join(".testtrack").exists());
}

#[test]
fn unavailable_tracker_does_not_fail_the_build() {
    let dir = tempfile::tempdir().unwrap();
    write_results(dir.path(), "failed");

    let missing_gh = dir.path().join("no-such-gh");

    let output = run_with_env(
        dir.path(),
        &[("TESTTRACK_GH_BIN", missing_gh.to_str().unwrap())],
        &["--tracker", "gh", "report", "results.json", "--generate-issues"],
    );

    assert!(output.status.success());
    assert!(stdout(&output).contains("unavailable"));
    assert!(!dir.path().join(".testtrack/mappings.json").exists());
}

#[test]
fn config_file_enables_tracking() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join(".testtrack.yaml"),
        "generate_issues: true\ntracker: local\nlabels: [flaky]\n",
    )
    .unwrap();
    write_results(dir.path(), "failed");

    let output = run_testtrack(dir.path(), &["report", "results.json"]);

    assert!(output.status.success(), "{output:?}");
    let issues = read_json(&dir.path().join(".testtrack/issues.json"));
    assert_eq!(issues["issues"]["1"]["labels"][0], "flaky");
}

#[test]
fn missing_results_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_testtrack(dir.path(), &["--tracker", "local", "report", "missing.json"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("missing.json"));
}

#[test]
fn invalid_env_value_fails() {
    let dir = tempfile::tempdir().unwrap();
    write_results(dir.path(), "failed");
    let output = run_with_env(
        dir.path(),
        &[("TESTTRACK_GENERATE_ISSUES", "sometimes")],
        &["--tracker", "local", "report", "results.json"],
    );
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("TESTTRACK_GENERATE_ISSUES"));
}

#[test]
fn check_reports_local_tracker() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_testtrack(dir.path(), &["--tracker", "local", "check"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("local tracker is available."));
}
