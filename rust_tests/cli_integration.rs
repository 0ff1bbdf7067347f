//! CLI Integration Tests
//!
//! Spawns the bundled sample binary (suite1: pass/fail/segfault, suite2:
//! pass/stderr) and checks exit codes and both output formats.

use std::path::Path;
use std::process::{Command, Output, Stdio};
use std::time::Duration;
use tempfile::TempDir;
use wait_timeout::ChildExt;

const BIN: &str = env!("CARGO_BIN_EXE_forktest");

/// Run the sample binary from `dir` (so no stray forktest.toml is picked up)
fn run_in(dir: &Path, args: &[&str]) -> Output {
    let mut child = Command::new(BIN)
        .args(args)
        .current_dir(dir)
        .env_remove("FORKTEST_FORMAT")
        .env_remove("FORKTEST_JUNIT_XML")
        .env_remove("FORKTEST_LOG")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to spawn forktest binary");

    match child.wait_timeout(Duration::from_secs(60)).unwrap() {
        Some(_) => child.wait_with_output().unwrap(),
        None => {
            child.kill().unwrap();
            panic!("forktest binary did not finish: {:?}", args);
        }
    }
}

fn run(args: &[&str]) -> (TempDir, Output) {
    let dir = TempDir::new().unwrap();
    let output = run_in(dir.path(), args);
    (dir, output)
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn test_list_shows_registered_suites() {
    let (_dir, output) = run(&["list"]);
    assert_eq!(output.status.code(), Some(0));

    let out = stdout(&output);
    assert!(out.starts_with("suite1 (3 tests)\n"), "got: {}", out);
    assert!(out.contains("  suite1_test3\n"));
    assert!(out.contains("suite2 (2 tests)\n"));
}

#[test]
fn test_human_report_tree() {
    let (_dir, output) = run(&["--no-color"]);
    // Failing tests do not change the exit status of a completed run
    assert_eq!(output.status.code(), Some(0));

    let out = stdout(&output);
    assert!(out.contains("\t1) suite1 (1/3)"), "got: {}", out);
    assert!(out.contains("\t\t1.1) suite1_test1 -> PASSED"));
    assert!(out.contains("\t\t1.2) suite1_test2 -> FAILED"));
    assert!(out.contains("\t\t1.3) suite1_test3 -> FAILED"));
    assert!(out.contains("\t\t\tsignal `SIGSEGV` terminated test"));
    assert!(out.contains("\t2) suite2 (2/2)"));
    assert!(out.contains("\t\t\tOutput this in summary"));
}

#[test]
fn test_json_report_is_ndjson() {
    let (_dir, output) = run(&["-f", "json", "--timeout-ms", "5000"]);
    assert_eq!(output.status.code(), Some(0));

    let out = stdout(&output);
    let events: Vec<serde_json::Value> = out
        .lines()
        .map(|line| serde_json::from_str(line).expect("stdout must be pure NDJSON"))
        .collect();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["event"], "run_start");
    assert_eq!(events[0]["tests"], 5);

    let finished = &events[1];
    assert_eq!(finished["event"], "run_finished");
    assert_eq!(finished["passed"], 3);
    assert_eq!(finished["failed"], 2);

    let suite1 = &finished["result"]["suites"][0];
    assert_eq!(suite1["name"], "suite1");
    assert_eq!(suite1["tests_passed"], 1);
    assert_eq!(suite1["tests_total"], 3);
    assert_eq!(suite1["results"][2]["status"]["kind"], "signaled");
}

#[test]
fn test_unknown_suite_is_config_error() {
    let (_dir, output) = run(&["-s", "nope"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(!stdout(&output).contains("suite1"));
}

#[test]
fn test_suite_filter_selects_tests() {
    let (_dir, output) = run(&["--no-color", "--suite", "suite1=suite1_test1"]);
    assert_eq!(output.status.code(), Some(0));

    let out = stdout(&output);
    assert!(out.contains("\t1) suite1 (1/1)"), "got: {}", out);
    assert!(!out.contains("suite2"));
}

#[test]
fn test_parallel_jobs_keep_order() {
    let (_dir, output) = run(&["-f", "json", "-j", "2"]);
    assert_eq!(output.status.code(), Some(0));

    let out = stdout(&output);
    let finished: serde_json::Value = serde_json::from_str(out.lines().last().unwrap()).unwrap();
    assert_eq!(finished["result"]["suites"][0]["name"], "suite1");
    assert_eq!(finished["result"]["suites"][1]["name"], "suite2");
}

#[test]
fn test_junit_xml_written() {
    let dir = TempDir::new().unwrap();
    let report = dir.path().join("report.xml");
    let output = run_in(
        dir.path(),
        &["--no-color", "--junit-xml", report.to_str().unwrap()],
    );
    assert_eq!(output.status.code(), Some(0));

    let xml = std::fs::read_to_string(&report).unwrap();
    assert!(xml.contains("<testsuites tests=\"5\" failures=\"2\">"), "got: {}", xml);
    assert!(xml.contains("<testsuite name=\"suite2\""));
}

#[test]
fn test_config_file_sets_format() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("forktest.toml"), "format = \"json\"\n").unwrap();
    let output = run_in(dir.path(), &[]);
    assert_eq!(output.status.code(), Some(0));

    let first = stdout(&output).lines().next().unwrap().to_string();
    assert!(first.contains("\"event\":\"run_start\""), "got: {}", first);
}

#[test]
fn test_malformed_config_file_exits_2() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("forktest.toml"), "jobs = \"many\"\n").unwrap();
    let output = run_in(dir.path(), &[]);
    assert_eq!(output.status.code(), Some(2));
}
