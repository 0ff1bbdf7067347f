//! JUnit XML Reporter for CI Integration
//!
//! Generates JUnit-compatible XML reports for Jenkins, GitLab CI, and GitHub Actions.
//! One `<testsuite>` per suite result, captured stderr in `<system-err>`.

use crate::reporter::Reporter;
use crate::results::{RunResult, SuiteResult, TestResult};
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

/// Strip ANSI color codes and null bytes from strings
fn strip_ansi_codes(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\x1b' {
            if chars.peek() == Some(&'[') {
                chars.next();
                // Skip until the final letter of the sequence
                while let Some(&next) = chars.peek() {
                    chars.next();
                    if next.is_ascii_alphabetic() {
                        break;
                    }
                }
            }
        } else if c != '\0' {
            result.push(c);
        }
    }
    result
}

// =============================================================================
// XML Schema Structs (JUnit Format)
// =============================================================================

#[derive(Serialize)]
#[serde(rename = "testsuites")]
struct TestSuites {
    #[serde(rename = "@tests")]
    tests: usize,
    #[serde(rename = "@failures")]
    failures: usize,
    #[serde(rename = "testsuite")]
    suites: Vec<TestSuite>,
}

#[derive(Serialize)]
struct TestSuite {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "@tests")]
    tests: usize,
    #[serde(rename = "@failures")]
    failures: usize,
    #[serde(rename = "@errors")]
    errors: usize,
    #[serde(rename = "@time")]
    time: f64,
    #[serde(rename = "testcase")]
    cases: Vec<TestCase>,
}

#[derive(Serialize)]
struct TestCase {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "@classname")]
    classname: String,
    #[serde(rename = "@time")]
    time: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    failure: Option<Failure>,
    #[serde(rename = "system-err", skip_serializing_if = "Option::is_none")]
    system_err: Option<String>,
}

#[derive(Serialize)]
struct Failure {
    #[serde(rename = "@message")]
    message: String,
    #[serde(rename = "$text")]
    body: String,
}

impl TestCase {
    fn from_result(suite: &str, result: &TestResult) -> Self {
        let failure = if result.passed() {
            None
        } else {
            let reason = result.reason.as_deref().unwrap_or("test failed");
            let reason = strip_ansi_codes(reason);
            Some(Failure {
                message: reason.clone(),
                body: reason,
            })
        };

        Self {
            name: result.name.clone(),
            classname: suite.to_string(),
            time: result.duration_ms as f64 / 1000.0,
            failure,
            system_err: result
                .output
                .as_ref()
                .map(|o| strip_ansi_codes(&o.to_string_lossy())),
        }
    }
}

impl TestSuite {
    fn from_result(suite: &SuiteResult) -> Self {
        let cases: Vec<TestCase> = suite
            .results
            .iter()
            .map(|r| TestCase::from_result(&suite.name, r))
            .collect();
        Self {
            name: suite.name.clone(),
            tests: suite.tests_total,
            failures: suite.tests_failed(),
            errors: 0,
            time: cases.iter().map(|c| c.time).sum(),
            cases,
        }
    }
}

/// Render a run result as a JUnit XML document
pub fn render(run: &RunResult) -> Result<String> {
    let root = TestSuites {
        tests: run.tests_total(),
        failures: run.tests_failed(),
        suites: run.suites.iter().map(TestSuite::from_result).collect(),
    };
    let xml = quick_xml::se::to_string(&root).context("Failed to serialize JUnit report")?;
    Ok(format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{}", xml))
}

// =============================================================================
// JunitReporter
// =============================================================================

/// Reporter that writes JUnit XML once the run finishes
pub struct JunitReporter {
    output_path: PathBuf,
}

impl JunitReporter {
    pub fn new(path: PathBuf) -> Self {
        Self { output_path: path }
    }

    fn write(&self, run: &RunResult) -> Result<()> {
        let xml = render(run)?;
        let file = File::create(&self.output_path).with_context(|| {
            format!("Failed to create JUnit report {}", self.output_path.display())
        })?;
        let mut writer = BufWriter::new(file);
        writer.write_all(xml.as_bytes())?;
        writer.flush()?;
        Ok(())
    }
}

impl Reporter for JunitReporter {
    fn on_run_start(&mut self, _suites: usize, _tests: usize) {
        // JUnit has no start event - the document is written at the end
    }

    fn on_run_finished(&mut self, run: &RunResult) {
        match self.write(run) {
            Ok(()) => eprintln!(
                "[forktest] JUnit report written to {}",
                self.output_path.display()
            ),
            Err(e) => eprintln!("[forktest] {:#}", e),
        }
    }

    fn on_error(&mut self, message: &str) {
        eprintln!(
            "[forktest] JUnit report {} not written: {}",
            self.output_path.display(),
            message
        );
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture;
    use crate::outcome::TerminationStatus;
    use std::io::Cursor;
    use tempfile::TempDir;

    fn sample_run() -> RunResult {
        let mut suite = SuiteResult::new("suite1");
        suite.push(TestResult::new(
            "passes",
            TerminationStatus::Exited { code: 0 },
            None,
            1500,
        ));
        suite.push(TestResult::new(
            "crashes",
            TerminationStatus::Signaled {
                signal: libc::SIGSEGV,
                core_dumped: false,
            },
            capture::drain(Cursor::new(b"\x1b[31mboom\x1b[0m".to_vec())),
            20,
        ));
        RunResult {
            suites: vec![suite],
        }
    }

    #[test]
    fn test_strip_ansi_codes() {
        assert_eq!(strip_ansi_codes("\x1b[31mRed text\x1b[0m"), "Red text");
        assert_eq!(strip_ansi_codes("plain text"), "plain text");
        assert_eq!(strip_ansi_codes("\x1b[1m\x1b[31mBold Red\x1b[0m"), "Bold Red");
    }

    #[test]
    fn test_strip_null_bytes() {
        assert_eq!(strip_ansi_codes("text\0with\0nulls"), "textwithnulls");
    }

    #[test]
    fn test_strip_ansi_complex_escape_sequences() {
        let input = "\x1b[1;31;40mColored\x1b[0m normal";
        assert_eq!(strip_ansi_codes(input), "Colored normal");
    }

    #[test]
    fn test_case_from_failed_result() {
        let run = sample_run();
        let case = TestCase::from_result("suite1", &run.suites[0].results[1]);
        assert_eq!(case.classname, "suite1");
        let failure = case.failure.unwrap();
        assert_eq!(failure.message, "signal `SIGSEGV` terminated test");
        assert_eq!(case.system_err.as_deref(), Some("boom"));
    }

    #[test]
    fn test_time_conversion() {
        let run = sample_run();
        let case = TestCase::from_result("suite1", &run.suites[0].results[0]);
        assert!((case.time - 1.5).abs() < 0.001);
        assert!(case.failure.is_none());
        assert!(case.system_err.is_none());
    }

    #[test]
    fn test_render_document() {
        let xml = render(&sample_run()).unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains("<testsuite name=\"suite1\" tests=\"2\" failures=\"1\""));
        assert!(xml.contains("<testcase name=\"crashes\""));
        assert!(xml.contains("<system-err>boom</system-err>"));
    }

    #[test]
    fn test_reporter_writes_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("report.xml");
        let mut reporter = JunitReporter::new(path.clone());

        reporter.on_run_start(1, 2);
        reporter.on_run_finished(&sample_run());

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("<testsuites tests=\"2\" failures=\"1\">"));
    }

    #[test]
    fn test_error_leaves_no_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("report.xml");
        let mut reporter = JunitReporter::new(path.clone());
        reporter.on_error("fork failed");
        assert!(!path.exists());
    }
}
