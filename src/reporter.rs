//! Reporter Module: Trait-based output for Human (CLI) and Machine (JSON) formats
//!
//! ## Architecture
//!
//! - `Reporter` trait defines the event callbacks
//! - `HumanReporter` prints the colorized suite/test tree to stdout
//! - `JsonReporter` outputs NDJSON to stdout (for --format=json)
//! - `MultiReporter` broadcasts to several reporters (e.g. plus JUnit)
//!
//! ## Stdout Purity
//!
//! When JsonReporter is active, ONLY valid JSON goes to stdout.
//! All other output (logs, errors, status lines) must go to stderr.

use crate::results::{RunResult, SuiteResult, TestResult};
use colored::Colorize;
use serde::Serialize;
use std::io::{self, Write};

/// Machine-readable events for JSON output
#[derive(Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MachineEvent<'a> {
    /// Emitted before the first test runs
    RunStart { suites: usize, tests: usize },
    /// Emitted once with the whole result tree
    RunFinished {
        passed: usize,
        failed: usize,
        result: &'a RunResult,
    },
    /// Emitted on fatal error
    Error { message: &'a str },
}

/// Reporter trait for output abstraction
pub trait Reporter {
    /// Called before the first suite runs
    fn on_run_start(&mut self, suites: usize, tests: usize);

    /// Called with the completed result tree
    fn on_run_finished(&mut self, run: &RunResult);

    /// Called on an engine-fatal error (no result tree follows)
    fn on_error(&mut self, message: &str);
}

// =============================================================================
// JsonReporter
// =============================================================================

/// JSON Reporter - outputs NDJSON to a writer (stdout by default)
pub struct JsonReporter<W: Write = io::Stdout> {
    out: W,
}

impl JsonReporter {
    pub fn stdout() -> Self {
        Self { out: io::stdout() }
    }
}

impl<W: Write> JsonReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, event: &MachineEvent<'_>) {
        match serde_json::to_string(event) {
            Ok(line) => {
                let _ = writeln!(self.out, "{}", line);
                let _ = self.out.flush();
            }
            Err(e) => eprintln!("[forktest] Failed to serialize event: {}", e),
        }
    }
}

impl<W: Write> Reporter for JsonReporter<W> {
    fn on_run_start(&mut self, suites: usize, tests: usize) {
        self.emit(&MachineEvent::RunStart { suites, tests });
    }

    fn on_run_finished(&mut self, run: &RunResult) {
        self.emit(&MachineEvent::RunFinished {
            passed: run.tests_passed(),
            failed: run.tests_failed(),
            result: run,
        });
    }

    fn on_error(&mut self, message: &str) {
        self.emit(&MachineEvent::Error { message });
    }
}

// =============================================================================
// HumanReporter
// =============================================================================

/// Human Reporter - numbered suite/test tree with reasons and captured stderr
///
/// ```text
///     1) suite1 (1/3)
///         1.1) suite1_test1 -> PASSED
///         1.2) suite1_test2 -> FAILED
///             test exited with status `1`
///             STDERR:
///             'WILL_BE_FIVE.load(Ordering::SeqCst) == 3' FAILED src/main.rs:24
/// ```
pub struct HumanReporter<W: Write = io::Stdout> {
    out: W,
}

impl HumanReporter {
    pub fn stdout() -> Self {
        Self { out: io::stdout() }
    }
}

impl<W: Write> HumanReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_suite(&mut self, number: usize, suite: &SuiteResult) -> io::Result<()> {
        let header = format!(
            "{}) {} ({}/{})",
            number, suite.name, suite.tests_passed, suite.tests_total
        );
        let header = if suite.all_passed() {
            header.green().bold()
        } else {
            header.red().bold()
        };
        writeln!(self.out, "\t{}", header)?;

        for (i, test) in suite.results.iter().enumerate() {
            self.write_test(number, i + 1, test)?;
        }
        Ok(())
    }

    fn write_test(&mut self, suite_number: usize, number: usize, test: &TestResult) -> io::Result<()> {
        let line = format!("{}.{}) {} -> {}", suite_number, number, test.name, test.verdict);
        let line = if test.passed() { line.green() } else { line.red() };
        writeln!(self.out, "\t\t{}", line)?;

        if let Some(reason) = &test.reason {
            writeln!(self.out, "\t\t\t{}", reason.bold())?;
        }

        if let Some(output) = &test.output {
            writeln!(self.out, "\t\t\t{}", "STDERR:".yellow().bold())?;
            for line in output.to_string_lossy().lines() {
                writeln!(self.out, "\t\t\t{}", line)?;
            }
        }
        Ok(())
    }

    fn write_run(&mut self, run: &RunResult) -> io::Result<()> {
        for (i, suite) in run.suites.iter().enumerate() {
            self.write_suite(i + 1, suite)?;
        }
        self.out.flush()
    }
}

impl<W: Write> Reporter for HumanReporter<W> {
    fn on_run_start(&mut self, suites: usize, tests: usize) {
        eprintln!("[forktest] Running {} tests in {} suites...\n", tests, suites);
    }

    fn on_run_finished(&mut self, run: &RunResult) {
        if let Err(e) = self.write_run(run) {
            eprintln!("[forktest] Failed to write report: {}", e);
        }
        eprintln!();
        eprintln!(
            "[forktest] {} passed, {} failed",
            run.tests_passed(),
            run.tests_failed()
        );
    }

    fn on_error(&mut self, message: &str) {
        eprintln!("[forktest] FATAL ERROR: {}", message);
    }
}

// =============================================================================
// MultiReporter
// =============================================================================

/// MultiReporter - broadcasts events to multiple reporters
pub struct MultiReporter {
    reporters: Vec<Box<dyn Reporter>>,
}

impl MultiReporter {
    pub fn new(reporters: Vec<Box<dyn Reporter>>) -> Self {
        Self { reporters }
    }
}

impl Reporter for MultiReporter {
    fn on_run_start(&mut self, suites: usize, tests: usize) {
        for r in &mut self.reporters {
            r.on_run_start(suites, tests);
        }
    }

    fn on_run_finished(&mut self, run: &RunResult) {
        for r in &mut self.reporters {
            r.on_run_finished(run);
        }
    }

    fn on_error(&mut self, message: &str) {
        for r in &mut self.reporters {
            r.on_error(message);
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture;
    use crate::outcome::TerminationStatus;
    use std::cell::RefCell;
    use std::io::Cursor;
    use std::rc::Rc;

    fn sample_run() -> RunResult {
        let mut suite = SuiteResult::new("suite1");
        suite.push(TestResult::new(
            "passes",
            TerminationStatus::Exited { code: 0 },
            None,
            1,
        ));
        suite.push(TestResult::new(
            "fails",
            TerminationStatus::Exited { code: 1 },
            capture::drain(Cursor::new(b"'x == 3' FAILED t.rs:1\n".to_vec())),
            2,
        ));
        RunResult {
            suites: vec![suite],
        }
    }

    #[test]
    fn test_json_event_serialization() {
        let run = sample_run();
        let event = MachineEvent::RunFinished {
            passed: run.tests_passed(),
            failed: run.tests_failed(),
            result: &run,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event\":\"run_finished\""));
        assert!(json.contains("\"passed\":1"));
        assert!(json.contains("\"tests_total\":2"));
        assert!(json.contains("test exited with status `1`"));
    }

    #[test]
    fn test_error_event() {
        let event = MachineEvent::Error {
            message: "failed to spawn isolated test process",
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event\":\"error\""));
    }

    #[test]
    fn test_json_reporter_writes_one_line_per_event() {
        let mut reporter = JsonReporter::new(Vec::new());
        reporter.on_run_start(1, 2);
        reporter.on_run_finished(&sample_run());
        let out = String::from_utf8(reporter.into_inner()).unwrap();

        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        for line in lines {
            serde_json::from_str::<serde_json::Value>(line).unwrap();
        }
    }

    #[test]
    fn test_human_reporter_tree() {
        colored::control::set_override(false);
        let mut reporter = HumanReporter::new(Vec::new());
        reporter.on_run_finished(&sample_run());
        let out = String::from_utf8(reporter.into_inner()).unwrap();

        assert!(out.contains("\t1) suite1 (1/2)"));
        assert!(out.contains("\t\t1.1) passes -> PASSED"));
        assert!(out.contains("\t\t1.2) fails -> FAILED"));
        assert!(out.contains("\t\t\ttest exited with status `1`"));
        assert!(out.contains("\t\t\tSTDERR:"));
        assert!(out.contains("\t\t\t'x == 3' FAILED t.rs:1"));
    }

    /// Reporter that records which callbacks fired
    struct Recording(Rc<RefCell<Vec<String>>>);

    impl Reporter for Recording {
        fn on_run_start(&mut self, suites: usize, tests: usize) {
            self.0.borrow_mut().push(format!("start {} {}", suites, tests));
        }
        fn on_run_finished(&mut self, run: &RunResult) {
            self.0.borrow_mut().push(format!("finished {}", run.tests_total()));
        }
        fn on_error(&mut self, message: &str) {
            self.0.borrow_mut().push(format!("error {}", message));
        }
    }

    #[test]
    fn test_multi_reporter_broadcasts() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut multi = MultiReporter::new(vec![
            Box::new(Recording(log.clone())),
            Box::new(Recording(log.clone())),
        ]);
        multi.on_run_start(1, 2);
        multi.on_run_finished(&sample_run());
        multi.on_error("boom");

        assert_eq!(log.borrow().len(), 6);
        assert_eq!(log.borrow()[5], "error boom");
    }
}
