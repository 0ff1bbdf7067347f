//! Result tree produced by one run: Run -> Suite -> Test
//!
//! Results are created by the executors and never mutated afterwards; the
//! reporters only read them.

use crate::capture::CapturedOutput;
use crate::outcome::{classify, TerminationStatus, Verdict};
use serde::Serialize;

/// Outcome of one isolated test execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestResult {
    pub name: String,
    pub status: TerminationStatus,
    pub verdict: Verdict,
    /// Present only when the verdict is failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Absent when the test wrote nothing to its diagnostic stream
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<CapturedOutput>,
    pub duration_ms: u64,
}

impl TestResult {
    /// Build a result, deriving verdict and reason from the status
    pub fn new(
        name: impl Into<String>,
        status: TerminationStatus,
        output: Option<CapturedOutput>,
        duration_ms: u64,
    ) -> Self {
        let outcome = classify(&status);
        Self {
            name: name.into(),
            status,
            verdict: outcome.verdict,
            reason: outcome.reason,
            output,
            duration_ms,
        }
    }

    pub fn passed(&self) -> bool {
        self.verdict.is_passed()
    }
}

/// Aggregate of one suite's test results, in execution order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuiteResult {
    pub name: String,
    pub tests_total: usize,
    pub tests_passed: usize,
    pub results: Vec<TestResult>,
}

impl SuiteResult {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tests_total: 0,
            tests_passed: 0,
            results: Vec::new(),
        }
    }

    /// Append a result, keeping the counters in step
    pub fn push(&mut self, result: TestResult) {
        self.tests_total += 1;
        if result.passed() {
            self.tests_passed += 1;
        }
        self.results.push(result);
    }

    pub fn tests_failed(&self) -> usize {
        self.tests_total - self.tests_passed
    }

    pub fn all_passed(&self) -> bool {
        self.tests_passed == self.tests_total
    }
}

/// Every suite result of one invocation, in registration order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunResult {
    pub suites: Vec<SuiteResult>,
}

impl RunResult {
    pub fn tests_total(&self) -> usize {
        self.suites.iter().map(|s| s.tests_total).sum()
    }

    pub fn tests_passed(&self) -> usize {
        self.suites.iter().map(|s| s.tests_passed).sum()
    }

    pub fn tests_failed(&self) -> usize {
        self.tests_total() - self.tests_passed()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn exited(name: &str, code: i32) -> TestResult {
        TestResult::new(name, TerminationStatus::Exited { code }, None, 1)
    }

    #[test]
    fn test_result_derives_verdict() {
        let pass = exited("ok", 0);
        assert!(pass.passed());
        assert!(pass.reason.is_none());

        let fail = exited("bad", 1);
        assert!(!fail.passed());
        assert_eq!(fail.reason.as_deref(), Some("test exited with status `1`"));
    }

    #[test]
    fn test_suite_counters_follow_pushes() {
        let mut suite = SuiteResult::new("s");
        suite.push(exited("a", 0));
        suite.push(exited("b", 1));
        suite.push(exited("c", 0));

        assert_eq!(suite.tests_total, 3);
        assert_eq!(suite.tests_passed, 2);
        assert_eq!(suite.tests_failed(), 1);
        assert!(!suite.all_passed());
        let names: Vec<&str> = suite.results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_run_totals() {
        let mut one = SuiteResult::new("one");
        one.push(exited("a", 0));
        let mut two = SuiteResult::new("two");
        two.push(exited("b", 2));
        two.push(exited("c", 0));

        let run = RunResult {
            suites: vec![one, two],
        };
        assert_eq!(run.tests_total(), 3);
        assert_eq!(run.tests_passed(), 2);
        assert_eq!(run.tests_failed(), 1);
    }

    #[test]
    fn test_result_json_shape() {
        let result = TestResult::new(
            "crash",
            TerminationStatus::Signaled {
                signal: libc::SIGSEGV,
                core_dumped: false,
            },
            None,
            5,
        );
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["verdict"], "failed");
        assert_eq!(json["status"]["kind"], "signaled");
        assert_eq!(json["reason"], "signal `SIGSEGV` terminated test");
        assert!(json.get("output").is_none());
    }
}
