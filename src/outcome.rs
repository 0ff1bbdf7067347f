//! Outcome classification
//!
//! Maps how a test process terminated onto a verdict plus a human-readable
//! failure reason. A single execution's outcome is final.

use serde::Serialize;
use std::fmt;

/// How an isolated test process ended, as observed by the runner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TerminationStatus {
    /// Normal exit with a status code
    Exited { code: i32 },
    /// Killed by a signal
    Signaled { signal: i32, core_dumped: bool },
    /// Killed by the runner after the per-test deadline
    TimedOut { limit_ms: u64 },
    /// A wait status that fits none of the above
    Unknown { raw: i32 },
}

impl TerminationStatus {
    /// Decode a raw `waitpid` status word
    pub fn from_raw(raw: i32) -> Self {
        if libc::WIFEXITED(raw) {
            TerminationStatus::Exited {
                code: libc::WEXITSTATUS(raw),
            }
        } else if libc::WIFSIGNALED(raw) {
            TerminationStatus::Signaled {
                signal: libc::WTERMSIG(raw),
                core_dumped: libc::WCOREDUMP(raw),
            }
        } else {
            TerminationStatus::Unknown { raw }
        }
    }
}

/// Binary pass/fail classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Passed,
    Failed,
}

impl Verdict {
    pub fn is_passed(self) -> bool {
        self == Verdict::Passed
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Passed => write!(f, "PASSED"),
            Verdict::Failed => write!(f, "FAILED"),
        }
    }
}

/// Verdict plus the reason, which is present only for failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub verdict: Verdict,
    pub reason: Option<String>,
}

impl Outcome {
    fn passed() -> Self {
        Self {
            verdict: Verdict::Passed,
            reason: None,
        }
    }

    fn failed(reason: String) -> Self {
        Self {
            verdict: Verdict::Failed,
            reason: Some(reason),
        }
    }
}

/// Classify a termination status
pub fn classify(status: &TerminationStatus) -> Outcome {
    match *status {
        TerminationStatus::Exited { code: 0 } => Outcome::passed(),
        TerminationStatus::Exited { code } => {
            Outcome::failed(format!("test exited with status `{}`", code))
        }
        TerminationStatus::Signaled { signal, .. } => match signal_name(signal) {
            Some(name) => Outcome::failed(format!("signal `{}` terminated test", name)),
            None => Outcome::failed(format!("signal `{}` terminated test", signal)),
        },
        TerminationStatus::TimedOut { limit_ms } => {
            Outcome::failed(format!("test timed out after `{}`ms", limit_ms))
        }
        TerminationStatus::Unknown { raw } => Outcome::failed(format!(
            "test terminated abnormally (raw status `{}`)",
            raw
        )),
    }
}

/// Symbolic names for the portable signal range 0..=31 (x86/ARM Linux numbering)
const SIGNAL_NAMES: [Option<&str>; 32] = [
    None,
    Some("SIGHUP"),
    Some("SIGINT"),
    Some("SIGQUIT"),
    Some("SIGILL"),
    Some("SIGTRAP"),
    Some("SIGABRT"),
    Some("SIGBUS"),
    Some("SIGFPE"),
    Some("SIGKILL"),
    Some("SIGUSR1"),
    Some("SIGSEGV"),
    Some("SIGUSR2"),
    Some("SIGPIPE"),
    Some("SIGALRM"),
    Some("SIGTERM"),
    Some("SIGSTKFLT"),
    Some("SIGCHLD"),
    Some("SIGCONT"),
    Some("SIGSTOP"),
    Some("SIGTSTP"),
    Some("SIGTTIN"),
    Some("SIGTTOU"),
    Some("SIGURG"),
    Some("SIGXCPU"),
    Some("SIGXFSZ"),
    Some("SIGVTALRM"),
    Some("SIGPROF"),
    Some("SIGWINCH"),
    Some("SIGIO"),
    Some("SIGPWR"),
    Some("SIGSYS"),
];

/// Canonical name of a signal number, if it is in the known table
pub fn signal_name(signal: i32) -> Option<&'static str> {
    usize::try_from(signal)
        .ok()
        .and_then(|i| SIGNAL_NAMES.get(i).copied().flatten())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_zero_passes() {
        let outcome = classify(&TerminationStatus::Exited { code: 0 });
        assert_eq!(outcome.verdict, Verdict::Passed);
        assert!(outcome.reason.is_none());
    }

    #[test]
    fn test_nonzero_exit_fails_with_code() {
        let outcome = classify(&TerminationStatus::Exited { code: 3 });
        assert_eq!(outcome.verdict, Verdict::Failed);
        assert_eq!(outcome.reason.unwrap(), "test exited with status `3`");
    }

    #[test]
    fn test_known_signal_uses_name() {
        let outcome = classify(&TerminationStatus::Signaled {
            signal: libc::SIGSEGV,
            core_dumped: false,
        });
        assert_eq!(outcome.verdict, Verdict::Failed);
        assert_eq!(outcome.reason.unwrap(), "signal `SIGSEGV` terminated test");
    }

    #[test]
    fn test_unknown_signal_falls_back_to_number() {
        let outcome = classify(&TerminationStatus::Signaled {
            signal: 40,
            core_dumped: false,
        });
        assert_eq!(outcome.reason.unwrap(), "signal `40` terminated test");

        let outcome = classify(&TerminationStatus::Signaled {
            signal: -2,
            core_dumped: false,
        });
        assert_eq!(outcome.reason.unwrap(), "signal `-2` terminated test");
    }

    #[test]
    fn test_timeout_reason() {
        let outcome = classify(&TerminationStatus::TimedOut { limit_ms: 250 });
        assert_eq!(outcome.verdict, Verdict::Failed);
        assert_eq!(outcome.reason.unwrap(), "test timed out after `250`ms");
    }

    #[test]
    fn test_unknown_status_conveys_raw() {
        let outcome = classify(&TerminationStatus::Unknown { raw: 0x137f });
        assert!(outcome.reason.unwrap().contains("4991"));
    }

    #[test]
    fn test_signal_table_matches_libc() {
        assert_eq!(signal_name(libc::SIGHUP), Some("SIGHUP"));
        assert_eq!(signal_name(libc::SIGABRT), Some("SIGABRT"));
        assert_eq!(signal_name(libc::SIGKILL), Some("SIGKILL"));
        assert_eq!(signal_name(libc::SIGPIPE), Some("SIGPIPE"));
        assert_eq!(signal_name(libc::SIGTERM), Some("SIGTERM"));
        assert_eq!(signal_name(libc::SIGSYS), Some("SIGSYS"));
        assert_eq!(signal_name(0), None);
        assert_eq!(signal_name(32), None);
    }

    #[test]
    fn test_from_raw_decodes_wait_status() {
        // Exit code lives in bits 8..16, termination signal in the low 7 bits
        assert_eq!(
            TerminationStatus::from_raw(3 << 8),
            TerminationStatus::Exited { code: 3 }
        );
        assert_eq!(
            TerminationStatus::from_raw(libc::SIGSEGV),
            TerminationStatus::Signaled {
                signal: libc::SIGSEGV,
                core_dumped: false
            }
        );
        assert_eq!(
            TerminationStatus::from_raw(libc::SIGABRT | 0x80),
            TerminationStatus::Signaled {
                signal: libc::SIGABRT,
                core_dumped: true
            }
        );
        // Stopped status (0x7f low byte) is neither exited nor signaled
        assert_eq!(
            TerminationStatus::from_raw(0x137f),
            TerminationStatus::Unknown { raw: 0x137f }
        );
    }

    #[test]
    fn test_verdict_display() {
        assert_eq!(Verdict::Passed.to_string(), "PASSED");
        assert_eq!(Verdict::Failed.to_string(), "FAILED");
        assert!(Verdict::Passed.is_passed());
    }
}
