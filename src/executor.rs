//! Test executor: one forked process per test
//!
//! CRITICAL SEQUENCE:
//! 1. Create the diagnostic pipe (before fork, so no output is lost)
//! 2. Fork
//! 3. Child: stderr -> pipe, setup, body, teardown, `_exit(0)`
//! 4. Parent: close write end, drain read end on a reader thread,
//!    wait for the child (deadline + shutdown aware), kill whatever is
//!    left in its process group, classify
//!
//! Setup and teardown run inside the child, once per test. Whatever they
//! mutate dies with that child and is never seen by a sibling test.

use crate::capture::{self, CapturedOutput};
use crate::check;
use crate::error::EngineError;
use crate::outcome::TerminationStatus;
use crate::registry::{Suite, Test};
use crate::results::TestResult;
use crate::signals;
use nix::fcntl::OFlag;
use nix::sys::signal::{kill, Signal};
use nix::unistd::{fork, pipe2, setpgid, ForkResult, Pid};
use std::fs::File;
use std::io;
use std::os::fd::OwnedFd;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

/// Exit status of a test process whose body panicked
pub const PANIC_EXIT_STATUS: i32 = 101;

/// Exit status of a test process that could not attach its stderr to the pipe
pub const REDIRECT_FAILED_STATUS: i32 = 125;

const POLL_MIN: Duration = Duration::from_millis(1);
const POLL_MAX: Duration = Duration::from_millis(25);

/// Held across pipe creation, fork and closing the parent's write end.
///
/// Without it a test forked from another suite worker could inherit this
/// test's write end and hold our end-of-stream open until it exits.
static SPAWN_LOCK: Mutex<()> = Mutex::new(());

/// Per-test execution options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecOptions {
    /// Wall-clock limit for one test process; `None` waits forever
    pub timeout: Option<Duration>,
}

impl Default for ExecOptions {
    fn default() -> Self {
        Self {
            timeout: Some(Duration::from_secs(30)),
        }
    }
}

/// Run exactly one test in its own process and return its result.
///
/// Test failures of every kind come back as data. Only failures of the
/// plumbing itself (pipe, fork, reader thread, wait) are errors.
pub fn run_test(suite: &Suite, test: &Test, opts: &ExecOptions) -> Result<TestResult, EngineError> {
    let start = Instant::now();

    let spawn_guard = SPAWN_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let (read_end, write_end) = pipe2(OFlag::O_CLOEXEC).map_err(EngineError::Channel)?;

    // No other thread may own the stderr lock at fork time, or the child
    // inherits it locked with no owner to release it
    let stderr_guard = io::stderr().lock();

    match unsafe { fork() }.map_err(EngineError::Spawn)? {
        ForkResult::Child => {
            drop(stderr_guard);
            drop(read_end);
            run_child(write_end, suite, test)
        }
        ForkResult::Parent { child } => {
            drop(stderr_guard);
            drop(write_end);
            drop(spawn_guard);
            // Also done by the child; whichever runs first wins the race
            let _ = setpgid(child, child);

            let mut guard = ChildGuard::new(child);
            tracing::trace!(suite = suite.name(), test = test.name(), pid = child.as_raw(), "spawned");

            let reader = spawn_reader(read_end)?;
            let status = wait_for(child, opts.timeout)?;
            guard.disarm();

            // A panicked reader loses only the output, not the verdict
            let output = reader.join().unwrap_or_else(|_| {
                tracing::warn!(test = test.name(), "output reader panicked");
                None
            });

            let duration_ms = start.elapsed().as_millis() as u64;
            tracing::trace!(test = test.name(), ?status, duration_ms, "reaped");
            Ok(TestResult::new(test.name(), status, output, duration_ms))
        }
    }
}

/// Body of the forked test process. Never returns.
fn run_child(write_end: OwnedFd, suite: &Suite, test: &Test) -> ! {
    signals::reset_in_child();
    // Own process group, so a timeout kill also reaches anything the test spawned
    let _ = setpgid(Pid::from_raw(0), Pid::from_raw(0));

    if capture::redirect_stderr(write_end).is_err() {
        check::exit(REDIRECT_FAILED_STATUS);
    }

    check::install_child_panic_hook();

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        suite.run_setup();
        test.invoke();
        suite.run_teardown();
    }));

    match result {
        Ok(()) => check::exit(0),
        Err(_) => check::exit(PANIC_EXIT_STATUS),
    }
}

fn spawn_reader(
    read_end: OwnedFd,
) -> Result<thread::JoinHandle<Option<CapturedOutput>>, EngineError> {
    let file = File::from(read_end);
    thread::Builder::new()
        .name("forktest-capture".to_string())
        .spawn(move || capture::drain(file))
        .map_err(EngineError::Reader)
}

/// Wait for the test process, enforcing the deadline and honouring shutdown
fn wait_for(pid: Pid, timeout: Option<Duration>) -> Result<TerminationStatus, EngineError> {
    let deadline = timeout.map(|t| (Instant::now() + t, t));
    let mut backoff = POLL_MIN;

    loop {
        if let Some(raw) = try_wait(pid)? {
            // Anything the test left running in its group still holds the
            // pipe open; the reader only sees end-of-stream once it is gone
            let _ = kill(Pid::from_raw(-pid.as_raw()), Signal::SIGKILL);
            return Ok(TerminationStatus::from_raw(raw));
        }

        if let Some((at, limit)) = deadline {
            if Instant::now() >= at {
                tracing::warn!(pid = pid.as_raw(), limit_ms = limit.as_millis() as u64, "test timed out, killing");
                kill_and_reap(pid)?;
                return Ok(TerminationStatus::TimedOut {
                    limit_ms: limit.as_millis() as u64,
                });
            }
        }

        // The caller's ChildGuard kills and reaps the process
        if signals::shutdown_requested() {
            return Err(EngineError::Interrupted);
        }

        thread::sleep(backoff);
        backoff = (backoff * 2).min(POLL_MAX);
    }
}

/// Non-blocking waitpid returning the raw status word.
///
/// The raw word is kept so signal numbers outside the named range still
/// reach the classifier.
fn try_wait(pid: Pid) -> Result<Option<i32>, EngineError> {
    loop {
        let mut status: libc::c_int = 0;
        let ret = unsafe { libc::waitpid(pid.as_raw(), &mut status, libc::WNOHANG) };
        match ret {
            0 => return Ok(None),
            r if r == pid.as_raw() => return Ok(Some(status)),
            _ => {
                let err = std::io::Error::last_os_error();
                if err.kind() == std::io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(EngineError::Wait(err));
            }
        }
    }
}

fn kill_and_reap(pid: Pid) -> Result<(), EngineError> {
    // Process group first (catches any children), then the process itself
    let _ = kill(Pid::from_raw(-pid.as_raw()), Signal::SIGKILL);
    let _ = kill(pid, Signal::SIGKILL);
    loop {
        let mut status: libc::c_int = 0;
        let ret = unsafe { libc::waitpid(pid.as_raw(), &mut status, 0) };
        if ret == pid.as_raw() {
            return Ok(());
        }
        let err = std::io::Error::last_os_error();
        if err.kind() != std::io::ErrorKind::Interrupted {
            return Err(EngineError::Wait(err));
        }
    }
}

/// Kills and reaps the test process if the parent leaves `run_test` early.
///
/// Uses RAII so error returns and panics both clean up.
struct ChildGuard {
    pid: Option<Pid>,
}

impl ChildGuard {
    fn new(pid: Pid) -> Self {
        Self { pid: Some(pid) }
    }

    /// The child has been reaped; nothing left to clean up
    fn disarm(&mut self) {
        self.pid = None;
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if let Some(pid) = self.pid.take() {
            let _ = kill_and_reap(pid);
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timeout_is_thirty_seconds() {
        assert_eq!(ExecOptions::default().timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_exit_statuses_are_distinct() {
        assert_ne!(PANIC_EXIT_STATUS, REDIRECT_FAILED_STATUS);
        assert_ne!(PANIC_EXIT_STATUS, crate::check::CHECK_FAILED_STATUS);
    }

    #[test]
    fn test_disarmed_guard_does_nothing() {
        let mut guard = ChildGuard::new(Pid::from_raw(i32::MAX));
        guard.disarm();
        assert!(guard.pid.is_none());
    }
}
