//! Interruption Integration Tests
//!
//! Own test binary: these tests flip the process-wide shutdown flag, which
//! would turn any concurrently running fork test into an interrupted one.

use forktest::error::{EngineError, RunError};
use forktest::executor::{run_test, ExecOptions};
use forktest::plan::RunPlan;
use forktest::registry::{Registry, Suite};
use forktest::runner::{self, RunOptions};
use forktest::signals::SHUTDOWN_REQUESTED;
use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;
use std::sync::atomic::Ordering;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// Serializes the tests of this binary around the shared flag
static FLAG_LOCK: Mutex<()> = Mutex::new(());

/// Clears the flag even when an assertion fails
struct FlagReset;

impl Drop for FlagReset {
    fn drop(&mut self) {
        SHUTDOWN_REQUESTED.store(false, Ordering::SeqCst);
    }
}

#[test]
fn test_shutdown_kills_in_flight_test() {
    let _lock = FLAG_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let _reset = FlagReset;

    let temp_dir = TempDir::new().unwrap();
    let pid_file = temp_dir.path().join("pid");
    let child_pid_file = pid_file.clone();

    let suite = Suite::builder("hangs")
        .test("forever", move || {
            std::fs::write(&child_pid_file, std::process::id().to_string()).unwrap();
            loop {
                std::thread::sleep(Duration::from_millis(50));
            }
        })
        .build()
        .unwrap();

    let handle = std::thread::spawn(move || {
        let opts = ExecOptions::default();
        run_test(&suite, &suite.tests()[0], &opts)
    });

    // Wait for the test process to announce itself
    let deadline = Instant::now() + Duration::from_secs(10);
    let pid = loop {
        if let Ok(text) = std::fs::read_to_string(&pid_file) {
            if let Ok(pid) = text.trim().parse::<i32>() {
                break Pid::from_raw(pid);
            }
        }
        assert!(Instant::now() < deadline, "test process never started");
        std::thread::sleep(Duration::from_millis(10));
    };

    let requested = Instant::now();
    SHUTDOWN_REQUESTED.store(true, Ordering::SeqCst);
    let result = handle.join().unwrap();

    assert!(matches!(result, Err(EngineError::Interrupted)));
    assert!(requested.elapsed() < Duration::from_secs(5));
    // Killed and reaped, not left behind as an orphan or zombie
    assert_eq!(kill(pid, None), Err(Errno::ESRCH));

    let err: RunError = EngineError::Interrupted.into();
    assert_eq!(err.exit_code(), 130);
}

#[test]
fn test_shutdown_stops_run_before_next_test() {
    let _lock = FLAG_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let _reset = FlagReset;

    let mut registry = Registry::new();
    registry
        .register(Suite::builder("never").test("runs", || {}).build().unwrap())
        .unwrap();

    SHUTDOWN_REQUESTED.store(true, Ordering::SeqCst);
    let result = runner::run(&RunPlan::all(&registry), &RunOptions::default());
    assert!(matches!(result, Err(EngineError::Interrupted)));
}
