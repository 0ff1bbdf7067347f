//! Executor Integration Tests
//!
//! Every test here forks real processes through `executor::run_test` and
//! checks classification, capture, isolation and the timeout path.
//!
//! Test bodies write with `io::stderr().write_all` rather than `eprintln!`,
//! because the libtest harness redirects the print macros in its threads.

use forktest::capture::READ_BLOCK_SIZE;
use forktest::executor::{run_test, ExecOptions, PANIC_EXIT_STATUS};
use forktest::outcome::{TerminationStatus, Verdict};
use forktest::registry::Suite;
use forktest::results::TestResult;
use forktest::{check, check_eq};
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::time::{Duration, Instant};

fn write_stderr(bytes: &[u8]) {
    let mut stderr = std::io::stderr();
    stderr.write_all(bytes).unwrap();
    stderr.flush().unwrap();
}

/// Run the single test of a one-test suite
fn run_one<F>(body: F) -> TestResult
where
    F: Fn() + Send + Sync + 'static,
{
    run_one_with(Suite::builder("single").test("only", body), ExecOptions::default())
}

fn run_one_with(builder: forktest::registry::SuiteBuilder, opts: ExecOptions) -> TestResult {
    let suite = builder.build().unwrap();
    run_test(&suite, &suite.tests()[0], &opts).unwrap()
}

#[test]
fn test_passing_test() {
    let result = run_one(|| {
        check_eq!(2 + 2, 4);
    });
    assert_eq!(result.name, "only");
    assert_eq!(result.verdict, Verdict::Passed);
    assert_eq!(result.status, TerminationStatus::Exited { code: 0 });
    assert!(result.reason.is_none());
    assert!(result.output.is_none(), "nothing written means absent output");
}

#[test]
fn test_controlled_exit_code() {
    let result = run_one(|| forktest::exit(7));
    assert_eq!(result.verdict, Verdict::Failed);
    assert_eq!(result.status, TerminationStatus::Exited { code: 7 });
    assert_eq!(result.reason.as_deref(), Some("test exited with status `7`"));
}

#[test]
fn test_failed_check_reports_expression() {
    let result = run_one(|| {
        let value = 5;
        check_eq!(value, 3);
    });
    assert_eq!(result.verdict, Verdict::Failed);
    assert_eq!(result.reason.as_deref(), Some("test exited with status `1`"));

    let output = result.output.expect("check failure writes to stderr");
    let text = output.to_string_lossy();
    assert!(text.starts_with("'value == 3' FAILED "), "got: {}", text);
    assert!(text.contains("executor_integration.rs:"), "got: {}", text);
}

#[test]
fn test_segfault_is_signal_failure() {
    let result = run_one(|| unsafe {
        libc::raise(libc::SIGSEGV);
    });
    assert_eq!(result.verdict, Verdict::Failed);
    assert!(matches!(
        result.status,
        TerminationStatus::Signaled { signal, .. } if signal == libc::SIGSEGV
    ));
    assert_eq!(result.reason.as_deref(), Some("signal `SIGSEGV` terminated test"));
}

#[test]
fn test_invalid_pointer_write_is_sigsegv() {
    let result = run_one(|| {
        let ptr = 8usize as *mut u8;
        unsafe { std::ptr::write_volatile(ptr, 1) };
    });
    assert_eq!(result.reason.as_deref(), Some("signal `SIGSEGV` terminated test"));
}

#[test]
fn test_abort_is_sigabrt() {
    let result = run_one(|| std::process::abort());
    assert_eq!(result.reason.as_deref(), Some("signal `SIGABRT` terminated test"));
}

#[test]
fn test_realtime_signal_falls_back_to_number() {
    let sig = libc::SIGRTMIN() + 2;
    let result = run_one(move || unsafe {
        libc::raise(sig);
    });
    assert_eq!(result.verdict, Verdict::Failed);
    assert_eq!(
        result.reason,
        Some(format!("signal `{}` terminated test", sig))
    );
}

#[test]
fn test_panic_becomes_exit_status() {
    let result = run_one(|| panic!("boom"));
    assert_eq!(
        result.status,
        TerminationStatus::Exited {
            code: PANIC_EXIT_STATUS
        }
    );
    assert_eq!(result.verdict, Verdict::Failed);
}

#[test]
fn test_output_spanning_blocks_is_exact() {
    let data: Vec<u8> = (0..(READ_BLOCK_SIZE * 7 + 3)).map(|i| (i % 256) as u8).collect();
    let expected = data.clone();
    let result = run_one(move || write_stderr(&data));

    let output = result.output.unwrap();
    assert_eq!(output.to_bytes(), expected);
    assert!(output.chunks().len() >= 2);
}

#[test]
fn test_output_larger_than_pipe_buffer() {
    // Far beyond the default 64 KiB pipe capacity
    let size = 1024 * 1024;
    let result = run_one(move || write_stderr(&vec![b'x'; size]));

    assert_eq!(result.verdict, Verdict::Passed);
    assert_eq!(result.output.unwrap().len(), size);
}

#[test]
fn test_output_before_crash_is_kept() {
    let result = run_one(|| {
        write_stderr(b"about to crash\n");
        std::process::abort();
    });
    assert_eq!(result.reason.as_deref(), Some("signal `SIGABRT` terminated test"));
    assert_eq!(result.output.unwrap().to_string_lossy(), "about to crash\n");
}

#[test]
fn test_timeout_kills_hung_test() {
    let opts = ExecOptions {
        timeout: Some(Duration::from_millis(200)),
    };
    let builder = Suite::builder("hangs").test("forever", || loop {
        std::thread::sleep(Duration::from_secs(1));
    });
    let result = run_one_with(builder, opts);

    assert_eq!(result.status, TerminationStatus::TimedOut { limit_ms: 200 });
    assert_eq!(result.verdict, Verdict::Failed);
    assert_eq!(result.reason.as_deref(), Some("test timed out after `200`ms"));
}

#[test]
fn test_timeout_reaches_spawned_children() {
    let opts = ExecOptions {
        timeout: Some(Duration::from_millis(200)),
    };
    // The grandchild inherits the pipe; it must die too or capture never ends
    let builder = Suite::builder("spawns").test("sleeper", || {
        let _child = std::process::Command::new("sleep").arg("30").spawn();
        loop {
            std::thread::sleep(Duration::from_secs(1));
        }
    });
    let result = run_one_with(builder, opts);
    assert_eq!(result.status, TerminationStatus::TimedOut { limit_ms: 200 });
    assert!(result.duration_ms < 10_000);
}

#[test]
fn test_background_process_does_not_outlive_test() {
    let opts = ExecOptions {
        timeout: Some(Duration::from_millis(300)),
    };
    // The test returns at once, leaving a process that holds the pipe open
    let builder = Suite::builder("leaks").test("spawn_and_return", || {
        let _child = std::process::Command::new("sleep").arg("6").spawn();
    });

    let start = Instant::now();
    let result = run_one_with(builder, opts);

    assert_eq!(result.status, TerminationStatus::Exited { code: 0 });
    assert_eq!(result.verdict, Verdict::Passed);
    assert!(start.elapsed() < Duration::from_secs(2), "took {:?}", start.elapsed());
}

#[test]
fn test_check_reports_while_runner_holds_stderr() {
    let (locked_tx, locked_rx) = mpsc::channel();
    let holder = std::thread::spawn(move || {
        let _guard = std::io::stderr().lock();
        locked_tx.send(()).unwrap();
        std::thread::sleep(Duration::from_millis(300));
    });
    locked_rx.recv().unwrap();

    let opts = ExecOptions {
        timeout: Some(Duration::from_secs(5)),
    };
    let builder = Suite::builder("contended").test("fails", || {
        check!(1 == 2);
    });
    let result = run_one_with(builder, opts);
    holder.join().unwrap();

    assert_eq!(result.reason.as_deref(), Some("test exited with status `1`"));
    let text = result.output.unwrap().to_string_lossy();
    assert!(text.starts_with("'1 == 2' FAILED "), "got: {}", text);
}

#[test]
fn test_panic_message_is_captured() {
    let result = run_one(|| panic!("boom in body"));
    let text = result.output.expect("panic message on stderr").to_string_lossy();
    assert!(text.contains("boom in body"), "got: {}", text);
}

#[test]
fn test_setup_and_teardown_wrap_body() {
    let builder = Suite::builder("hooks")
        .setup(|| write_stderr(b"setup;"))
        .teardown(|| write_stderr(b"teardown;"))
        .test("body", || write_stderr(b"body;"));
    let result = run_one_with(builder, ExecOptions::default());

    assert_eq!(
        result.output.unwrap().to_string_lossy(),
        "setup;body;teardown;"
    );
}

#[test]
fn test_failing_setup_fails_test_and_skips_body() {
    let builder = Suite::builder("bad_setup")
        .setup(|| {
            write_stderr(b"setup;");
            check!(false);
        })
        .test("body", || write_stderr(b"body;"));
    let result = run_one_with(builder, ExecOptions::default());

    assert_eq!(result.verdict, Verdict::Failed);
    let text = result.output.unwrap().to_string_lossy();
    assert!(text.starts_with("setup;'false' FAILED"), "got: {}", text);
    assert!(!text.contains("body;"));
}

static SETUP_COUNTER: AtomicUsize = AtomicUsize::new(0);

#[test]
fn test_setup_state_never_leaks_between_tests() {
    let suite = Suite::builder("isolated")
        .setup(|| {
            SETUP_COUNTER.fetch_add(1, Ordering::SeqCst);
        })
        .test("first", || {
            check_eq!(SETUP_COUNTER.load(Ordering::SeqCst), 1);
            SETUP_COUNTER.fetch_add(100, Ordering::SeqCst);
        })
        .test("second", || {
            check_eq!(SETUP_COUNTER.load(Ordering::SeqCst), 1);
        })
        .build()
        .unwrap();

    let opts = ExecOptions::default();
    for test in suite.tests() {
        let result = run_test(&suite, test, &opts).unwrap();
        assert_eq!(result.verdict, Verdict::Passed, "{} saw leaked state", test.name());
    }

    // The runner's own copy was never touched
    assert_eq!(SETUP_COUNTER.load(Ordering::SeqCst), 0);
}
