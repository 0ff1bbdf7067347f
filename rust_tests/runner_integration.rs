//! Runner Integration Tests
//!
//! Drives whole suites through `runner::run` and checks aggregation:
//! counts, ordering, crash containment and plan filtering.

use forktest::executor::ExecOptions;
use forktest::outcome::Verdict;
use forktest::plan::{RunPlan, Selection};
use forktest::registry::{Registry, Suite};
use forktest::runner::{self, RunOptions};
use forktest::{check, check_eq};
use std::sync::atomic::{AtomicI32, Ordering};
use std::time::Duration;

static WILL_BE_FIVE: AtomicI32 = AtomicI32::new(0);

/// Pass, failed check, segfault: the canonical mixed suite
fn mixed_suite() -> Suite {
    Suite::builder("suite1")
        .setup(|| {
            check_eq!(WILL_BE_FIVE.load(Ordering::SeqCst), 0);
            WILL_BE_FIVE.store(5, Ordering::SeqCst);
        })
        .teardown(|| WILL_BE_FIVE.store(0, Ordering::SeqCst))
        .test("suite1_test1", || {
            check_eq!(WILL_BE_FIVE.load(Ordering::SeqCst), 5);
        })
        .test("suite1_test2", || {
            check_eq!(WILL_BE_FIVE.load(Ordering::SeqCst), 3);
        })
        .test("suite1_test3", || {
            let ptr = 8usize as *mut u8;
            unsafe { std::ptr::write_volatile(ptr, b'c') };
        })
        .build()
        .unwrap()
}

fn registry_of(suites: Vec<Suite>) -> Registry {
    let mut registry = Registry::new();
    for suite in suites {
        registry.register(suite).unwrap();
    }
    registry
}

#[test]
fn test_mixed_suite_end_to_end() {
    let registry = registry_of(vec![mixed_suite()]);
    let run = runner::run(&RunPlan::all(&registry), &RunOptions::default()).unwrap();

    assert_eq!(run.suites.len(), 1);
    let suite = &run.suites[0];
    assert_eq!(suite.name, "suite1");
    assert_eq!(suite.tests_total, 3);
    assert_eq!(suite.tests_passed, 1);
    assert_eq!(suite.tests_failed(), 2);

    let names: Vec<&str> = suite.results.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, ["suite1_test1", "suite1_test2", "suite1_test3"]);

    assert_eq!(suite.results[0].verdict, Verdict::Passed);
    assert_eq!(
        suite.results[1].reason.as_deref(),
        Some("test exited with status `1`")
    );
    let output = suite.results[1].output.as_ref().unwrap().to_string_lossy();
    assert!(output.contains("FAILED"), "got: {}", output);
    assert_eq!(
        suite.results[2].reason.as_deref(),
        Some("signal `SIGSEGV` terminated test")
    );

    // Setup ran only in children
    assert_eq!(WILL_BE_FIVE.load(Ordering::SeqCst), 0);
}

#[test]
fn test_crash_does_not_stop_siblings() {
    let suite = Suite::builder("crashy")
        .test("first_crash", || std::process::abort())
        .test("second_ok", || {})
        .test("third_crash", || unsafe {
            libc::raise(libc::SIGBUS);
        })
        .test("fourth_ok", || {})
        .build()
        .unwrap();
    let registry = registry_of(vec![suite]);
    let run = runner::run(&RunPlan::all(&registry), &RunOptions::default()).unwrap();

    let suite = &run.suites[0];
    assert_eq!(suite.tests_total, 4);
    assert_eq!(suite.tests_passed, 2);
    assert_eq!(
        suite.results[2].reason.as_deref(),
        Some("signal `SIGBUS` terminated test")
    );
    assert!(suite.results[3].passed());
}

#[test]
fn test_repeated_runs_agree() {
    let registry = registry_of(vec![mixed_suite()]);
    let plan = RunPlan::all(&registry);

    let first = runner::run(&plan, &RunOptions::default()).unwrap();
    let second = runner::run(&plan, &RunOptions::default()).unwrap();

    let summary = |run: &forktest::results::RunResult| -> Vec<(String, Verdict, Option<String>)> {
        run.suites[0]
            .results
            .iter()
            .map(|r| (r.name.clone(), r.verdict, r.reason.clone()))
            .collect()
    };
    assert_eq!(summary(&first), summary(&second));
    assert_eq!(first.tests_passed(), second.tests_passed());
}

#[test]
fn test_parallel_suites_keep_registration_order() {
    // Earlier suites sleep longer so they finish last
    let suites: Vec<Suite> = (0..5)
        .map(|i| {
            let delay = Duration::from_millis(50 * (5 - i) as u64);
            Suite::builder(format!("suite{}", i))
                .test("sleeps", move || std::thread::sleep(delay))
                .test("checks", move || {
                    check!(i < 5);
                })
                .build()
                .unwrap()
        })
        .collect();
    let registry = registry_of(suites);

    let opts = RunOptions {
        exec: ExecOptions::default(),
        jobs: 3,
    };
    let run = runner::run(&RunPlan::all(&registry), &opts).unwrap();

    let names: Vec<&str> = run.suites.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, ["suite0", "suite1", "suite2", "suite3", "suite4"]);
    assert_eq!(run.tests_total(), 10);
    assert_eq!(run.tests_passed(), 10);
}

#[test]
fn test_filtered_plan_runs_only_selection() {
    let other = Suite::builder("other")
        .test("a", || {})
        .test("b", || forktest::exit(4))
        .build()
        .unwrap();
    let registry = registry_of(vec![mixed_suite(), other]);

    let selection = Selection {
        suites: vec![],
        filters: vec!["suite1=suite1_test1,suite1_test3".parse().unwrap()],
    };
    let plan = RunPlan::resolve(&registry, &selection).unwrap();
    assert_eq!(plan.test_count(), 2);

    let run = runner::run(&plan, &RunOptions::default()).unwrap();
    assert_eq!(run.suites.len(), 1);
    assert_eq!(run.suites[0].tests_total, 2);
    assert_eq!(run.suites[0].tests_passed, 1);
    assert_eq!(run.suites[0].results[1].name, "suite1_test3");
}

#[test]
fn test_timeout_applies_per_test() {
    let suite = Suite::builder("slow")
        .test("hangs", || loop {
            std::thread::sleep(Duration::from_millis(100));
        })
        .test("quick", || {})
        .build()
        .unwrap();
    let registry = registry_of(vec![suite]);
    let opts = RunOptions {
        exec: ExecOptions {
            timeout: Some(Duration::from_millis(150)),
        },
        jobs: 1,
    };
    let run = runner::run(&RunPlan::all(&registry), &opts).unwrap();

    let suite = &run.suites[0];
    assert_eq!(
        suite.results[0].reason.as_deref(),
        Some("test timed out after `150`ms")
    );
    assert!(suite.results[1].passed());
}
