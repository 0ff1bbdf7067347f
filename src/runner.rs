//! Suite executor and run coordinator
//!
//! Tests inside a suite always run one after another in registration order.
//! Suites run sequentially by default; with `jobs > 1` up to `jobs` suites run
//! at once on scoped worker threads, and results are put back into
//! registration order before the run result is assembled.

use crate::error::EngineError;
use crate::executor::{self, ExecOptions};
use crate::plan::{PlannedSuite, RunPlan};
use crate::results::{RunResult, SuiteResult};
use crate::signals;
use crossbeam_channel::unbounded;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

/// Run-wide execution options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    pub exec: ExecOptions,
    /// Maximum number of suites executing at the same time (at least 1)
    pub jobs: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            exec: ExecOptions::default(),
            jobs: 1,
        }
    }
}

/// Run every planned test of one suite, in order.
///
/// A failing or crashing test never stops its siblings.
pub fn run_suite(planned: &PlannedSuite<'_>, opts: &ExecOptions) -> Result<SuiteResult, EngineError> {
    run_suite_until(planned, opts, &AtomicBool::new(false))
}

/// [`run_suite`] that also stops before the next test once `abort` is set.
///
/// An aborted suite returns what it ran so far; the run it belongs to has
/// already failed and discards it.
fn run_suite_until(
    planned: &PlannedSuite<'_>,
    opts: &ExecOptions,
    abort: &AtomicBool,
) -> Result<SuiteResult, EngineError> {
    let suite = planned.suite;
    tracing::debug!(suite = suite.name(), tests = planned.tests.len(), "suite start");

    let mut result = SuiteResult::new(suite.name());
    for test in &planned.tests {
        if signals::shutdown_requested() {
            return Err(EngineError::Interrupted);
        }
        if abort.load(Ordering::SeqCst) {
            tracing::debug!(suite = suite.name(), "suite aborted");
            return Ok(result);
        }
        result.push(executor::run_test(suite, test, opts)?);
    }

    tracing::debug!(
        suite = suite.name(),
        passed = result.tests_passed,
        total = result.tests_total,
        "suite finished"
    );
    Ok(result)
}

/// Run every planned suite and assemble the run result
pub fn run(plan: &RunPlan<'_>, opts: &RunOptions) -> Result<RunResult, EngineError> {
    let jobs = opts.jobs.max(1).min(plan.suites.len().max(1));
    if jobs == 1 {
        return run_sequential(plan, &opts.exec);
    }
    run_parallel(plan, &opts.exec, jobs)
}

fn run_sequential(plan: &RunPlan<'_>, opts: &ExecOptions) -> Result<RunResult, EngineError> {
    let mut run = RunResult::default();
    for planned in &plan.suites {
        run.suites.push(run_suite(planned, opts)?);
    }
    Ok(run)
}

/// Bounded-parallel suite execution.
///
/// Each suite is tagged with its plan index; workers report `(index, result)`
/// and the results are sorted by index, so completion order never leaks into
/// the run result.
fn run_parallel(plan: &RunPlan<'_>, opts: &ExecOptions, jobs: usize) -> Result<RunResult, EngineError> {
    run_parallel_with(plan, jobs, |planned, abort| run_suite_until(planned, opts, abort))
}

/// Worker pool behind [`run_parallel`], generic over how one suite runs.
///
/// The first engine error sets a shared abort flag: no worker starts another
/// suite, and suites in flight stop before their next test.
fn run_parallel_with<F>(plan: &RunPlan<'_>, jobs: usize, run_one: F) -> Result<RunResult, EngineError>
where
    F: Fn(&PlannedSuite<'_>, &AtomicBool) -> Result<SuiteResult, EngineError> + Sync,
{
    let (work_tx, work_rx) = unbounded::<(usize, &PlannedSuite<'_>)>();
    let (done_tx, done_rx) = unbounded::<(usize, Result<SuiteResult, EngineError>)>();
    let abort = AtomicBool::new(false);

    for (index, planned) in plan.suites.iter().enumerate() {
        // Receiver is alive in this scope, so the send cannot fail
        let _ = work_tx.send((index, planned));
    }
    drop(work_tx);

    tracing::debug!(jobs, suites = plan.suites.len(), "parallel run");

    thread::scope(|scope| {
        for _ in 0..jobs {
            let work_rx = work_rx.clone();
            let done_tx = done_tx.clone();
            let abort = &abort;
            let run_one = &run_one;
            scope.spawn(move || {
                for (index, planned) in work_rx.iter() {
                    if abort.load(Ordering::SeqCst) {
                        break;
                    }
                    let result = run_one(planned, abort);
                    if let Err(e) = &result {
                        tracing::debug!(error = %e, "engine error, aborting remaining suites");
                        abort.store(true, Ordering::SeqCst);
                    }
                    if done_tx.send((index, result)).is_err() {
                        break;
                    }
                }
            });
        }
    });
    drop(done_tx);

    let mut finished: Vec<(usize, Result<SuiteResult, EngineError>)> = done_rx.iter().collect();
    finished.sort_by_key(|(index, _)| *index);

    let mut run = RunResult::default();
    for (_, result) in finished {
        run.suites.push(result?);
    }
    Ok(run)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Registry, Suite};
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    #[test]
    fn test_default_options_are_sequential() {
        let opts = RunOptions::default();
        assert_eq!(opts.jobs, 1);
        assert!(opts.exec.timeout.is_some());
    }

    #[test]
    fn test_empty_plan_yields_empty_run() {
        let registry = Registry::new();
        let plan = RunPlan::all(&registry);
        let run = run(&plan, &RunOptions::default()).unwrap();
        assert!(run.suites.is_empty());

        let parallel = run_parallel(&plan, &ExecOptions::default(), 4).unwrap();
        assert!(parallel.suites.is_empty());
    }

    fn registry_of(names: &[&str]) -> Registry {
        let mut registry = Registry::new();
        for name in names {
            registry
                .register(Suite::builder(*name).test("t", || {}).build().unwrap())
                .unwrap();
        }
        registry
    }

    #[test]
    fn test_parallel_results_follow_plan_order() {
        let registry = registry_of(&["a", "b", "c", "d"]);
        let plan = RunPlan::all(&registry);

        let run = run_parallel_with(&plan, 3, |planned, _| {
            // Later suites finish first
            let delay = match planned.suite.name() {
                "a" => 30,
                "b" => 20,
                _ => 0,
            };
            thread::sleep(Duration::from_millis(delay));
            Ok(SuiteResult::new(planned.suite.name()))
        })
        .unwrap();

        let names: Vec<&str> = run.suites.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["a", "b", "c", "d"]);
    }

    #[test]
    fn test_engine_error_stops_remaining_suites() {
        let registry = registry_of(&["s0", "s1", "s2", "s3", "s4"]);
        let plan = RunPlan::all(&registry);
        let started = Mutex::new(Vec::new());

        let result = run_parallel_with(&plan, 2, |planned, abort| {
            let name = planned.suite.name();
            started.lock().unwrap().push(name.to_string());
            if name == "s0" {
                return Err(EngineError::Spawn(nix::Error::EAGAIN));
            }
            // Stay in flight until the failure is visible
            let deadline = Instant::now() + Duration::from_secs(5);
            while !abort.load(Ordering::SeqCst) && Instant::now() < deadline {
                thread::sleep(Duration::from_millis(1));
            }
            Ok(SuiteResult::new(name))
        });

        assert!(matches!(result, Err(EngineError::Spawn(_))));
        let started = started.into_inner().unwrap();
        assert!(
            started.iter().all(|s| s == "s0" || s == "s1"),
            "suites started after the engine error: {:?}",
            started
        );
    }
}
