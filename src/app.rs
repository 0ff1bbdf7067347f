//! Entry point glue for test binaries
//!
//! A test binary builds its [`Registry`] and hands it to [`main`]:
//!
//! ```no_run
//! use forktest::registry::{Registry, Suite};
//!
//! fn main() -> std::process::ExitCode {
//!     let mut registry = Registry::new();
//!     registry
//!         .register(Suite::builder("smoke").test("runs", || {}).build().unwrap())
//!         .unwrap();
//!     forktest::app::main(registry)
//! }
//! ```
//!
//! Exit status: 0 when the run completed (whatever the verdicts), 1 on an
//! engine-fatal error, 2 on a configuration error, 130 when interrupted.

use crate::config::{Cli, FileConfig, OutputFormat, Settings};
use crate::error::{ConfigError, RunError};
use crate::junit::JunitReporter;
use crate::plan::RunPlan;
use crate::registry::Registry;
use crate::reporter::{HumanReporter, JsonReporter, MultiReporter, Reporter};
use crate::results::RunResult;
use crate::{runner, signals};
use clap::Parser;
use std::io::{self, Write};
use std::path::Path;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the tracing filter (e.g. `forktest=debug`)
pub const LOG_ENV: &str = "FORKTEST_LOG";

/// Parse the command line, run the selected tests, report, and exit
pub fn main(registry: Registry) -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    let root = match std::env::current_dir() {
        Ok(dir) => dir,
        Err(e) => {
            eprintln!("[forktest] Failed to read working directory: {}", e);
            return ExitCode::from(1);
        }
    };

    let settings = match FileConfig::load(cli.config.as_deref(), &root) {
        Ok(file) => Settings::resolve(cli, file),
        Err(e) => {
            eprintln!("[forktest] Configuration error: {}", e);
            return ExitCode::from(2);
        }
    };

    if !settings.color {
        colored::control::set_override(false);
    }

    if settings.list_only {
        return match list(&registry, &mut io::stdout()) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("[forktest] Failed to list tests: {}", e);
                ExitCode::from(1)
            }
        };
    }

    if let Err(e) = signals::install_signal_handlers() {
        tracing::warn!(error = %e, "signal handlers not installed, Ctrl+C will not stop cleanly");
    }

    let mut reporter = build_reporter(&settings);
    match execute(&registry, &settings, reporter.as_mut()) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => ExitCode::from(e.exit_code()),
    }
}

/// Resolve the plan, run it, and feed the reporter.
///
/// Configuration errors are reported before any test runs. A completed run
/// is `Ok` even if every test failed.
pub fn execute(
    registry: &Registry,
    settings: &Settings,
    reporter: &mut dyn Reporter,
) -> Result<RunResult, RunError> {
    let plan = match RunPlan::resolve(registry, &settings.selection) {
        Ok(plan) => plan,
        Err(e) => {
            reporter.on_error(&format!("configuration error: {}", e));
            return Err(e.into());
        }
    };

    reporter.on_run_start(plan.suites.len(), plan.test_count());

    match runner::run(&plan, &settings.run_options()) {
        Ok(run) => {
            reporter.on_run_finished(&run);
            Ok(run)
        }
        Err(e) => {
            reporter.on_error(&e.to_string());
            Err(e.into())
        }
    }
}

/// Reporter stack for the resolved settings
pub fn build_reporter(settings: &Settings) -> Box<dyn Reporter> {
    let primary: Box<dyn Reporter> = match settings.format {
        OutputFormat::Human => Box::new(HumanReporter::stdout()),
        OutputFormat::Json => Box::new(JsonReporter::stdout()),
    };

    match &settings.junit_xml {
        Some(path) => Box::new(MultiReporter::new(vec![
            primary,
            Box::new(JunitReporter::new(path.clone())),
        ])),
        None => primary,
    }
}

/// Print every registered suite and its tests, in registration order
pub fn list<W: Write>(registry: &Registry, out: &mut W) -> io::Result<()> {
    for suite in registry.suites() {
        writeln!(out, "{} ({} tests)", suite.name(), suite.tests().len())?;
        for test in suite.tests() {
            writeln!(out, "  {}", test.name())?;
        }
    }
    out.flush()
}

fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

/// Load settings the way [`main`] does, from explicit arguments
pub fn settings_from_args<I, T>(args: I, root: &Path) -> Result<Settings, RunError>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = Cli::try_parse_from(args).map_err(|e| ConfigError::InvalidArguments(e.to_string()))?;
    let file = FileConfig::load(cli.config.as_deref(), root)?;
    Ok(Settings::resolve(cli, file))
}

// =============================================================================
// Unit Tests
// =============================================================================
