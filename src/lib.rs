//! forktest: fork-isolated unit test framework
//!
//! Suites and tests are registered through an explicit builder, every test
//! runs in its own forked process with stderr captured, and the outcome is
//! classified from the process's termination status (exit code or signal).
//!
//! The binary entry point for test programs is [`app::main`].

pub mod app;
pub mod capture;
pub mod check;
pub mod config;
pub mod error;
pub mod executor;
pub mod junit;
pub mod outcome;
pub mod plan;
pub mod registry;
pub mod reporter;
pub mod results;
pub mod runner;
pub mod signals;

pub use check::exit;
pub use registry::{Registry, Suite};
