//! Error taxonomy
//!
//! Three classes of error exist, and none of them is a test failure:
//!
//! - [`RegistryError`]: the suite/test tree handed to the runner is malformed
//! - [`ConfigError`]: the resolved configuration cannot be satisfied
//! - [`EngineError`]: the isolation plumbing itself failed (engine-fatal)
//!
//! Test failures (assertions, nonzero exits, fatal signals, timeouts) are
//! data and live in [`crate::results::TestResult`].

use std::path::PathBuf;
use thiserror::Error;

/// Problems building the registered suite/test tree
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("suite and test names must not be empty")]
    EmptyName,

    #[error("suite `{0}` is registered more than once")]
    DuplicateSuite(String),

    #[error("test `{test}` is registered more than once in suite `{suite}`")]
    DuplicateTest { suite: String, test: String },
}

/// User-fatal configuration problems, reported before any test runs
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown suite `{0}`")]
    UnknownSuite(String),

    #[error("unknown test `{test}` in suite `{suite}`")]
    UnknownTest { suite: String, test: String },

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("invalid suite filter `{0}`, expected NAME=test1,test2")]
    InvalidSuiteFilter(String),

    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Engine-fatal conditions: the run aborts, no partial result is trusted
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to create diagnostic channel: {0}")]
    Channel(#[source] nix::Error),

    #[error("failed to spawn isolated test process: {0}")]
    Spawn(#[source] nix::Error),

    #[error("failed to start output reader: {0}")]
    Reader(#[source] std::io::Error),

    #[error("failed to wait for test process: {0}")]
    Wait(#[source] std::io::Error),

    #[error("run interrupted")]
    Interrupted,
}

impl EngineError {
    /// Process exit status the binary reports for this error
    pub fn exit_code(&self) -> u8 {
        match self {
            EngineError::Interrupted => 130,
            _ => 1,
        }
    }
}

/// Anything that stops a run from producing a result tree
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl RunError {
    /// Process exit status: 2 for user-fatal errors, engine codes otherwise
    pub fn exit_code(&self) -> u8 {
        match self {
            RunError::Registry(_) | RunError::Config(_) => 2,
            RunError::Engine(e) => e.exit_code(),
        }
    }
}
