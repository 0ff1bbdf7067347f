//! Suite/Test registration
//!
//! Suites are assembled by ordinary code and appended to a [`Registry`] in the
//! order they should run. Nothing is registered implicitly before `main`.
//!
//! ```no_run
//! use forktest::registry::{Registry, Suite};
//! use forktest::check_eq;
//!
//! let mut registry = Registry::new();
//! let suite = Suite::builder("math")
//!     .test("adds", || check_eq!(1 + 1, 2))
//!     .build()
//!     .unwrap();
//! registry.register(suite).unwrap();
//! ```

use crate::error::RegistryError;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Executable test body or hook. Shared so parallel suite workers can hold it.
pub type TestFn = Arc<dyn Fn() + Send + Sync + 'static>;

/// A single named check belonging to a suite
#[derive(Clone)]
pub struct Test {
    name: String,
    body: TestFn,
}

impl Test {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the body in the current process. Only the executor's child calls this.
    pub fn invoke(&self) {
        (self.body)()
    }
}

impl fmt::Debug for Test {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Test").field("name", &self.name).finish()
    }
}

/// A named, ordered group of tests sharing optional setup/teardown hooks
#[derive(Clone)]
pub struct Suite {
    name: String,
    setup: Option<TestFn>,
    teardown: Option<TestFn>,
    tests: Vec<Test>,
}

impl Suite {
    pub fn builder(name: impl Into<String>) -> SuiteBuilder {
        SuiteBuilder {
            name: name.into(),
            setup: None,
            teardown: None,
            tests: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tests in registration order
    pub fn tests(&self) -> &[Test] {
        &self.tests
    }

    pub fn test(&self, name: &str) -> Option<&Test> {
        self.tests.iter().find(|t| t.name == name)
    }

    pub fn run_setup(&self) {
        if let Some(setup) = &self.setup {
            setup();
        }
    }

    pub fn run_teardown(&self) {
        if let Some(teardown) = &self.teardown {
            teardown();
        }
    }
}

impl fmt::Debug for Suite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Suite")
            .field("name", &self.name)
            .field("setup", &self.setup.is_some())
            .field("teardown", &self.teardown.is_some())
            .field("tests", &self.tests)
            .finish()
    }
}

/// Builder for [`Suite`]; tests keep the order of `.test()` calls
pub struct SuiteBuilder {
    name: String,
    setup: Option<TestFn>,
    teardown: Option<TestFn>,
    tests: Vec<Test>,
}

impl SuiteBuilder {
    /// Hook run inside each test's process before the body
    pub fn setup<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.setup = Some(Arc::new(f));
        self
    }

    /// Hook run inside each test's process after the body returns
    pub fn teardown<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.teardown = Some(Arc::new(f));
        self
    }

    pub fn test<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.tests.push(Test {
            name: name.into(),
            body: Arc::new(f),
        });
        self
    }

    pub fn build(self) -> Result<Suite, RegistryError> {
        if self.name.is_empty() {
            return Err(RegistryError::EmptyName);
        }

        let mut seen = HashSet::new();
        for test in &self.tests {
            if test.name.is_empty() {
                return Err(RegistryError::EmptyName);
            }
            if !seen.insert(test.name.as_str()) {
                return Err(RegistryError::DuplicateTest {
                    suite: self.name.clone(),
                    test: test.name.clone(),
                });
            }
        }

        Ok(Suite {
            name: self.name,
            setup: self.setup,
            teardown: self.teardown,
            tests: self.tests,
        })
    }
}

/// Every suite of one run, in registration order
#[derive(Clone, Debug, Default)]
pub struct Registry {
    suites: Vec<Suite>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a suite. Suite names are unique within a registry.
    pub fn register(&mut self, suite: Suite) -> Result<(), RegistryError> {
        if self.suite(suite.name()).is_some() {
            return Err(RegistryError::DuplicateSuite(suite.name));
        }
        self.suites.push(suite);
        Ok(())
    }

    pub fn suites(&self) -> &[Suite] {
        &self.suites
    }

    pub fn suite(&self, name: &str) -> Option<&Suite> {
        self.suites.iter().find(|s| s.name == name)
    }

    pub fn test_count(&self) -> usize {
        self.suites.iter().map(|s| s.tests.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.suites.is_empty()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
