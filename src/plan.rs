//! Run planning: resolve a suite/test selection against the registry
//!
//! Resolution happens before anything executes, so a bad selection is a
//! configuration error and never a test failure.

use crate::error::ConfigError;
use crate::registry::{Registry, Suite, Test};
use std::collections::HashSet;
use std::str::FromStr;

/// Restrict one suite to a subset of its tests (`NAME=test1,test2`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuiteFilter {
    pub suite: String,
    pub tests: Vec<String>,
}

impl FromStr for SuiteFilter {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidSuiteFilter(s.to_string());

        let (suite, tests) = s.split_once('=').ok_or_else(invalid)?;
        let suite = suite.trim();
        let tests: Vec<String> = tests
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(String::from)
            .collect();

        if suite.is_empty() || tests.is_empty() {
            return Err(invalid());
        }

        Ok(Self {
            suite: suite.to_string(),
            tests,
        })
    }
}

/// Which suites and tests the user asked for. Empty means everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    /// Suites to run in full
    pub suites: Vec<String>,
    /// Suites to run partially
    pub filters: Vec<SuiteFilter>,
}

impl Selection {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn is_all(&self) -> bool {
        self.suites.is_empty() && self.filters.is_empty()
    }
}

/// One suite as it will run: the suite plus the tests chosen from it
#[derive(Debug, Clone)]
pub struct PlannedSuite<'a> {
    pub suite: &'a Suite,
    pub tests: Vec<&'a Test>,
}

/// Resolved, ordered work for one run
#[derive(Debug, Clone)]
pub struct RunPlan<'a> {
    pub suites: Vec<PlannedSuite<'a>>,
}

impl<'a> RunPlan<'a> {
    /// Every registered suite in full
    pub fn all(registry: &'a Registry) -> Self {
        Self {
            suites: registry.suites().iter().map(full).collect(),
        }
    }

    /// Resolve `selection`, keeping registration order for suites and tests.
    ///
    /// A suite named both in full and through a filter runs in full.
    pub fn resolve(registry: &'a Registry, selection: &Selection) -> Result<Self, ConfigError> {
        if selection.is_all() {
            return Ok(Self::all(registry));
        }

        let mut full_names: HashSet<&str> = HashSet::new();
        for name in &selection.suites {
            if registry.suite(name).is_none() {
                return Err(ConfigError::UnknownSuite(name.clone()));
            }
            full_names.insert(name.as_str());
        }

        let mut partial: Vec<(&str, HashSet<&str>)> = Vec::new();
        for filter in &selection.filters {
            let suite = registry
                .suite(&filter.suite)
                .ok_or_else(|| ConfigError::UnknownSuite(filter.suite.clone()))?;
            for test in &filter.tests {
                if suite.test(test).is_none() {
                    return Err(ConfigError::UnknownTest {
                        suite: filter.suite.clone(),
                        test: test.clone(),
                    });
                }
            }

            // Repeated filters for one suite accumulate
            let names = filter.tests.iter().map(String::as_str);
            match partial.iter_mut().find(|(s, _)| *s == filter.suite) {
                Some((_, set)) => set.extend(names),
                None => partial.push((filter.suite.as_str(), names.collect())),
            }
        }

        let mut suites = Vec::new();
        for suite in registry.suites() {
            if full_names.contains(suite.name()) {
                suites.push(full(suite));
            } else if let Some((_, wanted)) = partial.iter().find(|(s, _)| *s == suite.name()) {
                suites.push(PlannedSuite {
                    suite,
                    tests: suite
                        .tests()
                        .iter()
                        .filter(|t| wanted.contains(t.name()))
                        .collect(),
                });
            }
        }

        Ok(Self { suites })
    }

    pub fn test_count(&self) -> usize {
        self.suites.iter().map(|s| s.tests.len()).sum()
    }
}

fn full(suite: &Suite) -> PlannedSuite<'_> {
    PlannedSuite {
        suite,
        tests: suite.tests().iter().collect(),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> Registry {
        let mut registry = Registry::new();
        for (name, tests) in [("alpha", vec!["a1", "a2", "a3"]), ("beta", vec!["b1", "b2"])] {
            let mut builder = Suite::builder(name);
            for t in tests {
                builder = builder.test(t, || {});
            }
            registry.register(builder.build().unwrap()).unwrap();
        }
        registry
    }

    fn names(plan: &RunPlan<'_>) -> Vec<(String, Vec<String>)> {
        plan.suites
            .iter()
            .map(|p| {
                (
                    p.suite.name().to_string(),
                    p.tests.iter().map(|t| t.name().to_string()).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn test_parse_suite_filter() {
        let filter: SuiteFilter = "alpha=a1, a3".parse().unwrap();
        assert_eq!(filter.suite, "alpha");
        assert_eq!(filter.tests, vec!["a1", "a3"]);
    }

    #[test]
    fn test_parse_suite_filter_rejects_malformed() {
        assert!("alpha".parse::<SuiteFilter>().is_err());
        assert!("=a1".parse::<SuiteFilter>().is_err());
        assert!("alpha=".parse::<SuiteFilter>().is_err());
    }

    #[test]
    fn test_empty_selection_runs_everything() {
        let registry = registry();
        let plan = RunPlan::resolve(&registry, &Selection::all()).unwrap();
        assert_eq!(plan.suites.len(), 2);
        assert_eq!(plan.test_count(), 5);
    }

    #[test]
    fn test_full_selection_keeps_registration_order() {
        let registry = registry();
        let selection = Selection {
            suites: vec!["beta".to_string(), "alpha".to_string()],
            filters: vec![],
        };
        let plan = RunPlan::resolve(&registry, &selection).unwrap();
        let got: Vec<String> = names(&plan).into_iter().map(|(s, _)| s).collect();
        assert_eq!(got, vec!["alpha", "beta"]);
    }

    #[test]
    fn test_filter_keeps_registration_order_of_tests() {
        let registry = registry();
        let selection = Selection {
            suites: vec![],
            filters: vec!["alpha=a3,a1".parse().unwrap()],
        };
        let plan = RunPlan::resolve(&registry, &selection).unwrap();
        assert_eq!(
            names(&plan),
            vec![("alpha".to_string(), vec!["a1".to_string(), "a3".to_string()])]
        );
    }

    #[test]
    fn test_full_wins_over_filter() {
        let registry = registry();
        let selection = Selection {
            suites: vec!["alpha".to_string()],
            filters: vec!["alpha=a2".parse().unwrap()],
        };
        let plan = RunPlan::resolve(&registry, &selection).unwrap();
        assert_eq!(plan.test_count(), 3);
    }

    #[test]
    fn test_repeated_filters_accumulate() {
        let registry = registry();
        let selection = Selection {
            suites: vec![],
            filters: vec!["beta=b2".parse().unwrap(), "beta=b1".parse().unwrap()],
        };
        let plan = RunPlan::resolve(&registry, &selection).unwrap();
        assert_eq!(plan.test_count(), 2);
    }

    #[test]
    fn test_unknown_suite_is_config_error() {
        let registry = registry();
        let selection = Selection {
            suites: vec!["gamma".to_string()],
            filters: vec![],
        };
        let err = RunPlan::resolve(&registry, &selection).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownSuite(name) if name == "gamma"));
    }

    #[test]
    fn test_unknown_test_is_config_error() {
        let registry = registry();
        let selection = Selection {
            suites: vec![],
            filters: vec!["beta=b9".parse().unwrap()],
        };
        let err = RunPlan::resolve(&registry, &selection).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownTest { test, .. } if test == "b9"));
    }
}
