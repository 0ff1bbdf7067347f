//! Configuration Loader
//! - CLI argument parsing with clap
//! - Optional `forktest.toml` in the working directory
//! - Merge: CLI flag > config file > built-in default

use crate::error::ConfigError;
use crate::executor::ExecOptions;
use crate::plan::{Selection, SuiteFilter};
use crate::runner::RunOptions;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default config file looked up in the working directory
pub const CONFIG_FILE_NAME: &str = "forktest.toml";

/// Default per-test deadline
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

// =============================================================================
// CLI Configuration
// =============================================================================

/// Output format for run results
#[derive(ValueEnum, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Colorized hierarchical summary (to stdout)
    #[default]
    Human,
    /// Machine-readable NDJSON (to stdout)
    Json,
}

/// forktest - fork-isolated unit test runner
#[derive(Parser, Debug)]
#[command(name = "forktest", version, about = "Fork-isolated unit test runner")]
pub struct Cli {
    /// Suites to run in full (comma separated)
    #[arg(short = 's', long, value_delimiter = ',')]
    pub suites: Vec<String>,

    /// Run only some tests of a suite: NAME=test1,test2 (repeatable)
    #[arg(long = "suite", value_name = "NAME=TESTS", value_parser = parse_suite_filter)]
    pub suite_filters: Vec<SuiteFilter>,

    /// Output format (also: FORKTEST_FORMAT env var)
    #[arg(short = 'f', long, value_enum, ignore_case = true, env = "FORKTEST_FORMAT")]
    pub format: Option<OutputFormat>,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Number of suites to run concurrently (0 = number of CPUs)
    #[arg(short = 'j', long)]
    pub jobs: Option<usize>,

    /// Per-test timeout in milliseconds (0 disables)
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Path to generate JUnit XML report (also: FORKTEST_JUNIT_XML env var)
    #[arg(long, env = "FORKTEST_JUNIT_XML")]
    pub junit_xml: Option<PathBuf>,

    /// Config file (default: ./forktest.toml if present)
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Subcommands
#[derive(Subcommand, Clone, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Run tests (default if no subcommand)
    Test,
    /// List registered suites and tests without running
    List,
}

fn parse_suite_filter(s: &str) -> Result<SuiteFilter, String> {
    s.parse().map_err(|e: ConfigError| e.to_string())
}

// =============================================================================
// File Configuration
// =============================================================================

/// Contents of `forktest.toml`; every key is optional
#[derive(Deserialize, Default, Debug, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub format: Option<OutputFormat>,
    pub color: Option<bool>,
    pub jobs: Option<usize>,
    pub timeout_ms: Option<u64>,
    pub junit_xml: Option<PathBuf>,
}

impl FileConfig {
    pub fn parse(contents: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load an explicit config file (must exist), or the default one if present
    pub fn load(explicit: Option<&Path>, root: &Path) -> Result<Self, ConfigError> {
        let path = match explicit {
            Some(p) => p.to_path_buf(),
            None => {
                let default = root.join(CONFIG_FILE_NAME);
                if !default.exists() {
                    return Ok(Self::default());
                }
                default
            }
        };

        let contents = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let config = Self::parse(&contents, &path)?;
        tracing::debug!(path = %path.display(), "loaded config file");
        Ok(config)
    }
}

// =============================================================================
// Resolved Settings
// =============================================================================

/// Fully resolved configuration handed to the runner and reporters
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub selection: Selection,
    pub format: OutputFormat,
    pub color: bool,
    pub jobs: usize,
    pub timeout: Option<Duration>,
    pub junit_xml: Option<PathBuf>,
    pub list_only: bool,
}

impl Settings {
    pub fn resolve(cli: Cli, file: FileConfig) -> Self {
        let jobs = match cli.jobs.or(file.jobs).unwrap_or(1) {
            0 => num_cpus::get(),
            n => n,
        };
        let list_only = match cli.command {
            Some(Commands::List) => true,
            Some(Commands::Test) | None => false,
        };
        let timeout = match cli.timeout_ms.or(file.timeout_ms).unwrap_or(DEFAULT_TIMEOUT_MS) {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        };

        Self {
            selection: Selection {
                suites: cli.suites,
                filters: cli.suite_filters,
            },
            format: cli.format.or(file.format).unwrap_or_default(),
            color: !cli.no_color && file.color.unwrap_or(true),
            jobs,
            timeout,
            junit_xml: cli.junit_xml.or(file.junit_xml),
            list_only,
        }
    }

    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            exec: ExecOptions {
                timeout: self.timeout,
            },
            jobs: self.jobs,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["forktest"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::resolve(cli(&[]), FileConfig::default());
        assert!(settings.selection.is_all());
        assert_eq!(settings.format, OutputFormat::Human);
        assert!(settings.color);
        assert_eq!(settings.jobs, 1);
        assert_eq!(settings.timeout, Some(Duration::from_millis(DEFAULT_TIMEOUT_MS)));
        assert!(!settings.list_only);
    }

    #[test]
    fn test_cli_selection_flags() {
        let parsed = cli(&["-s", "a,b", "--suite", "c=t1,t2", "--suite", "d=t3"]);
        assert_eq!(parsed.suites, vec!["a", "b"]);
        assert_eq!(parsed.suite_filters.len(), 2);
        assert_eq!(parsed.suite_filters[0].tests, vec!["t1", "t2"]);
    }

    #[test]
    fn test_invalid_suite_filter_rejected() {
        assert!(Cli::try_parse_from(["forktest", "--suite", "nope"]).is_err());
    }

    #[test]
    fn test_format_is_case_insensitive() {
        let parsed = cli(&["-f", "JSON"]);
        assert_eq!(parsed.format, Some(OutputFormat::Json));
    }

    #[test]
    fn test_list_subcommand() {
        let settings = Settings::resolve(cli(&["list"]), FileConfig::default());
        assert!(settings.list_only);
    }

    #[test]
    fn test_explicit_test_subcommand_runs() {
        let parsed = cli(&["-s", "suite1", "test"]);
        assert_eq!(parsed.command, Some(Commands::Test));
        let settings = Settings::resolve(parsed, FileConfig::default());
        assert!(!settings.list_only);
        assert_eq!(settings.selection.suites, vec!["suite1".to_string()]);
    }

    #[test]
    fn test_cli_overrides_file() {
        let file = FileConfig {
            format: Some(OutputFormat::Json),
            color: Some(true),
            jobs: Some(4),
            timeout_ms: Some(100),
            junit_xml: Some(PathBuf::from("file.xml")),
        };
        let settings = Settings::resolve(
            cli(&["-f", "human", "--no-color", "-j", "2", "--timeout-ms", "0"]),
            file,
        );
        assert_eq!(settings.format, OutputFormat::Human);
        assert!(!settings.color);
        assert_eq!(settings.jobs, 2);
        assert_eq!(settings.timeout, None);
        assert_eq!(settings.junit_xml, Some(PathBuf::from("file.xml")));
    }

    #[test]
    fn test_zero_jobs_means_all_cpus() {
        let settings = Settings::resolve(cli(&["-j", "0"]), FileConfig::default());
        assert_eq!(settings.jobs, num_cpus::get());
        assert_eq!(settings.run_options().jobs, num_cpus::get());
    }

    #[test]
    fn test_parse_file_config() {
        let toml_content = r#"
format = "json"
color = false
jobs = 3
timeout_ms = 500
"#;
        let config = FileConfig::parse(toml_content, Path::new("forktest.toml")).unwrap();
        assert_eq!(config.format, Some(OutputFormat::Json));
        assert_eq!(config.color, Some(false));
        assert_eq!(config.jobs, Some(3));
        assert_eq!(config.timeout_ms, Some(500));
        assert!(config.junit_xml.is_none());
    }

    #[test]
    fn test_parse_empty_file_config() {
        let config = FileConfig::parse("", Path::new("forktest.toml")).unwrap();
        assert_eq!(config, FileConfig::default());
    }

    #[test]
    fn test_unknown_key_is_config_error() {
        let err = FileConfig::parse("colour = true", Path::new("forktest.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_load_missing_default_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let config = FileConfig::load(None, temp_dir.path()).unwrap();
        assert_eq!(config, FileConfig::default());
    }

    #[test]
    fn test_load_default_file() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join(CONFIG_FILE_NAME), "jobs = 2\n").unwrap();
        let config = FileConfig::load(None, temp_dir.path()).unwrap();
        assert_eq!(config.jobs, Some(2));
    }

    #[test]
    fn test_load_missing_explicit_file_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("nope.toml");
        let err = FileConfig::load(Some(&missing), temp_dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
