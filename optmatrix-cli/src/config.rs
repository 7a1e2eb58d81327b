//! Configuration loading from optmatrix.toml
//!
//! The configuration can be placed in an `optmatrix.toml` file in the project root.
//! It is discovered by walking up from the current directory, or given explicitly
//! with `--config`. Every field has a default, so an empty file is valid.

use optmatrix_core::MarkerGrammar;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File name looked up during discovery
pub const CONFIG_FILE_NAME: &str = "optmatrix.toml";

/// optmatrix configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OptConfig {
    /// Scheduling and time limits
    #[serde(default)]
    pub runner: RunnerConfig,
    /// How to invoke the optimizer
    #[serde(default)]
    pub optimizer: OptimizerConfig,
    /// Which workloads and modes form the job matrix
    #[serde(default)]
    pub workloads: WorkloadsConfig,
    /// Where and how results are written
    #[serde(default)]
    pub output: OutputConfig,
    /// Marker vocabulary of the optimizer's output
    #[serde(default)]
    pub markers: MarkerGrammar,
}

/// Runner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Wall-clock limit for a single job (e.g., "300s", "5m")
    #[serde(default = "default_timeout")]
    pub timeout: String,
    /// Maximum number of optimizer processes running at once
    #[serde(default = "default_jobs")]
    pub jobs: usize,
    /// Cores handed to each optimizer process (`-c`)
    #[serde(default = "default_cores_per_job")]
    pub cores_per_job: u32,
    /// Delay between SIGTERM and SIGKILL when a job times out
    #[serde(default = "default_kill_grace")]
    pub kill_grace: String,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            jobs: default_jobs(),
            cores_per_job: default_cores_per_job(),
            kill_grace: default_kill_grace(),
        }
    }
}

fn default_timeout() -> String {
    "300s".to_string()
}
fn default_jobs() -> usize {
    4
}
fn default_cores_per_job() -> u32 {
    1
}
fn default_kill_grace() -> String {
    "500ms".to_string()
}

/// Optimizer invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizerConfig {
    /// Executable to run
    #[serde(default = "default_program")]
    pub program: String,
    /// Arguments placed before the mode flag
    #[serde(default = "default_args")]
    pub args: Vec<String>,
    /// Pass `-o` to enable the optimization pass
    #[serde(default = "default_optimize_pass")]
    pub optimize_pass: bool,
    /// Working directory for the optimizer (current directory if unset)
    #[serde(default)]
    pub working_dir: Option<String>,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: default_args(),
            optimize_pass: default_optimize_pass(),
            working_dir: None,
        }
    }
}

fn default_program() -> String {
    "racket".to_string()
}
fn default_args() -> Vec<String> {
    vec!["optimize.rkt".to_string()]
}
fn default_optimize_pass() -> bool {
    true
}

/// Workload discovery and mode matrix
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadsConfig {
    /// Directory scanned for workloads
    #[serde(default = "default_directory")]
    pub directory: String,
    /// Glob matched against file names
    #[serde(default = "default_pattern")]
    pub pattern: String,
    /// Skip files whose name contains any of these substrings
    #[serde(default = "default_exclude")]
    pub exclude: Vec<String>,
    /// Search modes, in reporting order
    #[serde(default = "default_modes")]
    pub modes: Vec<String>,
}

impl Default for WorkloadsConfig {
    fn default() -> Self {
        Self {
            directory: default_directory(),
            pattern: default_pattern(),
            exclude: default_exclude(),
            modes: default_modes(),
        }
    }
}

fn default_directory() -> String {
    "programs".to_string()
}
fn default_pattern() -> String {
    "*.s".to_string()
}
fn default_exclude() -> Vec<String> {
    vec!["mulhu64".to_string(), "test_x0".to_string()]
}
fn default_modes() -> Vec<String> {
    vec!["sym".to_string(), "stoch".to_string()]
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory under which run directories are created
    #[serde(default = "default_root")]
    pub root: String,
    /// Run directory prefix; a `_YYYYMMDD_HHMMSS` timestamp is appended
    #[serde(default = "default_dir_prefix")]
    pub dir_prefix: String,
    /// Persisted summary format: "markdown" or "json"
    #[serde(default = "default_format")]
    pub format: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            dir_prefix: default_dir_prefix(),
            format: default_format(),
        }
    }
}

fn default_root() -> String {
    ".".to_string()
}
fn default_dir_prefix() -> String {
    "test_results".to_string()
}
fn default_format() -> String {
    "markdown".to_string()
}

impl OptConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Invalid config {}: {}", path.display(), e))?;
        Ok(config)
    }

    /// Walk up from the current directory looking for `optmatrix.toml`
    pub fn discover_path() -> Option<PathBuf> {
        let mut dir = std::env::current_dir().ok()?;
        loop {
            let config_path = dir.join(CONFIG_FILE_NAME);
            if config_path.is_file() {
                return Some(config_path);
            }
            if !dir.pop() {
                break;
            }
        }
        None
    }

    /// Load the explicit path if given, else the discovered file, else defaults.
    ///
    /// A config file that exists but does not parse is an error, not a silent
    /// fallback to defaults.
    pub fn resolve(explicit: Option<&Path>) -> anyhow::Result<Self> {
        match explicit {
            Some(path) => Self::load(path),
            None => match Self::discover_path() {
                Some(path) => {
                    tracing::debug!(path = %path.display(), "using discovered config");
                    Self::load(path)
                }
                None => Ok(Self::default()),
            },
        }
    }

    /// Generate a default configuration as TOML string
    pub fn default_toml() -> String {
        r#"# optmatrix configuration

[runner]
# Wall-clock limit for a single (workload, mode) job
timeout = "300s"
# Maximum number of optimizer processes running at once
jobs = 4
# Cores handed to each optimizer process (-c)
cores_per_job = 1
# Delay between SIGTERM and SIGKILL when a job times out
kill_grace = "500ms"

[optimizer]
# Executable and leading arguments; the harness appends
# --<mode> [-o] -c <cores> <workload>
program = "racket"
args = ["optimize.rkt"]
# Pass -o to enable the optimization pass
optimize_pass = true
# Working directory for the optimizer (uncomment to enable)
# working_dir = "riscv"

[workloads]
# Directory scanned for workloads
directory = "programs"
# Glob matched against file names
pattern = "*.s"
# Skip files whose name contains any of these substrings
exclude = ["mulhu64", "test_x0"]
# Search modes, in reporting order
modes = ["sym", "stoch"]

[output]
# Run directories are created under this directory
root = "."
# Run directory name prefix (a timestamp is appended)
dir_prefix = "test_results"
# Persisted summary: markdown (SUMMARY.md) or json (SUMMARY.json)
format = "markdown"

[markers]
# Output markers scraped from the optimizer (bump version when changing them)
version = 1
original_cost = ">>> original cost:"
new_cost = "New cost:"
improvement = "Improvement:"
improvement_found = "IMPROVEMENT FOUND"
"#
        .to_string()
    }

    /// Parse a duration string (e.g., "300s", "500ms", "5m"); a bare number is seconds
    pub fn parse_duration(s: &str) -> anyhow::Result<Duration> {
        let s = s.trim();
        if s.is_empty() {
            return Err(anyhow::anyhow!("Empty duration string"));
        }

        // Find where the number ends and unit begins
        let (num_part, unit_part) = s
            .char_indices()
            .find(|(_, c)| c.is_alphabetic())
            .map(|(i, _)| s.split_at(i))
            .unwrap_or((s, "s"));

        let value: f64 = num_part
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid duration number: {}", num_part))?;
        if !value.is_finite() || value < 0.0 {
            return Err(anyhow::anyhow!("Invalid duration: {}", s));
        }

        let multiplier: u64 = match unit_part.to_lowercase().as_str() {
            "ns" => 1,
            "us" | "µs" => 1_000,
            "ms" => 1_000_000,
            "s" | "" => 1_000_000_000,
            "m" | "min" => 60_000_000_000,
            "h" => 3_600_000_000_000,
            _ => return Err(anyhow::anyhow!("Unknown duration unit: {}", unit_part)),
        };

        Ok(Duration::from_nanos((value * multiplier as f64) as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = OptConfig::default();
        assert_eq!(config.runner.timeout, "300s");
        assert_eq!(config.runner.jobs, 4);
        assert_eq!(config.runner.cores_per_job, 1);
        assert_eq!(config.optimizer.program, "racket");
        assert!(config.optimizer.optimize_pass);
        assert_eq!(config.workloads.modes, vec!["sym", "stoch"]);
        assert_eq!(config.workloads.exclude, vec!["mulhu64", "test_x0"]);
        assert_eq!(config.markers, MarkerGrammar::default());
    }

    #[test]
    fn test_parse_duration() {
        let d = OptConfig::parse_duration;
        assert_eq!(d("3s").unwrap(), Duration::from_secs(3));
        assert_eq!(d("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(d("100us").unwrap(), Duration::from_micros(100));
        assert_eq!(d("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(d("1.5s").unwrap(), Duration::from_millis(1500));
        assert_eq!(d("300").unwrap(), Duration::from_secs(300));
        assert!(d("").is_err());
        assert!(d("10 parsecs").is_err());
        assert!(d("-1s").is_err());
    }

    #[test]
    fn test_parse_toml() {
        let toml_str = r#"
            [runner]
            timeout = "2s"
            jobs = 8

            [workloads]
            modes = ["stoch"]
        "#;

        let config: OptConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.runner.timeout, "2s");
        assert_eq!(config.runner.jobs, 8);
        assert_eq!(config.workloads.modes, vec!["stoch"]);
        // Defaults should still apply
        assert_eq!(config.runner.cores_per_job, 1);
        assert_eq!(config.workloads.pattern, "*.s");
        assert_eq!(config.output.format, "markdown");
    }

    #[test]
    fn test_partial_marker_override() {
        let config: OptConfig = toml::from_str(
            r#"
            [markers]
            version = 2
            new_cost = "Best cost:"
        "#,
        )
        .unwrap();
        assert_eq!(config.markers.version, 2);
        assert_eq!(config.markers.new_cost, "Best cost:");
        assert_eq!(config.markers.original_cost, ">>> original cost:");
    }

    #[test]
    fn test_default_toml_parses() {
        let config: OptConfig = toml::from_str(&OptConfig::default_toml()).unwrap();
        assert_eq!(config.runner.timeout, "300s");
        assert_eq!(config.optimizer.args, vec!["optimize.rkt"]);
        assert_eq!(config.markers, MarkerGrammar::default());
    }

    #[test]
    fn test_load_reports_bad_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[runner]\njobs = \"many\"\n").unwrap();
        let err = OptConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("Invalid config"));
    }
}
