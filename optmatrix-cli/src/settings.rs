//! Effective run settings: defaults, then the config file, then command line overrides.

use crate::config::OptConfig;
use crate::planner::WorkloadSelection;
use crate::supervisor::{OptimizerCommand, RunLimits};
use anyhow::{Context, bail};
use optmatrix_core::{MarkerGrammar, Mode};
use optmatrix_report::OutputFormat;
use regex::Regex;
use std::path::PathBuf;

/// Command line values; `None` or empty keeps the configured value
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    /// Workload directory
    pub workloads: Option<PathBuf>,
    /// File name glob
    pub pattern: Option<String>,
    /// Replaces the configured exclusion list when non-empty
    pub exclude: Vec<String>,
    /// Replaces the configured mode list when non-empty
    pub modes: Vec<String>,
    /// Regex on workload IDs
    pub filter: Option<String>,
    /// Maximum concurrent jobs
    pub jobs: Option<usize>,
    /// Cores per optimizer process
    pub cores: Option<u32>,
    /// Per-job time limit
    pub timeout: Option<String>,
    /// Parent of the run directory
    pub output_root: Option<PathBuf>,
    /// Summary format
    pub format: Option<String>,
}

/// Fully resolved settings for one run
#[derive(Debug, Clone)]
pub struct RunSettings {
    /// Which workloads to run
    pub selection: WorkloadSelection,
    /// Modes in reporting order
    pub modes: Vec<Mode>,
    /// Optimizer invocation
    pub command: OptimizerCommand,
    /// Per-job time limits
    pub limits: RunLimits,
    /// Concurrency bound
    pub max_parallel: usize,
    /// Output marker vocabulary
    pub grammar: MarkerGrammar,
    /// Parent of the run directory
    pub output_root: PathBuf,
    /// Run directory name prefix
    pub dir_prefix: String,
    /// Summary format
    pub format: OutputFormat,
}

impl RunSettings {
    /// Merge `config` with `overrides` and validate the result
    pub fn resolve(config: &OptConfig, overrides: &Overrides) -> anyhow::Result<Self> {
        let timeout = overrides
            .timeout
            .as_deref()
            .unwrap_or(&config.runner.timeout);
        let time_limit = OptConfig::parse_duration(timeout)
            .with_context(|| format!("invalid timeout {timeout:?}"))?;
        if time_limit.is_zero() {
            bail!("timeout must be greater than zero");
        }
        let kill_grace = OptConfig::parse_duration(&config.runner.kill_grace)
            .with_context(|| format!("invalid kill_grace {:?}", config.runner.kill_grace))?;

        let max_parallel = overrides.jobs.unwrap_or(config.runner.jobs);
        if max_parallel == 0 {
            bail!("jobs must be at least 1");
        }
        let cores_per_job = overrides.cores.unwrap_or(config.runner.cores_per_job);
        if cores_per_job == 0 {
            bail!("cores per job must be at least 1");
        }

        let mode_names = if overrides.modes.is_empty() {
            &config.workloads.modes
        } else {
            &overrides.modes
        };
        let modes = mode_names
            .iter()
            .map(|name| Mode::new(name.as_str()))
            .collect::<Result<Vec<_>, _>>()?;

        let filter = overrides
            .filter
            .as_deref()
            .map(Regex::new)
            .transpose()
            .context("invalid --filter regex")?;

        let format_name = overrides
            .format
            .as_deref()
            .unwrap_or(&config.output.format);
        let format: OutputFormat = format_name
            .parse()
            .map_err(|e| anyhow::anyhow!("{e}"))?;

        if config.optimizer.program.trim().is_empty() {
            bail!("optimizer program is empty");
        }

        Ok(Self {
            selection: WorkloadSelection {
                directory: overrides
                    .workloads
                    .clone()
                    .unwrap_or_else(|| PathBuf::from(&config.workloads.directory)),
                pattern: overrides
                    .pattern
                    .clone()
                    .unwrap_or_else(|| config.workloads.pattern.clone()),
                exclude: if overrides.exclude.is_empty() {
                    config.workloads.exclude.clone()
                } else {
                    overrides.exclude.clone()
                },
                filter,
            },
            modes,
            command: OptimizerCommand {
                program: config.optimizer.program.clone(),
                args: config.optimizer.args.clone(),
                optimize_pass: config.optimizer.optimize_pass,
                cores_per_job,
                working_dir: config.optimizer.working_dir.as_ref().map(PathBuf::from),
            },
            limits: RunLimits {
                time_limit,
                kill_grace,
                ..RunLimits::default()
            },
            max_parallel,
            grammar: config.markers.clone(),
            output_root: overrides
                .output_root
                .clone()
                .unwrap_or_else(|| PathBuf::from(&config.output.root)),
            dir_prefix: config.output.dir_prefix.clone(),
            format,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_defaults() {
        let settings = RunSettings::resolve(&OptConfig::default(), &Overrides::default()).unwrap();
        assert_eq!(settings.limits.time_limit, Duration::from_secs(300));
        assert_eq!(settings.limits.kill_grace, Duration::from_millis(500));
        assert_eq!(settings.max_parallel, 4);
        assert_eq!(settings.command.cores_per_job, 1);
        assert_eq!(settings.selection.directory, PathBuf::from("programs"));
        assert_eq!(settings.format, OutputFormat::Markdown);
        let modes: Vec<_> = settings.modes.iter().map(Mode::as_str).collect();
        assert_eq!(modes, vec!["sym", "stoch"]);
    }

    #[test]
    fn test_overrides_win() {
        let overrides = Overrides {
            workloads: Some(PathBuf::from("other")),
            exclude: vec!["slow".to_string()],
            modes: vec!["stoch".to_string()],
            filter: Some("^add".to_string()),
            jobs: Some(8),
            cores: Some(2),
            timeout: Some("2s".to_string()),
            format: Some("json".to_string()),
            ..Default::default()
        };
        let settings = RunSettings::resolve(&OptConfig::default(), &overrides).unwrap();
        assert_eq!(settings.selection.directory, PathBuf::from("other"));
        assert_eq!(settings.selection.exclude, vec!["slow"]);
        assert!(settings.selection.filter.is_some());
        assert_eq!(settings.modes.len(), 1);
        assert_eq!(settings.max_parallel, 8);
        assert_eq!(settings.command.cores_per_job, 2);
        assert_eq!(settings.limits.time_limit, Duration::from_secs(2));
        assert_eq!(settings.format, OutputFormat::Json);
    }

    #[test]
    fn test_rejects_invalid_values() {
        let config = OptConfig::default();
        let bad = [
            Overrides {
                jobs: Some(0),
                ..Default::default()
            },
            Overrides {
                timeout: Some("soon".to_string()),
                ..Default::default()
            },
            Overrides {
                timeout: Some("0s".to_string()),
                ..Default::default()
            },
            Overrides {
                modes: vec!["bad mode".to_string()],
                ..Default::default()
            },
            Overrides {
                filter: Some("(".to_string()),
                ..Default::default()
            },
            Overrides {
                format: Some("html".to_string()),
                ..Default::default()
            },
        ];
        for overrides in &bad {
            assert!(
                RunSettings::resolve(&config, overrides).is_err(),
                "{overrides:?} should be rejected"
            );
        }
    }
}
