#![warn(missing_docs)]
//! # optmatrix
//!
//! Parallel test matrix runner for program superoptimizers.
//!
//! optmatrix enumerates workload files, runs an external optimizer on every
//! (workload, search mode) pair and summarizes what it found:
//! - **Bounded parallelism**: at most `K` optimizer processes at a time
//! - **Hard time limits**: runaway searches are terminated with their whole process group
//! - **Complete accounting**: every job yields exactly one result, even if a worker panics
//! - **Per-job logs**: merged stdout/stderr of each run in the run directory
//! - **Summaries**: `SUMMARY.md` or `SUMMARY.json` with costs and improvements
//!
//! ## Quick Start
//!
//! ```ignore
//! use optmatrix::{ConsoleOptions, OptConfig, Overrides, RunSettings, run_matrix};
//!
//! let config = OptConfig::resolve(None)?;
//! let settings = RunSettings::resolve(&config, &Overrides::default())?;
//! let outcome = run_matrix(&settings, &ConsoleOptions::quiet())?;
//! std::process::exit(outcome.exit_code());
//! ```

// Re-export core types
pub use optmatrix_core::{
    JobStatus, MARKER_GRAMMAR_VERSION, MarkerGrammar, Mode, ModeError, ParsedOutput, TestJob,
    TestResult, workload_id,
};

// Re-export report types
pub use optmatrix_report::{
    OutputFormat, REPORT_SCHEMA_VERSION, Report, ReportConfig, ReportEntry, ReportMeta,
    ReportSummary, SystemInfo, WorkloadReport, generate_json_report, generate_markdown_report,
};

// Re-export the runner
pub use optmatrix_cli::{
    ConsoleOptions, ExecutionPlan, JobExecutor, OptConfig, OptimizerCommand, Overrides, PlanError,
    ProcessRunner, RunLimits, RunOutcome, RunSettings, ScheduleOutcome, Scheduler, SchedulerEvent,
    Workload, WorkloadSelection, build_plan, build_report, create_run_dir, enumerate_workloads,
    run_matrix, write_summary,
};

/// Run the optmatrix CLI and return the process exit status.
///
/// ```ignore
/// fn main() {
///     std::process::exit(optmatrix::run().unwrap_or(2));
/// }
/// ```
pub use optmatrix_cli::run;
