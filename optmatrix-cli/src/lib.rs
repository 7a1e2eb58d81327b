#![warn(missing_docs)]
//! optmatrix CLI Library
//!
//! Runs an external superoptimizer over every (workload, mode) pair of a test
//! matrix with bounded parallelism, a hard per-job time limit and one log file
//! per job, then writes a summary of costs and improvements.
//!
//! # Example
//!
//! ```ignore
//! fn main() {
//!     match optmatrix_cli::run() {
//!         Ok(code) => std::process::exit(code),
//!         Err(e) => {
//!             eprintln!("Error: {e:#}");
//!             std::process::exit(2);
//!         }
//!     }
//! }
//! ```

mod config;
mod executor;
mod output;
mod planner;
mod settings;
mod supervisor;

pub use config::*;
pub use executor::{
    JobExecutor, ScheduleOutcome, Scheduler, SchedulerEvent, build_report, build_report_meta,
    format_finish_line, format_header, format_human_output, format_plan, format_run_dir_created,
    format_start_line, format_summary_created, status_glyph,
};
pub use output::{create_run_dir, write_summary};
pub use planner::*;
pub use settings::{Overrides, RunSettings};
pub use supervisor::*;

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use optmatrix_report::Report;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// optmatrix CLI arguments
#[derive(Parser, Debug)]
#[command(name = "optmatrix")]
#[command(
    author,
    version,
    about = "optmatrix - parallel test matrix runner for program superoptimizers"
)]
pub struct Cli {
    /// Optional subcommand (Run, List, Init); defaults to Run
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Configuration file (default: optmatrix.toml found by walking up from the current directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory containing the workload files
    #[arg(long, global = true)]
    pub workloads: Option<PathBuf>,

    /// Glob matched against workload file names (e.g. "*.s")
    #[arg(long, global = true)]
    pub pattern: Option<String>,

    /// Skip workloads whose file name contains this text (repeatable; replaces the configured list)
    #[arg(long, global = true)]
    pub exclude: Vec<String>,

    /// Search mode to run (repeatable; replaces the configured list)
    #[arg(long = "mode", global = true)]
    pub modes: Vec<String>,

    /// Only run workloads whose ID matches this regex
    #[arg(long, global = true)]
    pub filter: Option<String>,

    /// Maximum number of optimizer processes running at once
    #[arg(short, long, global = true)]
    pub jobs: Option<usize>,

    /// Cores handed to each optimizer process
    #[arg(long, global = true)]
    pub cores: Option<u32>,

    /// Per-job time limit (e.g. "300s", "5m")
    #[arg(long, global = true)]
    pub timeout: Option<String>,

    /// Directory under which the run directory is created
    #[arg(long, global = true)]
    pub output_root: Option<PathBuf>,

    /// Summary format: markdown or json
    #[arg(long, global = true)]
    pub format: Option<String>,

    /// Dry run - list the job matrix without executing
    #[arg(long)]
    pub dry_run: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the job matrix (default)
    Run,
    /// List the planned workloads and jobs without running them
    List,
    /// Print a default optmatrix.toml
    Init,
}

impl Cli {
    /// Command line values that override the configuration file
    pub fn overrides(&self) -> Overrides {
        Overrides {
            workloads: self.workloads.clone(),
            pattern: self.pattern.clone(),
            exclude: self.exclude.clone(),
            modes: self.modes.clone(),
            filter: self.filter.clone(),
            jobs: self.jobs,
            cores: self.cores,
            timeout: self.timeout.clone(),
            output_root: self.output_root.clone(),
            format: self.format.clone(),
        }
    }
}

/// How run progress is shown on the console
#[derive(Debug, Clone, Copy)]
pub struct ConsoleOptions {
    /// Emit ANSI colors
    pub color: bool,
    /// Draw a progress bar
    pub progress: bool,
    /// Print nothing but warnings and errors
    pub quiet: bool,
}

impl ConsoleOptions {
    /// No console output at all
    pub fn quiet() -> Self {
        Self {
            color: false,
            progress: false,
            quiet: true,
        }
    }

    fn detect(no_color: bool) -> Self {
        let terminal = std::io::stdout().is_terminal();
        Self {
            color: terminal && !no_color && std::env::var_os("NO_COLOR").is_none(),
            progress: terminal,
            quiet: false,
        }
    }
}

/// Artifacts of a completed run
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Directory holding the logs and the summary
    pub run_dir: PathBuf,
    /// Path of the persisted summary
    pub summary_path: PathBuf,
    /// Aggregated report
    pub report: Report,
    /// Highest number of jobs observed running at once
    pub peak_active: usize,
}

impl RunOutcome {
    /// Process exit status: 1 when any job errored, else 0
    pub fn exit_code(&self) -> i32 {
        self.report.summary.exit_code()
    }
}

/// Run the optmatrix CLI with the process arguments.
///
/// # Returns
/// The process exit status for a completed command, or an error for fatal
/// configuration problems.
pub fn run() -> anyhow::Result<i32> {
    let cli = Cli::parse();
    run_with_cli(cli)
}

/// Run the optmatrix CLI with pre-parsed arguments.
pub fn run_with_cli(cli: Cli) -> anyhow::Result<i32> {
    init_logging(cli.verbose);

    if matches!(cli.command, Some(Commands::Init)) {
        print!("{}", OptConfig::default_toml());
        return Ok(0);
    }

    // Discover optmatrix.toml configuration (CLI flags override)
    let config = OptConfig::resolve(cli.config.as_deref())?;
    let settings = RunSettings::resolve(&config, &cli.overrides())?;
    let console = ConsoleOptions::detect(cli.no_color);

    match cli.command {
        Some(Commands::List) => list_jobs(&settings),
        Some(Commands::Run) => run_command(&settings, &console),
        Some(Commands::Init) => Ok(0),
        None => {
            // Default: run the matrix
            if cli.dry_run {
                list_jobs(&settings)
            } else {
                run_command(&settings, &console)
            }
        }
    }
}

/// Install the stderr tracing subscriber. `RUST_LOG` takes precedence.
fn init_logging(verbose: bool) {
    let default = if verbose {
        "optmatrix=debug"
    } else {
        "optmatrix=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    // A subscriber may already be installed when embedded.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn list_jobs(settings: &RunSettings) -> anyhow::Result<i32> {
    let plan = build_plan(&settings.selection, &settings.modes)?;

    println!("optmatrix plan:");
    for workload in &plan.workloads {
        println!("├── {} ({})", workload.id, workload.path.display());
        for mode in &plan.modes {
            println!("│   ├── {}", mode);
        }
    }
    println!(
        "{} workloads × {} modes = {} jobs.",
        plan.workloads.len(),
        plan.modes.len(),
        plan.job_count()
    );
    Ok(0)
}

fn run_command(settings: &RunSettings, console: &ConsoleOptions) -> anyhow::Result<i32> {
    print!("{}", format_header(console.color));
    println!();

    let outcome = run_matrix(settings, console)?;

    print!("{}", format_human_output(&outcome.report, console.color));
    println!();
    println!(
        "{}",
        format_summary_created(&outcome.summary_path, console.color)
    );

    let code = outcome.exit_code();
    if code != 0 {
        eprintln!(
            "\n{} job(s) failed to execute",
            outcome.report.summary.error
        );
    }
    Ok(code)
}

/// Plan, execute and report one run of the matrix.
///
/// Per-job failures never surface here; they are results in the report. Errors
/// are limited to planning, the run directory and the summary file.
pub fn run_matrix(settings: &RunSettings, console: &ConsoleOptions) -> anyhow::Result<RunOutcome> {
    let plan = build_plan(&settings.selection, &settings.modes)?;
    if plan.workloads.is_empty() {
        tracing::warn!(
            directory = %settings.selection.directory.display(),
            pattern = %settings.selection.pattern,
            "no workloads matched"
        );
    }

    let run_dir = create_run_dir(
        &settings.output_root,
        &settings.dir_prefix,
        chrono::Local::now(),
    )?;
    let jobs = plan.jobs(&run_dir);
    let job_count = jobs.len();

    if !console.quiet {
        println!("{}\n", format_run_dir_created(&run_dir, console.color));
        let ids: Vec<String> = plan.workloads.iter().map(|w| w.id.clone()).collect();
        println!(
            "{}",
            format_plan(
                &ids,
                job_count,
                settings.limits.time_limit,
                settings.max_parallel,
                console.color
            )
        );
    }

    let pb = if console.progress && !console.quiet {
        let pb = ProgressBar::new(job_count as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        pb
    } else {
        ProgressBar::hidden()
    };

    let runner = ProcessRunner::new(
        settings.command.clone(),
        settings.limits,
        settings.grammar.clone(),
    );
    let scheduler = Scheduler::new(runner, settings.max_parallel);
    let time_limit = settings.limits.time_limit;

    let start_time = Instant::now();
    let schedule = scheduler.run(jobs, |event| {
        let line = match event {
            SchedulerEvent::Started(job) => {
                pb.set_message(job.label());
                format_start_line(job, console.color)
            }
            SchedulerEvent::Finished(result) => {
                pb.inc(1);
                format_finish_line(result, time_limit, console.color)
            }
        };
        if console.quiet {
            return;
        }
        if pb.is_hidden() {
            println!("{line}");
        } else {
            pb.println(line);
        }
    });
    pb.finish_and_clear();
    let wall_time = start_time.elapsed();

    tracing::debug!(
        jobs = job_count,
        peak_active = schedule.peak_active,
        "matrix finished"
    );

    let meta = build_report_meta(settings, &run_dir);
    let report = build_report(&schedule.results, &plan.modes, meta, job_count, wall_time);
    let summary_path = write_summary(&run_dir, &report, settings.format)?;

    Ok(RunOutcome {
        run_dir,
        summary_path,
        report,
        peak_active: schedule.peak_active,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_flags() {
        let cli = Cli::try_parse_from([
            "optmatrix",
            "run",
            "-j",
            "2",
            "--mode",
            "sym",
            "--mode",
            "stoch",
            "--exclude",
            "slow",
            "--timeout",
            "10s",
            "--format",
            "json",
        ])
        .unwrap();
        assert!(matches!(cli.command, Some(Commands::Run)));
        let overrides = cli.overrides();
        assert_eq!(overrides.jobs, Some(2));
        assert_eq!(overrides.modes, vec!["sym", "stoch"]);
        assert_eq!(overrides.exclude, vec!["slow"]);
        assert_eq!(overrides.timeout.as_deref(), Some("10s"));
        assert_eq!(overrides.format.as_deref(), Some("json"));
    }

    #[test]
    fn test_default_command_and_dry_run() {
        let cli = Cli::try_parse_from(["optmatrix", "--dry-run", "--no-color"]).unwrap();
        assert!(cli.command.is_none());
        assert!(cli.dry_run);
        assert!(cli.no_color);
        assert!(cli.overrides().modes.is_empty());
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
