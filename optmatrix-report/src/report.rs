//! Report Data Structures

use chrono::{DateTime, Utc};
use optmatrix_core::{JobStatus, TestResult};
use serde::{Deserialize, Serialize};

/// Version of the JSON report layout
pub const REPORT_SCHEMA_VERSION: u32 = 1;

/// Complete run report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub meta: ReportMeta,
    /// Workloads in lexicographic order
    pub workloads: Vec<WorkloadReport>,
    pub summary: ReportSummary,
}

/// Report metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMeta {
    pub schema_version: u32,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub git_commit: Option<String>,
    pub git_branch: Option<String>,
    pub system: SystemInfo,
    pub config: ReportConfig,
    /// Run directory holding the logs and this report
    pub output_dir: String,
}

/// Run configuration captured in report metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    pub time_limit_secs: f64,
    pub max_parallel_jobs: usize,
    pub cores_per_job: u32,
    /// Modes in reporting order
    pub modes: Vec<String>,
    /// Optimizer command line prefix (before mode and workload arguments)
    pub optimizer: Vec<String>,
    pub workload_dir: String,
    pub marker_grammar_version: u32,
}

/// Host information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInfo {
    pub os: String,
    pub arch: String,
    pub hostname: Option<String>,
    pub cpu_cores: u32,
}

/// All results of one workload, in configured mode order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadReport {
    pub workload: String,
    pub entries: Vec<ReportEntry>,
}

/// One (workload, mode) result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub mode: String,
    pub status: JobStatus,
    pub original_cost: Option<i64>,
    pub new_cost: Option<i64>,
    pub improvement: Option<String>,
    pub improvement_found: bool,
    pub exit_code: Option<i32>,
    pub message: Option<String>,
    pub elapsed_secs: f64,
    pub log_path: String,
}

impl From<&TestResult> for ReportEntry {
    fn from(result: &TestResult) -> Self {
        Self {
            mode: result.mode.to_string(),
            status: result.status,
            original_cost: result.original_cost,
            new_cost: result.new_cost,
            improvement: result.improvement.clone(),
            improvement_found: result.improvement_found,
            exit_code: result.exit_code,
            message: result.message.clone(),
            elapsed_secs: result.elapsed.as_secs_f64(),
            log_path: result.log_path.display().to_string(),
        }
    }
}

impl ReportEntry {
    /// Whether a non-empty improvement description was reported
    pub fn has_improvement(&self) -> bool {
        self.improvement.as_deref().is_some_and(|s| !s.is_empty())
    }
}

/// Run totals
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    /// Jobs submitted to the scheduler
    pub expected_jobs: usize,
    /// Results received (always equal to `expected_jobs` for a complete run)
    pub total_jobs: usize,
    pub success: usize,
    pub timeout: usize,
    pub error: usize,
    /// Results carrying a non-empty improvement description
    pub improvements: usize,
    /// Sum of per-job elapsed times
    pub total_job_secs: f64,
    /// Wall-clock duration of the whole run
    pub wall_time_secs: f64,
}

impl ReportSummary {
    /// Process exit status for this run: 1 when any job errored, else 0.
    /// Timeouts never fail a run.
    pub fn exit_code(&self) -> i32 {
        if self.error > 0 { 1 } else { 0 }
    }
}
