//! Job Results

use crate::job::{Mode, TestJob};
use crate::markers::ParsedOutput;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Outcome classification of one job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobStatus {
    /// The optimizer exited within the time limit, whatever its exit code
    Success,
    /// The time limit expired and the optimizer was terminated
    Timeout,
    /// The job could not be executed or its output could not be recorded
    Error,
}

impl JobStatus {
    /// Upper-case status label (`SUCCESS`, `TIMEOUT`, `ERROR`)
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Success => "SUCCESS",
            JobStatus::Timeout => "TIMEOUT",
            JobStatus::Error => "ERROR",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one job.
///
/// Cost and improvement fields are only set when the matching marker was seen
/// in the captured output of a successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResult {
    /// Workload identifier
    pub workload: String,
    /// Search mode
    pub mode: Mode,
    /// Outcome classification
    pub status: JobStatus,
    /// Log artifact written for this job
    pub log_path: PathBuf,
    /// Cost reported by the `original cost` marker
    pub original_cost: Option<i64>,
    /// Cost reported by the `New cost` marker
    pub new_cost: Option<i64>,
    /// Text following the `Improvement:` marker
    pub improvement: Option<String>,
    /// Whether `IMPROVEMENT FOUND` appeared anywhere in the output
    pub improvement_found: bool,
    /// Exit code of the optimizer (successful runs only; informational)
    pub exit_code: Option<i32>,
    /// Failure description for timeouts and errors
    pub message: Option<String>,
    /// Wall-clock time from spawn to classification
    pub elapsed: Duration,
}

impl TestResult {
    /// Successful run with fields scraped from its output
    pub fn success(
        job: &TestJob,
        parsed: ParsedOutput,
        exit_code: Option<i32>,
        elapsed: Duration,
    ) -> Self {
        Self {
            original_cost: parsed.original_cost,
            new_cost: parsed.new_cost,
            improvement: parsed.improvement,
            improvement_found: parsed.improvement_found,
            exit_code,
            ..Self::bare(job, JobStatus::Success, elapsed)
        }
    }

    /// Run terminated after exceeding `limit`
    pub fn timeout(job: &TestJob, limit: Duration, elapsed: Duration) -> Self {
        Self {
            message: Some(format!("exceeded {:.1}s time limit", limit.as_secs_f64())),
            ..Self::bare(job, JobStatus::Timeout, elapsed)
        }
    }

    /// Run that failed for any reason other than the time limit
    pub fn error(job: &TestJob, message: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::bare(job, JobStatus::Error, elapsed)
        }
    }

    fn bare(job: &TestJob, status: JobStatus, elapsed: Duration) -> Self {
        Self {
            workload: job.workload.clone(),
            mode: job.mode.clone(),
            status,
            log_path: job.log_path(),
            original_cost: None,
            new_cost: None,
            improvement: None,
            improvement_found: false,
            exit_code: None,
            message: None,
            elapsed,
        }
    }

    /// Whether a non-empty improvement description was reported
    pub fn has_improvement(&self) -> bool {
        self.improvement.as_deref().is_some_and(|s| !s.is_empty())
    }

    /// Short `workload (mode)` label used in progress lines
    pub fn label(&self) -> String {
        format!("{} ({})", self.workload, self.mode)
    }
}
