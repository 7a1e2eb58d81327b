//! Job Planner
//!
//! Discovers workloads and builds the (workload × mode) job matrix.
//!
//! Selection options:
//! - Glob pattern matched against file names in the workload directory
//! - Substring exclusion on file names
//! - Regex filter on the workload ID
//!
//! Ordering: workloads are sorted by ID, jobs are emitted workload-major in
//! configured mode order. Only regular files directly inside the directory are
//! considered.

use globset::{Glob, GlobMatcher};
use optmatrix_core::{Mode, TestJob, workload_id};
use regex::Regex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("Cannot read workload directory {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid workload pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("Workloads {first} and {second} share the ID {id:?}")]
    DuplicateWorkload {
        id: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("Mode {0:?} is listed more than once")]
    DuplicateMode(String),

    #[error("No modes configured")]
    NoModes,
}

/// How workloads are selected from a directory
#[derive(Debug, Clone)]
pub struct WorkloadSelection {
    /// Directory scanned (not recursively)
    pub directory: PathBuf,
    /// Glob matched against each file name
    pub pattern: String,
    /// File names containing any of these substrings are skipped
    pub exclude: Vec<String>,
    /// Optional regex the workload ID must match
    pub filter: Option<Regex>,
}

/// A discovered workload file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workload {
    /// Identifier (file stem)
    pub id: String,
    /// Path as found in the workload directory
    pub path: PathBuf,
}

/// Execution plan for a run
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    /// Workloads ordered by ID
    pub workloads: Vec<Workload>,
    /// Modes in configured order
    pub modes: Vec<Mode>,
}

impl ExecutionPlan {
    /// Number of jobs in the matrix
    pub fn job_count(&self) -> usize {
        self.workloads.len() * self.modes.len()
    }

    /// Expand the matrix into jobs writing into `output_dir`
    pub fn jobs(&self, output_dir: &Path) -> Vec<TestJob> {
        self.workloads
            .iter()
            .flat_map(|w| {
                self.modes
                    .iter()
                    .map(move |m| TestJob::new(w.path.clone(), m.clone(), output_dir))
            })
            .collect()
    }
}

/// Enumerate the workloads selected by `selection`, ordered by ID.
///
/// Two files mapping to the same ID would write to the same log files, so that
/// is reported as an error rather than resolved silently.
pub fn enumerate_workloads(selection: &WorkloadSelection) -> Result<Vec<Workload>, PlanError> {
    let matcher = compile_pattern(&selection.pattern)?;
    let unreadable = |source| PlanError::Unreadable {
        path: selection.directory.clone(),
        source,
    };

    let mut workloads = Vec::new();
    for entry in std::fs::read_dir(&selection.directory).map_err(unreadable)? {
        let entry = entry.map_err(unreadable)?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let file_name = entry.file_name();
        let file_name = file_name.to_string_lossy();
        if !matcher.is_match(file_name.as_ref()) {
            continue;
        }
        if selection
            .exclude
            .iter()
            .any(|s| !s.is_empty() && file_name.contains(s.as_str()))
        {
            tracing::debug!(file = %file_name, "workload excluded");
            continue;
        }

        let id = workload_id(&path);
        if let Some(re) = &selection.filter {
            if !re.is_match(&id) {
                continue;
            }
        }

        workloads.push(Workload { id, path });
    }

    workloads.sort_by(|a, b| a.id.cmp(&b.id).then_with(|| a.path.cmp(&b.path)));

    for pair in workloads.windows(2) {
        if pair[0].id == pair[1].id {
            return Err(PlanError::DuplicateWorkload {
                id: pair[0].id.clone(),
                first: pair[0].path.clone(),
                second: pair[1].path.clone(),
            });
        }
    }

    Ok(workloads)
}

fn compile_pattern(pattern: &str) -> Result<GlobMatcher, PlanError> {
    Glob::new(pattern)
        .map(|g| g.compile_matcher())
        .map_err(|source| PlanError::Pattern {
            pattern: pattern.to_string(),
            source,
        })
}

/// Build the execution plan from a selection and the configured modes
pub fn build_plan(selection: &WorkloadSelection, modes: &[Mode]) -> Result<ExecutionPlan, PlanError> {
    if modes.is_empty() {
        return Err(PlanError::NoModes);
    }
    let mut seen = HashSet::new();
    for mode in modes {
        if !seen.insert(mode.as_str()) {
            return Err(PlanError::DuplicateMode(mode.to_string()));
        }
    }

    let workloads = enumerate_workloads(selection)?;
    Ok(ExecutionPlan {
        workloads,
        modes: modes.to_vec(),
    })
}
