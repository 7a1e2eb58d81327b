//! Job Definitions
//!
//! A job is one (workload, mode) cell of the matrix. Jobs are built once by the
//! planner and handed by value to whichever worker picks them up.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Rejected mode names
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModeError {
    #[error("mode name is empty")]
    Empty,

    #[error("mode name {0:?} must contain only ASCII letters, digits, '-' or '_'")]
    InvalidCharacter(String),
}

/// Search strategy tag passed to the optimizer as `--<mode>`.
///
/// The name ends up both on the optimizer command line and inside log file
/// names, so it is restricted to `[A-Za-z0-9_-]`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Mode(String);

impl Mode {
    /// Validate and wrap a mode name
    pub fn new(name: impl Into<String>) -> Result<Self, ModeError> {
        let name = name.into();
        if name.is_empty() {
            return Err(ModeError::Empty);
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ModeError::InvalidCharacter(name));
        }
        Ok(Self(name))
    }

    /// Mode name as written on the command line (without the leading `--`)
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The optimizer flag selecting this mode
    pub fn flag(&self) -> String {
        format!("--{}", self.0)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Mode {
    type Err = ModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Mode::new(s)
    }
}

impl TryFrom<String> for Mode {
    type Error = ModeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Mode::new(value)
    }
}

impl From<Mode> for String {
    fn from(mode: Mode) -> Self {
        mode.0
    }
}

/// One unit of work: run `workload` under `mode`, writing into `output_dir`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestJob {
    /// Workload identifier (file stem)
    pub workload: String,
    /// Path handed to the optimizer
    pub workload_path: PathBuf,
    /// Search mode
    pub mode: Mode,
    /// Run directory shared by every job of the run
    pub output_dir: PathBuf,
}

impl TestJob {
    /// Create a job, deriving the workload identifier from the file stem
    pub fn new(
        workload_path: impl Into<PathBuf>,
        mode: Mode,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        let workload_path = workload_path.into();
        let workload = workload_id(&workload_path);
        Self {
            workload,
            workload_path,
            mode,
            output_dir: output_dir.into(),
        }
    }

    /// Log artifact for this job: `<output_dir>/<workload>_<mode>.log`
    pub fn log_path(&self) -> PathBuf {
        self.output_dir
            .join(format!("{}_{}.log", self.workload, self.mode))
    }

    /// Short `workload (mode)` label used in progress lines
    pub fn label(&self) -> String {
        format!("{} ({})", self.workload, self.mode)
    }
}

/// Identifier of a workload file: its stem, or the whole file name when there is no stem
pub fn workload_id(path: &Path) -> String {
    path.file_stem()
        .or_else(|| path.file_name())
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}
