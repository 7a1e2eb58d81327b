#![warn(missing_docs)]
//! optmatrix Core - Job Model and Output Grammar
//!
//! This crate holds the types every other optmatrix crate exchanges:
//! - `Mode` and `TestJob`: one (workload, search mode) unit of the job matrix
//! - `TestResult` and `JobStatus`: the classified outcome of running one job
//! - `MarkerGrammar`: the versioned line-oriented contract used to scrape
//!   costs and improvements out of the optimizer's captured output

mod job;
mod markers;
mod result;

pub use job::{Mode, ModeError, TestJob, workload_id};
pub use markers::{MARKER_GRAMMAR_VERSION, MarkerGrammar, ParsedOutput};
pub use result::{JobStatus, TestResult};
