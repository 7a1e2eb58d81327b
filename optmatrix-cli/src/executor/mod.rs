//! Matrix Executor
//!
//! Runs the job matrix and turns the results into a report.
//!
//! ## Pipeline Overview
//!
//! ```text
//! TestJob × N·M (from the planner)
//!       │
//!       ▼
//! ┌─────────────┐
//! │  execution  │  Bounded worker pool, one optimizer process per job
//! └──────┬──────┘
//!        │
//!        ▼
//! ┌─────────────┐
//! │   report    │  Group by workload, order by mode, count
//! └──────┬──────┘
//!        │
//!        ▼
//! ┌─────────────┐
//! │ formatting  │  Human-readable output
//! └─────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`execution`] - Scheduler, worker pool and the `JobExecutor` seam
//! - [`report`] - Aggregation into the report model
//! - [`formatting`] - Console output
//! - [`metadata`] - Run metadata collection

mod execution;
mod formatting;
mod metadata;
mod report;

// Re-export public API
pub use execution::{JobExecutor, ScheduleOutcome, Scheduler, SchedulerEvent};
pub use formatting::{
    format_finish_line, format_header, format_human_output, format_plan, format_run_dir_created,
    format_start_line, format_summary_created, status_glyph,
};
pub use metadata::build_report_meta;
pub use report::build_report;
