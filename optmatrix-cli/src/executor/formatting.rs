//! Output Formatting
//!
//! Human-readable console output for runs. Every function is pure: the caller
//! decides whether color is wanted and passes the flag in.
//!
//! Generates terminal-friendly output with:
//! - Run banner and plan listing
//! - Per-job start and finish lines
//! - Per-workload results with status glyphs (✓/⏱/✗)
//! - Run totals and the log location

use optmatrix_core::{JobStatus, TestJob, TestResult};
use optmatrix_report::{Report, ReportEntry};
use std::path::Path;
use std::time::Duration;

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const BLUE: &str = "\x1b[34m";
const CYAN: &str = "\x1b[36m";

/// Wrap `text` in an ANSI style when `color` is set
pub fn paint(text: &str, style: &str, color: bool) -> String {
    if color {
        format!("{style}{text}{RESET}")
    } else {
        text.to_string()
    }
}

fn status_style(status: JobStatus) -> &'static str {
    match status {
        JobStatus::Success => GREEN,
        JobStatus::Timeout => YELLOW,
        JobStatus::Error => RED,
    }
}

/// Status with its glyph: `✓ SUCCESS`, `⏱ TIMEOUT` or `✗ ERROR`
pub fn status_glyph(status: JobStatus) -> &'static str {
    match status {
        JobStatus::Success => "✓ SUCCESS",
        JobStatus::Timeout => "⏱ TIMEOUT",
        JobStatus::Error => "✗ ERROR",
    }
}

fn rule(color: bool) -> String {
    paint(&"=".repeat(60), BLUE, color)
}

/// Run banner
pub fn format_header(color: bool) -> String {
    let title = if color {
        format!("{BLUE}{BOLD}Optimizer Parallel Test Suite{RESET}")
    } else {
        "Optimizer Parallel Test Suite".to_string()
    };
    format!("{}\n{}\n{}\n", rule(color), title, rule(color))
}

/// Workload listing and run parameters printed before any job starts
pub fn format_plan(
    workloads: &[String],
    job_count: usize,
    time_limit: Duration,
    max_parallel: usize,
    color: bool,
) -> String {
    let mut output = String::new();
    output.push_str(&paint(
        &format!("Programs to test ({} total):", workloads.len()),
        BLUE,
        color,
    ));
    output.push('\n');
    for workload in workloads {
        output.push_str(&format!("  - {}\n", workload));
    }
    output.push('\n');
    for line in [
        format!("Running {} tests in parallel...", job_count),
        format!("Time limit per test: {}", format_secs(time_limit)),
        format!("Max parallel jobs: {}", max_parallel),
    ] {
        output.push_str(&paint(&line, BLUE, color));
        output.push('\n');
    }
    output
}

/// `[START]` line for a job a worker just picked up
pub fn format_start_line(job: &TestJob, color: bool) -> String {
    format!(
        "{} Testing {} with {} mode...",
        paint("[START]", YELLOW, color),
        job.workload,
        job.mode
    )
}

/// `[DONE]`, `[TIMEOUT]` or `[ERROR]` line for a collected result
pub fn format_finish_line(result: &TestResult, time_limit: Duration, color: bool) -> String {
    let label = result.label();
    match result.status {
        JobStatus::Success if result.improvement_found => format!(
            "{} {} - {}",
            paint("[DONE]", GREEN, color),
            label,
            paint("IMPROVEMENT FOUND!", GREEN, color)
        ),
        JobStatus::Success => format!(
            "{} {} - {:.1}s",
            paint("[DONE]", GREEN, color),
            label,
            result.elapsed.as_secs_f64()
        ),
        JobStatus::Timeout => format!(
            "{} {} - Exceeded {}",
            paint("[TIMEOUT]", YELLOW, color),
            label,
            format_secs(time_limit)
        ),
        JobStatus::Error => format!(
            "{} {} - {}",
            paint("[ERROR]", RED, color),
            label,
            result.message.as_deref().unwrap_or("unknown error")
        ),
    }
}

fn format_entry(entry: &ReportEntry, color: bool) -> String {
    let mut extra = Vec::new();
    if let Some(cost) = entry.original_cost {
        extra.push(format!("cost={}", cost));
    }
    if entry.has_improvement() {
        let improvement = entry.improvement.as_deref().unwrap_or_default();
        extra.push(paint(&format!("IMPROVED: {}", improvement), GREEN, color));
    }
    if entry.elapsed_secs > 0.0 {
        extra.push(format!("{:.1}s", entry.elapsed_secs));
    }

    let extra = if extra.is_empty() {
        String::new()
    } else {
        format!(" ({})", extra.join(", "))
    };
    format!(
        "  {:<6}: {}{}",
        entry.mode,
        paint(status_glyph(entry.status), status_style(entry.status), color),
        extra
    )
}

/// Format a report for human-readable terminal display
///
/// # Arguments
/// * `report` - Complete run report
/// * `color` - Emit ANSI colors
///
/// # Returns
/// Formatted string suitable for terminal output
pub fn format_human_output(report: &Report, color: bool) -> String {
    let mut output = String::new();

    output.push('\n');
    output.push_str(&rule(color));
    output.push('\n');
    output.push_str(&paint("Test Summary", BOLD, color));
    output.push('\n');
    output.push_str(&rule(color));
    output.push_str("\n\n");

    for workload in &report.workloads {
        output.push_str(&paint(
            &format!("Program: {}", workload.workload),
            BOLD,
            color,
        ));
        output.push('\n');
        for entry in &workload.entries {
            output.push_str(&format_entry(entry, color));
            output.push('\n');
        }
        output.push('\n');
    }

    let summary = &report.summary;
    output.push_str(&rule(color));
    output.push('\n');
    for (line, style) in [
        (format!("Total SUCCESS: {}", summary.success), GREEN),
        (format!("Total TIMEOUT: {}", summary.timeout), YELLOW),
        (format!("Total ERROR: {}", summary.error), RED),
        (
            format!("Programs with IMPROVEMENTS: {}", summary.improvements),
            CYAN,
        ),
    ] {
        output.push_str(&paint(&line, style, color));
        output.push('\n');
    }
    output.push_str(&format!(
        "Wall time: {:.1}s  (job time {:.1}s)\n",
        summary.wall_time_secs, summary.total_job_secs
    ));
    output.push_str(&rule(color));
    output.push_str("\n\n");
    output.push_str(&paint(
        &format!(
            "Detailed logs available in: {}/",
            report.meta.output_dir.trim_end_matches('/')
        ),
        BLUE,
        color,
    ));
    output.push('\n');

    output
}

/// Line announcing the run directory
pub fn format_run_dir_created(path: &Path, color: bool) -> String {
    paint(
        &format!("Created output directory: {}", path.display()),
        GREEN,
        color,
    )
}

/// Closing line naming the persisted summary
pub fn format_summary_created(path: &Path, color: bool) -> String {
    paint(
        &format!("Summary report created: {}", path.display()),
        GREEN,
        color,
    )
}

fn format_secs(duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs.fract() == 0.0 {
        format!("{:.0}s", secs)
    } else {
        format!("{:.1}s", secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::metadata::tests::sample_meta;
    use optmatrix_core::{Mode, ParsedOutput};
    use optmatrix_report::{ReportSummary, WorkloadReport};

    fn job() -> TestJob {
        TestJob::new("programs/add.s", Mode::new("sym").unwrap(), "out")
    }

    #[test]
    fn test_plain_output_has_no_escapes() {
        let result = TestResult::error(&job(), "spawn failed", Duration::ZERO);
        let line = format_finish_line(&result, Duration::from_secs(300), false);
        assert_eq!(line, "[ERROR] add (sym) - spawn failed");
        assert!(!line.contains('\x1b'));
    }

    #[test]
    fn test_color_wraps_text() {
        assert_eq!(paint("x", GREEN, true), "\x1b[32mx\x1b[0m");
        assert_eq!(paint("x", GREEN, false), "x");
    }

    #[test]
    fn test_finish_lines() {
        let limit = Duration::from_secs(300);
        let found = TestResult::success(
            &job(),
            ParsedOutput {
                improvement_found: true,
                ..Default::default()
            },
            Some(0),
            Duration::from_secs(4),
        );
        assert_eq!(
            format_finish_line(&found, limit, false),
            "[DONE] add (sym) - IMPROVEMENT FOUND!"
        );

        let plain = TestResult::success(&job(), ParsedOutput::default(), Some(0), Duration::from_millis(1500));
        assert_eq!(format_finish_line(&plain, limit, false), "[DONE] add (sym) - 1.5s");

        let timeout = TestResult::timeout(&job(), limit, limit);
        assert_eq!(
            format_finish_line(&timeout, limit, false),
            "[TIMEOUT] add (sym) - Exceeded 300s"
        );
        assert_eq!(
            format_start_line(&job(), false),
            "[START] Testing add with sym mode..."
        );
    }

    #[test]
    fn test_human_output() {
        let success = TestResult::success(
            &job(),
            ParsedOutput {
                original_cost: Some(42),
                improvement: Some("3 -> 2".to_string()),
                ..Default::default()
            },
            Some(0),
            Duration::from_millis(1200),
        );
        let timeout = TestResult::timeout(
            &TestJob::new("programs/add.s", Mode::new("stoch").unwrap(), "out"),
            Duration::from_secs(2),
            Duration::from_secs(2),
        );
        let report = Report {
            meta: sample_meta(),
            workloads: vec![WorkloadReport {
                workload: "add".to_string(),
                entries: vec![ReportEntry::from(&success), ReportEntry::from(&timeout)],
            }],
            summary: ReportSummary {
                expected_jobs: 2,
                total_jobs: 2,
                success: 1,
                timeout: 1,
                improvements: 1,
                ..Default::default()
            },
        };

        let text = format_human_output(&report, false);
        assert!(text.contains("Program: add"));
        assert!(text.contains("  sym   : ✓ SUCCESS (cost=42, IMPROVED: 3 -> 2, 1.2s)"));
        assert!(text.contains("  stoch : ⏱ TIMEOUT (2.0s)"));
        assert!(text.contains("Total TIMEOUT: 1"));
        assert!(text.contains("Programs with IMPROVEMENTS: 1"));
        assert!(text.contains("Detailed logs available in: test_results_20240101_000000/"));
    }

    #[test]
    fn test_plan_listing() {
        let text = format_plan(
            &["add".to_string(), "sub".to_string()],
            4,
            Duration::from_millis(1500),
            2,
            false,
        );
        assert!(text.starts_with("Programs to test (2 total):\n  - add\n  - sub\n"));
        assert!(text.contains("Time limit per test: 1.5s"));
        assert!(text.contains("Max parallel jobs: 2"));
    }
}
