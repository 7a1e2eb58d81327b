//! Markdown Summary
//!
//! Renders `SUMMARY.md`: run header, totals, then one section per workload
//! with one block per mode.

use crate::report::{Report, ReportEntry};
use chrono::Local;
use std::fmt::Write;

/// Render the report as a Markdown document
pub fn generate_markdown_report(report: &Report) -> String {
    let mut out = String::new();
    let summary = &report.summary;

    out.push_str("# Optimizer Test Summary\n\n");
    let _ = writeln!(
        out,
        "**Date**: {}",
        report
            .meta
            .timestamp
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
    );
    let _ = writeln!(
        out,
        "**Time Limit**: {}s per test",
        format_secs(report.meta.config.time_limit_secs)
    );
    let _ = writeln!(out, "**Total Tests**: {}", summary.total_jobs);
    let _ = writeln!(
        out,
        "**Modes**: {}\n",
        report.meta.config.modes.join(", ")
    );

    out.push_str("## Results\n\n");
    let _ = writeln!(out, "- ✓ Success: {}", summary.success);
    let _ = writeln!(out, "- ⏱ Timeout: {}", summary.timeout);
    let _ = writeln!(out, "- ✗ Error: {}", summary.error);
    let _ = writeln!(out, "- 🎯 Improvements Found: {}\n", summary.improvements);

    out.push_str("## Program Details\n\n");
    for workload in &report.workloads {
        let _ = writeln!(out, "### {}\n", workload.workload);
        for entry in &workload.entries {
            write_entry(&mut out, entry);
        }
        out.push('\n');
    }

    out
}

fn write_entry(out: &mut String, entry: &ReportEntry) {
    let _ = writeln!(out, "**Mode: {}**", entry.mode);
    let _ = writeln!(out, "- Status: {}", entry.status);
    if let Some(cost) = entry.original_cost {
        let _ = writeln!(out, "- Original Cost: {}", cost);
    }
    if let Some(cost) = entry.new_cost {
        let _ = writeln!(out, "- New Cost: {}", cost);
    }
    if entry.has_improvement() {
        let _ = writeln!(
            out,
            "- Improvement: {}",
            entry.improvement.as_deref().unwrap_or_default()
        );
    }
    if let Some(message) = &entry.message {
        let _ = writeln!(out, "- Message: {}", message);
    }
    let _ = writeln!(out, "- Time: {:.1}s", entry.elapsed_secs);
    let _ = writeln!(out, "- Log: {}\n", entry.log_path);
}

// Whole seconds print without a fraction ("300s"), anything else with one digit.
fn format_secs(secs: f64) -> String {
    if secs.fract() == 0.0 {
        format!("{:.0}", secs)
    } else {
        format!("{:.1}", secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{
        REPORT_SCHEMA_VERSION, ReportConfig, ReportMeta, ReportSummary, SystemInfo,
        WorkloadReport,
    };
    use optmatrix_core::JobStatus;

    fn entry(mode: &str, status: JobStatus) -> ReportEntry {
        ReportEntry {
            mode: mode.to_string(),
            status,
            original_cost: None,
            new_cost: None,
            improvement: None,
            improvement_found: false,
            exit_code: None,
            message: None,
            elapsed_secs: 1.25,
            log_path: format!("out/add_{}.log", mode),
        }
    }

    fn report(entries: Vec<ReportEntry>) -> Report {
        Report {
            meta: ReportMeta {
                schema_version: REPORT_SCHEMA_VERSION,
                version: "0.1.0".to_string(),
                timestamp: chrono::Utc::now(),
                git_commit: None,
                git_branch: None,
                system: SystemInfo {
                    os: "linux".to_string(),
                    arch: "x86_64".to_string(),
                    hostname: None,
                    cpu_cores: 1,
                },
                config: ReportConfig {
                    time_limit_secs: 300.0,
                    max_parallel_jobs: 4,
                    cores_per_job: 1,
                    modes: vec!["sym".to_string(), "stoch".to_string()],
                    optimizer: vec!["racket".to_string(), "optimize.rkt".to_string()],
                    workload_dir: "programs".to_string(),
                    marker_grammar_version: 1,
                },
                output_dir: "out".to_string(),
            },
            summary: ReportSummary {
                expected_jobs: entries.len(),
                total_jobs: entries.len(),
                success: 1,
                timeout: 1,
                ..Default::default()
            },
            workloads: vec![WorkloadReport {
                workload: "add".to_string(),
                entries,
            }],
        }
    }

    #[test]
    fn test_markdown_sections() {
        let mut sym = entry("sym", JobStatus::Success);
        sym.original_cost = Some(42);
        sym.new_cost = Some(40);
        sym.improvement = Some("2 cycles".to_string());
        let mut stoch = entry("stoch", JobStatus::Timeout);
        stoch.message = Some("exceeded 300.0s time limit".to_string());

        let md = generate_markdown_report(&report(vec![sym, stoch]));

        assert!(md.starts_with("# Optimizer Test Summary\n"));
        assert!(md.contains("**Time Limit**: 300s per test"));
        assert!(md.contains("**Total Tests**: 2"));
        assert!(md.contains("- ⏱ Timeout: 1"));
        assert!(md.contains("### add"));
        assert!(md.contains("**Mode: sym**\n- Status: SUCCESS\n- Original Cost: 42\n- New Cost: 40"));
        assert!(md.contains("- Improvement: 2 cycles"));
        assert!(md.contains("- Log: out/add_sym.log"));
        assert!(md.contains("- Time: 1.2s") || md.contains("- Time: 1.3s"));

        let sym_at = md.find("**Mode: sym**").unwrap();
        let stoch_at = md.find("**Mode: stoch**").unwrap();
        assert!(sym_at < stoch_at);
    }

    #[test]
    fn test_absent_fields_are_omitted() {
        let md = generate_markdown_report(&report(vec![entry("sym", JobStatus::Error)]));
        assert!(!md.contains("Original Cost"));
        assert!(!md.contains("New Cost"));
        assert!(!md.contains("- Improvement:"));
        assert!(md.contains("- Status: ERROR"));
    }

    #[test]
    fn test_json_round_trips_summary() {
        let r = report(vec![entry("sym", JobStatus::Success)]);
        let json = crate::generate_json_report(&r).unwrap();
        let back: Report = serde_json::from_str(&json).unwrap();
        assert_eq!(back.summary, r.summary);
        assert_eq!(back.workloads[0].entries[0].status, JobStatus::Success);
    }
}
