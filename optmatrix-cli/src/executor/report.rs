//! Report Building
//!
//! Aggregates completion-ordered results into the report model.
//!
//! ```text
//! Vec<TestResult> (completion order)
//!              │
//!              ▼
//!   ┌─────────────────────┐
//!   │  group by workload  │  BTreeMap, lexicographic
//!   └──────────┬──────────┘
//!              ▼
//!   ┌─────────────────────┐
//!   │ order by mode index │  configured mode order
//!   └──────────┬──────────┘
//!              ▼
//!   ┌─────────────────────┐
//!   │       Report        │  entries + summary counts
//!   └─────────────────────┘
//! ```

use optmatrix_core::{JobStatus, Mode, TestResult};
use optmatrix_report::{Report, ReportEntry, ReportMeta, ReportSummary, WorkloadReport};
use std::collections::BTreeMap;
use std::time::Duration;

/// Build a complete Report from scheduler results
///
/// # Arguments
/// * `results` - One result per job, in any order
/// * `modes` - Configured modes; entries within a workload follow this order
/// * `meta` - Run metadata
/// * `expected_jobs` - Number of jobs submitted
/// * `wall_time` - Duration of the whole run
pub fn build_report(
    results: &[TestResult],
    modes: &[Mode],
    meta: ReportMeta,
    expected_jobs: usize,
    wall_time: Duration,
) -> Report {
    let mode_rank = |mode: &Mode| {
        modes
            .iter()
            .position(|m| m == mode)
            .unwrap_or(modes.len())
    };

    let mut grouped: BTreeMap<&str, Vec<&TestResult>> = BTreeMap::new();
    for result in results {
        grouped.entry(result.workload.as_str()).or_default().push(result);
    }

    let mut summary = ReportSummary {
        expected_jobs,
        total_jobs: results.len(),
        wall_time_secs: wall_time.as_secs_f64(),
        ..Default::default()
    };

    let mut workloads = Vec::with_capacity(grouped.len());
    for (workload, mut entries) in grouped {
        entries.sort_by(|a, b| {
            mode_rank(&a.mode)
                .cmp(&mode_rank(&b.mode))
                .then_with(|| a.mode.cmp(&b.mode))
        });

        for result in &entries {
            match result.status {
                JobStatus::Success => summary.success += 1,
                JobStatus::Timeout => summary.timeout += 1,
                JobStatus::Error => summary.error += 1,
            }
            if result.has_improvement() {
                summary.improvements += 1;
            }
            summary.total_job_secs += result.elapsed.as_secs_f64();
        }

        workloads.push(WorkloadReport {
            workload: workload.to_string(),
            entries: entries.into_iter().map(ReportEntry::from).collect(),
        });
    }

    if summary.total_jobs != expected_jobs {
        tracing::warn!(
            expected = expected_jobs,
            received = summary.total_jobs,
            "result count does not match job count"
        );
    }

    Report {
        meta,
        workloads,
        summary,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::metadata::tests::sample_meta;
    use optmatrix_core::{ParsedOutput, TestJob};

    fn result(workload: &str, mode: &str, status: JobStatus, improvement: Option<&str>) -> TestResult {
        let job = TestJob::new(
            format!("programs/{workload}.s"),
            Mode::new(mode).unwrap(),
            "out",
        );
        match status {
            JobStatus::Success => TestResult::success(
                &job,
                ParsedOutput {
                    improvement: improvement.map(str::to_string),
                    ..Default::default()
                },
                Some(0),
                Duration::from_secs(1),
            ),
            JobStatus::Timeout => {
                TestResult::timeout(&job, Duration::from_secs(2), Duration::from_secs(2))
            }
            JobStatus::Error => TestResult::error(&job, "failed", Duration::ZERO),
        }
    }

    fn modes() -> Vec<Mode> {
        vec![Mode::new("sym").unwrap(), Mode::new("stoch").unwrap()]
    }

    #[test]
    fn test_groups_and_orders_independent_of_completion() {
        let results = vec![
            result("b", "stoch", JobStatus::Success, None),
            result("a", "stoch", JobStatus::Timeout, None),
            result("b", "sym", JobStatus::Success, Some("2 fewer")),
            result("a", "sym", JobStatus::Error, None),
        ];
        let report = build_report(&results, &modes(), sample_meta(), 4, Duration::from_secs(3));

        let names: Vec<_> = report.workloads.iter().map(|w| w.workload.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        for workload in &report.workloads {
            let order: Vec<_> = workload.entries.iter().map(|e| e.mode.as_str()).collect();
            assert_eq!(order, vec!["sym", "stoch"]);
        }
    }

    #[test]
    fn test_counts() {
        let results = vec![
            result("a", "sym", JobStatus::Success, Some("better")),
            result("a", "stoch", JobStatus::Success, Some("")),
            result("b", "sym", JobStatus::Timeout, None),
            result("b", "stoch", JobStatus::Error, None),
        ];
        let report = build_report(&results, &modes(), sample_meta(), 4, Duration::from_secs(3));
        let s = &report.summary;

        assert_eq!(s.total_jobs, 4);
        assert_eq!(s.expected_jobs, 4);
        assert_eq!((s.success, s.timeout, s.error), (2, 1, 1));
        assert_eq!(s.improvements, 1);
        assert!((s.total_job_secs - 4.0).abs() < 1e-9);
        assert_eq!(s.exit_code(), 1);
    }

    #[test]
    fn test_empty_run() {
        let report = build_report(&[], &modes(), sample_meta(), 0, Duration::ZERO);
        assert!(report.workloads.is_empty());
        assert_eq!(report.summary.exit_code(), 0);
    }
}
