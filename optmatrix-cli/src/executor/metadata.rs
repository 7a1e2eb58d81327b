//! Run Metadata Collection
//!
//! Collects the configuration, host and git details recorded in every report.
//! Git and hostname lookups degrade to `None` when unavailable.

use crate::settings::RunSettings;
use chrono::Utc;
use optmatrix_report::{REPORT_SCHEMA_VERSION, ReportConfig, ReportMeta, SystemInfo};
use std::path::Path;

/// Build report metadata for a run writing into `output_dir`
pub fn build_report_meta(settings: &RunSettings, output_dir: &Path) -> ReportMeta {
    let system = SystemInfo {
        os: std::env::consts::OS.to_string(),
        arch: std::env::consts::ARCH.to_string(),
        hostname: hostname(),
        cpu_cores: num_cpus(),
    };

    let config = ReportConfig {
        time_limit_secs: settings.limits.time_limit.as_secs_f64(),
        max_parallel_jobs: settings.max_parallel,
        cores_per_job: settings.command.cores_per_job,
        modes: settings.modes.iter().map(|m| m.to_string()).collect(),
        optimizer: settings.command.prefix(),
        workload_dir: settings.selection.directory.display().to_string(),
        marker_grammar_version: settings.grammar.version,
    };

    ReportMeta {
        schema_version: REPORT_SCHEMA_VERSION,
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
        git_commit: git(&["rev-parse", "HEAD"]),
        git_branch: git(&["rev-parse", "--abbrev-ref", "HEAD"]),
        system,
        config,
        output_dir: output_dir.display().to_string(),
    }
}

fn git(args: &[&str]) -> Option<String> {
    let output = std::process::Command::new("git")
        .args(args)
        .stderr(std::process::Stdio::null())
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let value = String::from_utf8(output.stdout).ok()?.trim().to_string();
    (!value.is_empty()).then_some(value)
}

fn hostname() -> Option<String> {
    #[cfg(target_os = "linux")]
    {
        if let Ok(name) = std::fs::read_to_string("/proc/sys/kernel/hostname") {
            let name = name.trim();
            if !name.is_empty() {
                return Some(name.to_string());
            }
        }
    }
    std::env::var("HOSTNAME").ok().filter(|h| !h.is_empty())
}

/// Get number of available CPU cores
fn num_cpus() -> u32 {
    std::thread::available_parallelism()
        .map(|n| n.get() as u32)
        .unwrap_or(1)
}
