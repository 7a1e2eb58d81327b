//! Run directory and summary persistence

use anyhow::Context;
use chrono::{DateTime, Local};
use optmatrix_report::{OutputFormat, Report};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Upper bound on `_N` suffixes tried for one timestamp
const MAX_SUFFIX: u32 = 1000;

/// Create a fresh run directory `<root>/<prefix>_YYYYMMDD_HHMMSS`.
///
/// The directory is claimed with an exclusive create, so if another run
/// already owns the name the next free `_1`, `_2`, ... suffix is taken instead.
pub fn create_run_dir(root: &Path, prefix: &str, now: DateTime<Local>) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(root)
        .with_context(|| format!("cannot create output root {}", root.display()))?;

    let base = format!("{}_{}", prefix, now.format("%Y%m%d_%H%M%S"));
    for attempt in 0..=MAX_SUFFIX {
        let name = if attempt == 0 {
            base.clone()
        } else {
            format!("{base}_{attempt}")
        };
        let path = root.join(name);
        match std::fs::create_dir(&path) {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "created run directory");
                return Ok(path);
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("cannot create run directory {}", path.display()));
            }
        }
    }
    anyhow::bail!(
        "no free run directory name for {} under {}",
        base,
        root.display()
    )
}

/// Write the summary document for `report` into `run_dir`, returning its path
pub fn write_summary(
    run_dir: &Path,
    report: &Report,
    format: OutputFormat,
) -> anyhow::Result<PathBuf> {
    let path = run_dir.join(format.file_name());
    let contents = format.render(report).context("cannot render summary")?;
    std::fs::write(&path, contents)
        .with_context(|| format!("cannot write summary {}", path.display()))?;
    Ok(path)
}
