#![warn(missing_docs)]
//! optmatrix Report - Persisted Run Summaries
//!
//! Holds the serializable report model built at the end of a run and renders it
//! into the single summary document written to the run directory:
//! - Markdown (`SUMMARY.md`, default, meant for people)
//! - JSON (`SUMMARY.json`, full model including run metadata)

mod json;
mod markdown;
mod report;

pub use json::generate_json_report;
pub use markdown::generate_markdown_report;
pub use report::{
    REPORT_SCHEMA_VERSION, Report, ReportConfig, ReportEntry, ReportMeta, ReportSummary,
    SystemInfo, WorkloadReport,
};

/// Persisted summary format selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Markdown summary for people
    #[default]
    Markdown,
    /// JSON with the full report model
    Json,
}

impl OutputFormat {
    /// Fixed file name of the summary inside the run directory
    pub fn file_name(self) -> &'static str {
        match self {
            OutputFormat::Markdown => "SUMMARY.md",
            OutputFormat::Json => "SUMMARY.json",
        }
    }

    /// Render `report` in this format
    pub fn render(self, report: &Report) -> Result<String, serde_json::Error> {
        match self {
            OutputFormat::Markdown => Ok(generate_markdown_report(report)),
            OutputFormat::Json => generate_json_report(report),
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("Unknown output format: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_format() {
        assert_eq!("md".parse::<OutputFormat>(), Ok(OutputFormat::Markdown));
        assert_eq!("JSON".parse::<OutputFormat>(), Ok(OutputFormat::Json));
        assert!("html".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_file_names() {
        assert_eq!(OutputFormat::Markdown.file_name(), "SUMMARY.md");
        assert_eq!(OutputFormat::Json.file_name(), "SUMMARY.json");
    }
}
