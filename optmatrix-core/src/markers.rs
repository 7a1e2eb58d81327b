//! Output Marker Grammar
//!
//! The optimizer does not emit structured output. It prints a handful of fixed
//! markers that the harness scrapes line by line:
//!
//! ```text
//! >>> original cost: 42        integer after the last whitespace
//! New cost: 37                 integer after the last whitespace
//! Improvement: 5 cycles saved  free text after the marker
//! IMPROVEMENT FOUND            flag, anywhere in the stream
//! ```
//!
//! Any change to the optimizer's wording silently stops extraction, so the
//! vocabulary is versioned and the version is recorded in every report.

use serde::{Deserialize, Serialize};

/// Version of the default marker vocabulary
pub const MARKER_GRAMMAR_VERSION: u32 = 1;

/// Marker vocabulary shared with the optimizer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerGrammar {
    /// Grammar version; bump when the vocabulary changes
    pub version: u32,
    /// Line marker followed by the original program cost
    pub original_cost: String,
    /// Line marker followed by the optimized program cost
    pub new_cost: String,
    /// Line marker followed by a description of the improvement
    pub improvement: String,
    /// Token signalling that a better program was found
    pub improvement_found: String,
}

impl Default for MarkerGrammar {
    fn default() -> Self {
        Self {
            version: MARKER_GRAMMAR_VERSION,
            original_cost: ">>> original cost:".to_string(),
            new_cost: "New cost:".to_string(),
            improvement: "Improvement:".to_string(),
            improvement_found: "IMPROVEMENT FOUND".to_string(),
        }
    }
}

/// Fields scraped from captured output. Unset means the marker was absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedOutput {
    /// Value of the original-cost marker
    pub original_cost: Option<i64>,
    /// Value of the new-cost marker
    pub new_cost: Option<i64>,
    /// Text of the improvement marker
    pub improvement: Option<String>,
    /// Whether the improvement-found token appeared
    pub improvement_found: bool,
}

impl MarkerGrammar {
    /// Scan `output` and extract every field whose marker is present.
    ///
    /// A line is attributed to at most one marker, checked in the order
    /// original cost, new cost, improvement. Repeated markers keep the last
    /// value. A cost marker whose last token is not an integer is ignored.
    pub fn parse(&self, output: &str) -> ParsedOutput {
        let mut parsed = ParsedOutput {
            improvement_found: has_marker(output, &self.improvement_found),
            ..Default::default()
        };

        for line in output.lines() {
            if has_marker(line, &self.original_cost) {
                if let Some(cost) = trailing_integer(line) {
                    parsed.original_cost = Some(cost);
                }
            } else if has_marker(line, &self.new_cost) {
                if let Some(cost) = trailing_integer(line) {
                    parsed.new_cost = Some(cost);
                }
            } else if has_marker(line, &self.improvement) {
                if let Some((_, text)) = line.rsplit_once(self.improvement.as_str()) {
                    parsed.improvement = Some(text.trim().to_string());
                }
            }
        }

        parsed
    }
}

// An empty marker would match every line.
fn has_marker(line: &str, marker: &str) -> bool {
    !marker.is_empty() && line.contains(marker)
}

fn trailing_integer(line: &str) -> Option<i64> {
    let token = line.split_whitespace().last()?;
    match token.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::debug!(line, "cost marker without an integer value");
            None
        }
    }
}
