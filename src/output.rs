//! Result types returned by the conversion entry points.

use crate::error::FigureError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Final state of one figure task, stored in slot `index`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskResult {
    /// 0-based position in the description list.
    pub index: usize,
    /// The description the figure was generated from.
    pub description: String,
    /// Forward-slash path relative to the output directory, e.g.
    /// `figures/figure1.pdf`. `None` when the figure was omitted.
    pub artifact_ref: Option<String>,
    /// Attempts actually started.
    pub attempts: u32,
    /// Why the figure was omitted.
    pub error: Option<FigureError>,
}

impl TaskResult {
    pub fn succeeded(&self) -> bool {
        self.artifact_ref.is_some()
    }
}

/// Project dispatcher slots onto their artifact references, keeping positions.
pub fn artifact_refs(results: &[TaskResult]) -> Vec<Option<String>> {
    results.iter().map(|r| r.artifact_ref.clone()).collect()
}

/// Aggregate numbers for one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversionStats {
    /// Pages sent to the text and figure-discovery stages.
    pub source_pages: usize,
    /// Figures described by the discovery stage.
    pub total_figures: usize,
    /// Figures compiled and merged.
    pub generated_figures: usize,
    /// Figures omitted after exhausting their attempts.
    pub failed_figures: usize,
    /// Sum of attempts over all figures.
    pub total_attempts: u64,
    /// Placeholders still present in the output.
    pub unfilled_placeholders: usize,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_duration_ms: u64,
    /// Time spent in text extraction and figure discovery.
    pub analysis_duration_ms: u64,
    /// Time spent generating and compiling figures.
    pub figures_duration_ms: u64,
}

/// Everything a conversion produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionOutput {
    /// The merged LaTeX document.
    pub latex: String,
    /// One entry per discovered figure, in description order.
    pub figures: Vec<TaskResult>,
    /// Placeholder numbers left in `latex`.
    pub unfilled_placeholders: Vec<usize>,
    /// Where the `.tex` file was written, if it was.
    pub output_path: Option<PathBuf>,
    pub stats: ConversionStats,
}

impl ConversionOutput {
    /// 1-indexed numbers of figures that were omitted.
    pub fn omitted_figures(&self) -> Vec<usize> {
        self.figures
            .iter()
            .filter(|f| !f.succeeded())
            .map(|f| f.index + 1)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(index: usize, artifact: Option<&str>) -> TaskResult {
        TaskResult {
            index,
            description: format!("figure {index}"),
            artifact_ref: artifact.map(str::to_string),
            attempts: 1,
            error: None,
        }
    }

    #[test]
    fn artifact_refs_keep_positions() {
        let results = vec![
            slot(0, Some("figures/figure1.pdf")),
            slot(1, None),
            slot(2, Some("figures/figure3.pdf")),
        ];
        assert_eq!(
            artifact_refs(&results),
            vec![
                Some("figures/figure1.pdf".to_string()),
                None,
                Some("figures/figure3.pdf".to_string()),
            ]
        );
    }

    #[test]
    fn omitted_figures_are_one_indexed() {
        let output = ConversionOutput {
            latex: String::new(),
            figures: vec![slot(0, Some("figures/figure1.pdf")), slot(1, None)],
            unfilled_placeholders: vec![2],
            output_path: None,
            stats: ConversionStats::default(),
        };
        assert_eq!(output.omitted_figures(), vec![2]);
    }
}
