//! @ai:module:intent Report generation for benchmark runs
//! @ai:module:layer infrastructure
//! @ai:module:public_api ReportGenerator, JsonReporter, MarkdownReporter

pub mod json_report;
pub mod markdown_report;

pub use json_report::{JsonReporter, JsonReporterTrait};
pub use markdown_report::{MarkdownReporter, MarkdownReporterTrait};

use crate::engine::RunResults;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// @ai:intent Combined report generator
pub struct ReportGenerator {
    json: JsonReporter,
    markdown: MarkdownReporter,
}

impl ReportGenerator {
    /// @ai:intent Create a new report generator
    /// @ai:effects pure
    pub fn new() -> Self {
        Self {
            json: JsonReporter::new(),
            markdown: MarkdownReporter::new(),
        }
    }

    /// @ai:intent Write JSON and Markdown reports into `<output_dir>/<run id>/`
    /// @ai:post returns the run's report directory
    /// @ai:effects fs:write
    pub fn generate_all(&self, results: &RunResults, output_dir: &Path) -> Result<PathBuf> {
        let run_dir = output_dir.join(&results.run.id);
        std::fs::create_dir_all(&run_dir)
            .with_context(|| format!("Failed to create {}", run_dir.display()))?;

        self.json.generate(results, &run_dir.join("results.json"))?;
        self.markdown.generate(results, &run_dir.join("results.md"))?;

        tracing::info!("Reports generated in {}", run_dir.display());
        Ok(run_dir)
    }
}

impl Default for ReportGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::BenchmarkRun;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    #[test]
    fn test_generate_all_writes_both_reports() {
        let temp = TempDir::new().unwrap();
        let results = RunResults {
            run: BenchmarkRun::new("empty", vec![]),
            models: BTreeMap::new(),
            categories: BTreeMap::new(),
            results_by_model: BTreeMap::new(),
            aggregate_scores: BTreeMap::new(),
        };

        let run_dir = ReportGenerator::new()
            .generate_all(&results, temp.path())
            .unwrap();

        assert_eq!(run_dir, temp.path().join(&results.run.id));
        assert!(run_dir.join("results.json").exists());
        assert!(run_dir.join("results.md").exists());
    }
}
