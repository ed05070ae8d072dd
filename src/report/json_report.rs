//! @ai:module:intent JSON report generation
//! @ai:module:layer infrastructure
//! @ai:module:public_api JsonReporter
//! @ai:module:stateless true

use crate::engine::RunResults;
use anyhow::{Context, Result};
use std::path::Path;

/// @ai:intent Trait for JSON report generation
pub trait JsonReporterTrait: Send + Sync {
    /// @ai:intent Generate JSON report from run results
    fn generate(&self, results: &RunResults, output_path: &Path) -> Result<()>;
}

/// @ai:intent Writes the full run result view as pretty JSON
pub struct JsonReporter;

impl JsonReporter {
    /// @ai:intent Create a new JSON reporter
    /// @ai:effects pure
    pub fn new() -> Self {
        Self
    }
}

impl Default for JsonReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl JsonReporterTrait for JsonReporter {
    /// @ai:effects fs:write
    fn generate(&self, results: &RunResults, output_path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(results)?;
        std::fs::write(output_path, json)
            .with_context(|| format!("Failed to write {}", output_path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{BenchmarkRun, TaskResult};
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    #[test]
    fn test_generate_json_report() {
        let reporter = JsonReporter::new();
        let temp = TempDir::new().unwrap();
        let output = temp.path().join("results.json");

        let run = BenchmarkRun::new("weekly-sweep", vec!["m1".to_string()]);
        let mut result = TaskResult::new("t1", "m1", &run.id);
        result.ultimate_score = Some(42.0);

        let results = RunResults {
            run,
            models: BTreeMap::new(),
            categories: BTreeMap::new(),
            results_by_model: RunResults::group(vec![result]),
            aggregate_scores: BTreeMap::new(),
        };

        reporter.generate(&results, &output).unwrap();

        let content = std::fs::read_to_string(&output).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed["run"]["name"], "weekly-sweep");
        assert_eq!(
            parsed["results_by_model"]["m1"]["uncategorized"][0]["ultimate_score"],
            42.0
        );
    }
}
