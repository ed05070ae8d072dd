//! @ai:module:intent Markdown report generation
//! @ai:module:layer infrastructure
//! @ai:module:public_api MarkdownReporter
//! @ai:module:stateless true

use crate::engine::{RunResults, TaskResult};
use crate::scoring::ScoreComponent;
use anyhow::{Context, Result};
use std::fmt::{self, Write as FmtWrite};
use std::path::Path;

/// @ai:intent Trait for Markdown report generation
pub trait MarkdownReporterTrait: Send + Sync {
    /// @ai:intent Generate Markdown report from run results
    fn generate(&self, results: &RunResults, output_path: &Path) -> Result<()>;
}

/// @ai:intent Generates Markdown reports from run results
pub struct MarkdownReporter;

impl MarkdownReporter {
    /// @ai:intent Create a new Markdown reporter
    /// @ai:effects pure
    pub fn new() -> Self {
        Self
    }

    fn format_optional(value: Option<f64>, precision: usize) -> String {
        value
            .map(|v| format!("{:.*}", precision, v))
            .unwrap_or_else(|| "-".to_string())
    }

    fn format_component(component: &Option<ScoreComponent>) -> String {
        Self::format_optional(component.as_ref().map(|c| c.normalized_score), 2)
    }

    /// @ai:intent Run header: identity, status and timing
    /// @ai:effects pure
    fn write_summary(output: &mut String, results: &RunResults) -> fmt::Result {
        let run = &results.run;

        writeln!(output, "# Benchmark Run: {}", run.name)?;
        writeln!(output)?;
        if !run.description.is_empty() {
            writeln!(output, "{}", run.description)?;
            writeln!(output)?;
        }
        writeln!(output, "**Run ID:** {}", run.id)?;
        writeln!(output, "**Status:** {}", run.status)?;
        if let Some(start) = run.start_time {
            writeln!(output, "**Started:** {}", start.to_rfc3339())?;
        }
        if let Some(end) = run.end_time {
            writeln!(output, "**Finished:** {}", end.to_rfc3339())?;
        }
        if let (Some(start), Some(end)) = (run.start_time, run.end_time) {
            let seconds = (end - start).num_milliseconds() as f64 / 1000.0;
            writeln!(output, "**Duration:** {:.1}s", seconds)?;
        }
        if let Some(error) = &run.error {
            writeln!(output, "**Error:** {}", error)?;
        }
        writeln!(output)?;

        Ok(())
    }

    /// @ai:intent Mean ultimate score per model and category
    /// @ai:effects pure
    fn write_aggregates(output: &mut String, results: &RunResults) -> fmt::Result {
        writeln!(output, "## Aggregate Scores")?;
        writeln!(output)?;

        if results.aggregate_scores.is_empty() {
            writeln!(output, "No scored results.")?;
            writeln!(output)?;
            return Ok(());
        }

        writeln!(output, "| Model | Category | Mean Ultimate Score |")?;
        writeln!(output, "|-------|----------|---------------------|")?;

        for (model_id, categories) in &results.aggregate_scores {
            for (category_id, score) in categories {
                let category = results
                    .categories
                    .get(category_id)
                    .map(|c| c.name.as_str())
                    .unwrap_or(category_id);
                writeln!(
                    output,
                    "| {} | {} | {:.2} |",
                    results.model_name(model_id),
                    category,
                    score
                )?;
            }
        }

        writeln!(output)?;
        Ok(())
    }

    fn write_result_row(output: &mut String, category: &str, result: &TaskResult) -> fmt::Result {
        let scores = &result.scores;
        writeln!(
            output,
            "| {} | {} | {} | {} | {} | {} | {} | {} | {} | {} | {} |",
            result.task_id,
            category,
            Self::format_optional(result.execution_time_seconds, 2),
            result
                .token_count
                .map(|t| t.to_string())
                .unwrap_or_else(|| "-".to_string()),
            Self::format_optional(result.memory_usage_mb, 1),
            Self::format_component(&scores.time_score),
            Self::format_component(&scores.quality_score),
            Self::format_component(&scores.complexity_score),
            Self::format_component(&scores.cost_score),
            Self::format_optional(result.ultimate_score, 2),
            if result.is_success() { "ok" } else { "failed" },
        )
    }

    /// @ai:intent One table per model with every task result
    /// @ai:effects pure
    fn write_model_sections(output: &mut String, results: &RunResults) -> fmt::Result {
        for (model_id, categories) in &results.results_by_model {
            match results.models.get(model_id) {
                Some(model) => writeln!(output, "## {} ({})", model.name, model.backend)?,
                None => writeln!(output, "## {}", model_id)?,
            }
            writeln!(output)?;
            writeln!(
                output,
                "| Task | Category | Time (s) | Tokens | Memory (MB) | Time | Quality | Complexity | Cost | Ultimate | Status |"
            )?;
            writeln!(
                output,
                "|------|----------|----------|--------|-------------|------|---------|------------|------|----------|--------|"
            )?;

            for (category, task_results) in categories {
                for result in task_results {
                    Self::write_result_row(output, category, result)?;
                }
            }
            writeln!(output)?;
        }

        Ok(())
    }

    /// @ai:intent List failed results with their errors
    /// @ai:effects pure
    fn write_failures(output: &mut String, results: &RunResults) -> fmt::Result {
        let failures: Vec<&TaskResult> = results.all_results().filter(|r| !r.is_success()).collect();
        if failures.is_empty() {
            return Ok(());
        }

        writeln!(output, "## Failures")?;
        writeln!(output)?;
        for result in failures {
            writeln!(
                output,
                "- **{}** on {}: {}",
                result.task_id,
                results.model_name(&result.model_id),
                result.error.as_deref().unwrap_or_default()
            )?;
        }
        writeln!(output)?;

        Ok(())
    }

    /// @ai:intent Render the complete report
    /// @ai:effects pure
    pub fn render(&self, results: &RunResults) -> Result<String> {
        let mut output = String::new();

        Self::write_summary(&mut output, results)?;
        Self::write_aggregates(&mut output, results)?;
        Self::write_model_sections(&mut output, results)?;
        Self::write_failures(&mut output, results)?;

        Ok(output)
    }
}

impl Default for MarkdownReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkdownReporterTrait for MarkdownReporter {
    /// @ai:effects fs:write
    fn generate(&self, results: &RunResults, output_path: &Path) -> Result<()> {
        let content = self.render(results)?;
        std::fs::write(output_path, content)
            .with_context(|| format!("Failed to write {}", output_path.display()))?;
        Ok(())
    }
}
