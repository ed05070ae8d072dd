//! @ai:module:intent Read-only projections of a run for status polling and reporting
//! @ai:module:layer application
//! @ai:module:public_api RunStatusReport, Progress, RunResults, ModelSummary, CategorySummary
//! @ai:module:stateless true

use crate::catalog::BackendType;
use crate::engine::{AggregateScores, BenchmarkRun, RunStatus, TaskResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Progress {
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub percentage: f64,
}

impl Progress {
    /// @ai:intent Progress with percentage; 0 when nothing is expected
    /// @ai:effects pure
    pub fn new(total_tasks: usize, completed_tasks: usize) -> Self {
        let percentage = if total_tasks == 0 {
            0.0
        } else {
            completed_tasks as f64 / total_tasks as f64 * 100.0
        };

        Self {
            total_tasks,
            completed_tasks,
            percentage,
        }
    }
}

/// @ai:intent Snapshot returned by status queries
#[derive(Debug, Clone, Serialize)]
pub struct RunStatusReport {
    pub id: String,
    pub name: String,
    pub status: RunStatus,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub progress: Progress,
    /// A worker is still attached to the run
    pub is_active: bool,
    pub error: Option<String>,
}

impl RunStatusReport {
    pub fn new(run: &BenchmarkRun, total_tasks: usize, is_active: bool) -> Self {
        Self {
            id: run.id.clone(),
            name: run.name.clone(),
            status: run.status,
            start_time: run.start_time,
            end_time: run.end_time,
            progress: Progress::new(total_tasks, run.results.len()),
            is_active,
            error: run.error.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelSummary {
    pub name: String,
    #[serde(rename = "type")]
    pub backend: BackendType,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategorySummary {
    pub name: String,
    pub description: String,
}

/// Results keyed by model id, then category key
pub type ResultsByModel = BTreeMap<String, BTreeMap<String, Vec<TaskResult>>>;

/// @ai:intent Full result view of a run, consumed by the report writers
#[derive(Debug, Clone, Serialize)]
pub struct RunResults {
    pub run: BenchmarkRun,
    pub models: BTreeMap<String, ModelSummary>,
    pub categories: BTreeMap<String, CategorySummary>,
    pub results_by_model: ResultsByModel,
    pub aggregate_scores: AggregateScores,
}

impl RunResults {
    /// @ai:intent Group results by model and category
    /// @ai:effects pure
    pub fn group(results: Vec<TaskResult>) -> ResultsByModel {
        let mut grouped = ResultsByModel::new();
        for result in results {
            grouped
                .entry(result.model_id.clone())
                .or_default()
                .entry(result.category_key().to_string())
                .or_default()
                .push(result);
        }
        grouped
    }

    /// @ai:intent Every result across models, in grouping order
    /// @ai:effects pure
    pub fn all_results(&self) -> impl Iterator<Item = &TaskResult> {
        self.results_by_model
            .values()
            .flat_map(|categories| categories.values())
            .flatten()
    }

    pub fn model_name<'a>(&'a self, model_id: &'a str) -> &'a str {
        self.models
            .get(model_id)
            .map(|m| m.name.as_str())
            .unwrap_or(model_id)
    }
}
