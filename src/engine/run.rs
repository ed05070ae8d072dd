//! @ai:module:intent Benchmark run and task result records with the run status machine
//! @ai:module:layer domain
//! @ai:module:public_api BenchmarkRun, RunStatus, TaskResult, RunRequest
//! @ai:module:stateless true

use crate::error::{BenchError, Result};
use crate::scoring::ScoreSet;
use crate::store::Entity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Aggregate key for tasks without a category
pub const UNCATEGORIZED: &str = "uncategorized";

/// @ai:intent Lifecycle status of a benchmark run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Draft,
    Ready,
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    /// @ai:intent Convert run status to string representation
    /// @ai:effects pure
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Draft => "draft",
            RunStatus::Ready => "ready",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }

    /// @ai:intent Allowed edges: draft→ready→running→{completed, failed}
    /// @ai:effects pure
    pub fn can_transition_to(&self, next: RunStatus) -> bool {
        matches!(
            (self, next),
            (RunStatus::Draft, RunStatus::Ready)
                | (RunStatus::Ready, RunStatus::Running)
                | (RunStatus::Running, RunStatus::Completed)
                | (RunStatus::Running, RunStatus::Failed)
        )
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// @ai:intent Request for a new benchmark run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub model_ids: Vec<String>,
    #[serde(default)]
    pub category_ids: Option<Vec<String>>,
    #[serde(default)]
    pub task_ids: Option<Vec<String>>,
}

/// @ai:intent One execution of a set of models against a set of tasks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkRun {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub model_ids: Vec<String>,
    #[serde(default)]
    pub category_ids: Option<Vec<String>>,
    #[serde(default)]
    pub task_ids: Option<Vec<String>>,
    /// Ids of produced task results, in completion order
    #[serde(default)]
    pub results: Vec<String>,
    /// model id → category id → mean ultimate score
    #[serde(default)]
    pub aggregate_scores: BTreeMap<String, BTreeMap<String, f64>>,
    pub status: RunStatus,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BenchmarkRun {
    /// @ai:intent Create a draft run with a fresh id
    /// @ai:effects time
    pub fn new(name: impl Into<String>, model_ids: Vec<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            description: String::new(),
            model_ids,
            category_ids: None,
            task_ids: None,
            results: Vec::new(),
            aggregate_scores: BTreeMap::new(),
            status: RunStatus::Draft,
            start_time: None,
            end_time: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// @ai:intent Move to `next`, refusing edges outside the status machine
    /// @ai:effects state:write
    pub fn transition(&mut self, next: RunStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(BenchError::InvalidState(format!(
                "Run {} cannot move from {} to {}",
                self.id, self.status, next
            )));
        }
        self.status = next;
        Ok(())
    }

    /// @ai:intent Enter running (passing through ready from draft) and stamp start_time
    /// @ai:effects state:write, time
    pub fn mark_running(&mut self) -> Result<()> {
        if self.status == RunStatus::Draft {
            self.transition(RunStatus::Ready)?;
        }
        self.transition(RunStatus::Running)?;
        self.start_time = Some(Utc::now());
        self.end_time = None;
        self.error = None;
        Ok(())
    }

    /// @ai:intent Enter completed; a no-op returning false once terminal
    /// @ai:effects state:write, time
    pub fn mark_completed(&mut self) -> bool {
        if self.transition(RunStatus::Completed).is_err() {
            return false;
        }
        self.end_time = Some(Utc::now());
        true
    }

    /// @ai:intent Enter failed with an error; a no-op returning false once terminal
    /// @ai:effects state:write, time
    pub fn mark_failed(&mut self, error: impl Into<String>) -> bool {
        if self.transition(RunStatus::Failed).is_err() {
            return false;
        }
        self.error = Some(error.into());
        self.end_time = Some(Utc::now());
        true
    }
}

impl Entity for BenchmarkRun {
    const KIND: &'static str = "BenchmarkRun";

    fn id(&self) -> &str {
        &self.id
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// @ai:intent Outcome of one task executed against one model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    pub id: String,
    pub task_id: String,
    pub model_id: String,
    pub run_id: String,
    /// Copied from the task so results can be grouped without a lookup
    #[serde(default)]
    pub category_id: Option<String>,
    #[serde(default)]
    pub execution_time_seconds: Option<f64>,
    #[serde(default)]
    pub memory_usage_mb: Option<f64>,
    #[serde(default)]
    pub token_count: Option<u64>,
    #[serde(flatten)]
    pub scores: ScoreSet,
    #[serde(default)]
    pub ultimate_score: Option<f64>,
    #[serde(default)]
    pub output_data: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskResult {
    /// @ai:intent Create an empty result with a fresh id
    /// @ai:effects time
    pub fn new(
        task_id: impl Into<String>,
        model_id: impl Into<String>,
        run_id: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            task_id: task_id.into(),
            model_id: model_id.into(),
            run_id: run_id.into(),
            category_id: None,
            execution_time_seconds: None,
            memory_usage_mb: None,
            token_count: None,
            scores: ScoreSet::default(),
            ultimate_score: None,
            output_data: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// @ai:intent Store scores and derive the ultimate score from them
    /// @ai:effects state:write
    pub fn apply_scores(&mut self, scores: ScoreSet) {
        self.ultimate_score = scores.ultimate_score();
        self.scores = scores;
    }

    /// @ai:intent Record a failure: error set, every score cleared
    /// @ai:effects state:write
    pub fn fail(&mut self, error: impl Into<String>) {
        self.error = Some(error.into());
        self.scores = ScoreSet::default();
        self.ultimate_score = None;
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// @ai:intent Aggregate bucket: the category id or "uncategorized"
    /// @ai:effects pure
    pub fn category_key(&self) -> &str {
        self.category_id.as_deref().unwrap_or(UNCATEGORIZED)
    }
}

impl Entity for TaskResult {
    const KIND: &'static str = "TaskResult";

    fn id(&self) -> &str {
        &self.id
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
