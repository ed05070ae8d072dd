//! @ai:module:intent Background run lifecycle: start, status, cancel, delete, wait and manual re-scoring
//! @ai:module:layer application
//! @ai:module:public_api RunManager
//! @ai:module:stateless false

use crate::catalog::CriterionType;
use crate::engine::orchestrator::{BenchmarkEngine, RunCell};
use crate::engine::views::{CategorySummary, ModelSummary, RunResults, RunStatusReport};
use crate::engine::{BenchmarkRun, RunRequest, TaskResult};
use crate::error::{BenchError, Result};
use crate::runner::CancellationToken;
use crate::store::Repository;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};

/// Error recorded on a run cancelled through the manager
pub const CANCELLED_BY_USER: &str = "Benchmark cancelled by user";

/// Highest manual review score
pub const MAX_MANUAL_SCORE: f64 = 10.0;

/// Worker attached to a started run
struct RunHandle {
    cell: RunCell,
    cancel: CancellationToken,
    done: watch::Receiver<bool>,
}

impl RunHandle {
    /// Live until the worker reports completion or goes away
    fn is_live(&self) -> bool {
        self.done.has_changed().is_ok() && !*self.done.borrow()
    }
}

/// @ai:intent Owns the registry of background runs; at most one worker per run id
pub struct RunManager {
    engine: Arc<BenchmarkEngine>,
    active: Mutex<HashMap<String, RunHandle>>,
}

impl RunManager {
    /// @ai:intent Create a manager over an engine
    /// @ai:effects pure
    pub fn new(engine: Arc<BenchmarkEngine>) -> Self {
        Self {
            engine,
            active: Mutex::new(HashMap::new()),
        }
    }

    pub fn engine(&self) -> &Arc<BenchmarkEngine> {
        &self.engine
    }

    pub fn create_run(&self, request: RunRequest) -> Result<BenchmarkRun> {
        self.engine.create_run(request)
    }

    pub fn get_run(&self, run_id: &str) -> Option<BenchmarkRun> {
        self.engine.repository().get_run(run_id)
    }

    pub fn list_runs(&self) -> Vec<BenchmarkRun> {
        self.engine.repository().list_runs()
    }

    /// @ai:intent Start a stored run on a background worker
    /// @ai:pre no live worker for run_id; run is draft or ready
    /// @ai:post the returned run is running
    /// @ai:effects state:write, time
    pub async fn start_run(&self, run_id: &str) -> Result<BenchmarkRun> {
        let mut active = self.active.lock().await;
        active.retain(|_, handle| handle.is_live());

        if active.contains_key(run_id) {
            return Err(BenchError::InvalidState(format!(
                "Benchmark run {} is already running",
                run_id
            )));
        }

        let cell = self.engine.begin(run_id)?;
        let snapshot = cell.lock().await.clone();

        let cancel = CancellationToken::new();
        let (done_tx, done_rx) = watch::channel(false);

        let engine = self.engine.clone();
        let worker_cell = cell.clone();
        let worker_cancel = cancel.clone();
        tokio::spawn(async move {
            engine.execute(worker_cell, worker_cancel).await;
            let _ = done_tx.send(true);
        });

        active.insert(
            run_id.to_string(),
            RunHandle {
                cell,
                cancel,
                done: done_rx,
            },
        );

        Ok(snapshot)
    }

    /// @ai:intent Whether a worker is still attached to the run
    /// @ai:effects state:read
    pub async fn is_active(&self, run_id: &str) -> bool {
        self.active
            .lock()
            .await
            .get(run_id)
            .is_some_and(RunHandle::is_live)
    }

    /// @ai:intent Status with progress = completed results / (tasks × models)
    /// @ai:effects state:read
    pub async fn get_status(&self, run_id: &str) -> Result<RunStatusReport> {
        let is_active = self.is_active(run_id).await;
        let run = self
            .get_run(run_id)
            .ok_or_else(|| BenchError::not_found("Benchmark run", run_id))?;

        let total = self.engine.expected_executions(&run);
        Ok(RunStatusReport::new(&run, total, is_active))
    }

    /// @ai:intent Run plus its results grouped by model and category
    /// @ai:effects state:read
    pub fn get_results(&self, run_id: &str) -> Result<RunResults> {
        let repository = self.engine.repository();
        let run = repository
            .get_run(run_id)
            .ok_or_else(|| BenchError::not_found("Benchmark run", run_id))?;

        let results = repository.list_results(run_id);

        let models: BTreeMap<String, ModelSummary> = run
            .model_ids
            .iter()
            .filter_map(|id| repository.get_model(id))
            .map(|model| {
                (
                    model.id.clone(),
                    ModelSummary {
                        name: model.name,
                        backend: model.backend,
                    },
                )
            })
            .collect();

        let mut categories: BTreeMap<String, CategorySummary> = BTreeMap::new();
        for id in results.iter().filter_map(|r| r.category_id.as_deref()) {
            if categories.contains_key(id) {
                continue;
            }
            if let Some(category) = repository.get_category(id) {
                categories.insert(
                    category.id,
                    CategorySummary {
                        name: category.name,
                        description: category.description,
                    },
                );
            }
        }

        Ok(RunResults {
            aggregate_scores: run.aggregate_scores.clone(),
            run,
            models,
            categories,
            results_by_model: RunResults::group(results),
        })
    }

    /// @ai:intent Cancel a live run; false when no worker is attached
    /// @ai:post a cancelled run is failed; results already in flight are still recorded
    /// @ai:effects state:write
    pub async fn cancel_run(&self, run_id: &str) -> Result<bool> {
        let active = self.active.lock().await;
        let Some(handle) = active.get(run_id).filter(|h| h.is_live()) else {
            tracing::info!("Run {} has no active worker to cancel", run_id);
            return Ok(false);
        };

        handle.cancel.cancel();

        let mut run = handle.cell.lock().await;
        if !run.mark_failed(CANCELLED_BY_USER) {
            return Ok(false);
        }
        self.engine.persist(&mut run)?;

        tracing::info!("Benchmark run {} cancelled", run_id);
        Ok(true)
    }

    /// @ai:intent Delete a run and all of its results
    /// @ai:pre no live worker for run_id
    /// @ai:effects state:write
    pub async fn delete_run(&self, run_id: &str) -> Result<()> {
        // Held to the end so start_run cannot begin this run mid-delete.
        let mut active = self.active.lock().await;
        if active.get(run_id).is_some_and(RunHandle::is_live) {
            return Err(BenchError::Validation {
                message: format!("Cannot delete active benchmark run {}", run_id),
                field: Some("run_id".to_string()),
            });
        }

        let repository = self.engine.repository();
        if repository.get_run(run_id).is_none() {
            return Err(BenchError::not_found("Benchmark run", run_id));
        }

        for result in repository.list_results(run_id) {
            repository.delete_result(&result.id);
        }
        if !repository.delete_run(run_id) {
            return Err(BenchError::Repository(format!(
                "Failed to delete benchmark run {}",
                run_id
            )));
        }

        active.remove(run_id);
        tracing::info!("Deleted benchmark run {}", run_id);
        Ok(())
    }

    /// @ai:intent Wait for a run's worker to finish, then return the stored run
    /// @ai:effects state:read
    pub async fn wait(&self, run_id: &str) -> Result<BenchmarkRun> {
        let done = self
            .active
            .lock()
            .await
            .get(run_id)
            .map(|handle| handle.done.clone());

        if let Some(mut done) = done {
            // A dropped sender means the worker is gone either way.
            let _ = done.wait_for(|finished| *finished).await;
            self.active.lock().await.remove(run_id);
        }

        self.get_run(run_id)
            .ok_or_else(|| BenchError::not_found("Benchmark run", run_id))
    }

    /// @ai:intent Record a manual review score, re-score the result and refresh run aggregates
    /// @ai:pre 0 ≤ score ≤ 10; criterion is a manual_review criterion of the task's template
    /// @ai:effects state:write
    pub async fn revise_quality_score(
        &self,
        result_id: &str,
        criterion: &str,
        score: f64,
    ) -> Result<TaskResult> {
        if !(0.0..=MAX_MANUAL_SCORE).contains(&score) {
            return Err(BenchError::Validation {
                message: format!("Manual score must be between 0 and 10, got {}", score),
                field: Some("score".to_string()),
            });
        }

        let repository = self.engine.repository();
        let mut result = repository
            .get_result(result_id)
            .ok_or_else(|| BenchError::not_found("Task result", result_id))?;
        if result.error.is_some() {
            return Err(BenchError::validation(format!(
                "Task result {} failed and cannot be scored",
                result_id
            )));
        }

        let task = repository
            .get_task(&result.task_id)
            .ok_or_else(|| BenchError::not_found("Task", &result.task_id))?;
        let template = repository
            .get_template(&task.template_id)
            .ok_or_else(|| BenchError::not_found("Template", &task.template_id))?;

        match template.evaluation_criteria.get(criterion) {
            Some(c) if c.kind == CriterionType::ManualReview => {}
            _ => {
                return Err(BenchError::Validation {
                    message: format!(
                        "Template {} has no manual review criterion named {}",
                        template.id, criterion
                    ),
                    field: Some("criterion".to_string()),
                })
            }
        }

        let mut payload = match result.output_data.take() {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };
        payload.insert(format!("{}_score", criterion), Value::from(score));
        result.output_data = Some(Value::Object(payload));

        self.engine.runner().rescore(&mut result, &task);
        if !repository.update_result(&mut result) {
            return Err(BenchError::Repository(format!(
                "Failed to update task result {}",
                result.id
            )));
        }

        self.refresh_run(&result.run_id).await?;

        tracing::info!(
            "Revised {} on result {} to {}; ultimate score now {:?}",
            criterion,
            result.id,
            score,
            result.ultimate_score
        );
        Ok(result)
    }

    /// Live runs are refreshed through their cell so the worker's next write keeps the change
    async fn refresh_run(&self, run_id: &str) -> Result<()> {
        let cell = self
            .active
            .lock()
            .await
            .get(run_id)
            .filter(|h| h.is_live())
            .map(|h| h.cell.clone());

        match cell {
            Some(cell) => {
                let mut run = cell.lock().await;
                self.engine.refresh_aggregates(&mut run);
                self.engine.persist(&mut run)
            }
            None => {
                let mut run = self
                    .get_run(run_id)
                    .ok_or_else(|| BenchError::not_found("Benchmark run", run_id))?;
                self.engine.refresh_aggregates(&mut run);
                self.engine.persist(&mut run)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{MockAdapter, MockBehavior};
    use crate::catalog::{BackendType, Category, EvaluationCriterion, Model, Task, Template};
    use crate::config::BenchmarkConfig;
    use crate::engine::RunStatus;
    use crate::store::scripted::ScriptedRepository;
    use crate::store::InMemoryRepository;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn manager(behavior: MockBehavior) -> (RunManager, Arc<InMemoryRepository>) {
        let repo = Arc::new(InMemoryRepository::new());

        let mut template = Template::new("reviewed", "Reviewed");
        template.evaluation_criteria.insert(
            "readability".to_string(),
            EvaluationCriterion {
                kind: CriterionType::ManualReview,
                weight: 1.0,
            },
        );
        repo.add_template(template);

        repo.add_model(Model::new("m1", BackendType::Ollama, "llama3"));
        repo.add_model(Model::new("m2", BackendType::Anthropic, "claude"));

        let mut category = Category::new("writing", "Writing");
        category.task_ids = vec!["t1".to_string(), "t2".to_string(), "t3".to_string()];
        repo.add_category(category);
        for id in ["t1", "t2", "t3"] {
            repo.add_task(Task::new(id, id, "reviewed").with_category("writing"));
        }

        let (registry, _) = MockAdapter::registry(behavior);
        let engine = BenchmarkEngine::new(repo.clone(), registry, &BenchmarkConfig::default());
        (RunManager::new(Arc::new(engine)), repo)
    }

    fn slow() -> MockBehavior {
        MockBehavior {
            delay: Some(Duration::from_millis(150)),
            ..MockBehavior::default()
        }
    }

    fn request() -> RunRequest {
        RunRequest {
            name: "lifecycle".to_string(),
            model_ids: vec!["m1".to_string(), "m2".to_string()],
            category_ids: Some(vec!["writing".to_string()]),
            ..RunRequest::default()
        }
    }

    #[tokio::test]
    async fn test_start_and_wait() {
        let (manager, repo) = manager(MockBehavior::default());
        let run = manager.create_run(request()).unwrap();

        let started = manager.start_run(&run.id).await.unwrap();
        assert_eq!(started.status, RunStatus::Running);

        let finished = manager.wait(&run.id).await.unwrap();
        assert_eq!(finished.status, RunStatus::Completed);
        assert_eq!(finished.results.len(), 6);
        assert_eq!(repo.list_results(&run.id).len(), 6);

        let status = manager.get_status(&run.id).await.unwrap();
        assert!(!status.is_active);
        assert_eq!(status.progress.total_tasks, 6);
        assert_eq!(status.progress.percentage, 100.0);
    }

    #[tokio::test]
    async fn test_start_twice_is_rejected() {
        let (manager, _) = manager(slow());
        let run = manager.create_run(request()).unwrap();

        manager.start_run(&run.id).await.unwrap();
        let err = manager.start_run(&run.id).await.unwrap_err();
        assert!(matches!(err, BenchError::InvalidState(_)));

        manager.cancel_run(&run.id).await.unwrap();
        manager.wait(&run.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_status_while_running() {
        let (manager, _) = manager(slow());
        let run = manager.create_run(request()).unwrap();
        manager.start_run(&run.id).await.unwrap();

        let status = manager.get_status(&run.id).await.unwrap();
        assert!(status.is_active);
        assert_eq!(status.status, RunStatus::Running);
        assert_eq!(status.progress.total_tasks, 6);
        assert!(status.progress.completed_tasks < 6);

        manager.cancel_run(&run.id).await.unwrap();
        manager.wait(&run.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_cancel_without_worker_returns_false() {
        let (manager, repo) = manager(MockBehavior::default());
        let run = manager.create_run(request()).unwrap();

        assert!(!manager.cancel_run(&run.id).await.unwrap());
        assert!(!manager.cancel_run("unknown").await.unwrap());
        assert_eq!(repo.get_run(&run.id).unwrap().status, RunStatus::Ready);
    }

    #[tokio::test]
    async fn test_cancel_active_run() {
        let (manager, repo) = manager(slow());
        let run = manager.create_run(request()).unwrap();
        manager.start_run(&run.id).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(manager.cancel_run(&run.id).await.unwrap());

        let stored = repo.get_run(&run.id).unwrap();
        assert_eq!(stored.status, RunStatus::Failed);
        assert_eq!(stored.error.as_deref(), Some(CANCELLED_BY_USER));

        let finished = manager.wait(&run.id).await.unwrap();
        assert_eq!(finished.status, RunStatus::Failed);
        assert_eq!(finished.error.as_deref(), Some(CANCELLED_BY_USER));
        assert!(finished.results.len() < 6);
        assert_eq!(repo.list_results(&run.id).len(), finished.results.len());
        assert!(!manager.cancel_run(&run.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_rejected_while_active() {
        let (manager, repo) = manager(slow());
        let run = manager.create_run(request()).unwrap();
        manager.start_run(&run.id).await.unwrap();

        let err = manager.delete_run(&run.id).await.unwrap_err();
        assert!(matches!(err, BenchError::Validation { .. }));

        manager.cancel_run(&run.id).await.unwrap();
        manager.wait(&run.id).await.unwrap();

        manager.delete_run(&run.id).await.unwrap();
        assert!(repo.get_run(&run.id).is_none());
        assert!(repo.list_results(&run.id).is_empty());
        assert!(matches!(
            manager.delete_run(&run.id).await.unwrap_err(),
            BenchError::NotFound { .. }
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_start_waits_for_inflight_delete() {
        let (_, repo) = manager(MockBehavior::default());
        let mut scripted = ScriptedRepository::new(repo.clone());
        scripted.list_results_stall = Some(Duration::from_millis(200));

        let (registry, counters) = MockAdapter::registry(MockBehavior::default());
        let engine = BenchmarkEngine::new(Arc::new(scripted), registry, &BenchmarkConfig::default());
        let manager = Arc::new(RunManager::new(Arc::new(engine)));
        let run = manager.create_run(request()).unwrap();

        let deleting = {
            let manager = manager.clone();
            let run_id = run.id.clone();
            tokio::spawn(async move { manager.delete_run(&run_id).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        let err = manager.start_run(&run.id).await.unwrap_err();
        assert!(matches!(err, BenchError::NotFound { .. }));
        deleting.await.unwrap().unwrap();

        assert!(repo.get_run(&run.id).is_none());
        assert!(repo.list_results(&run.id).is_empty());
        assert!(!manager.is_active(&run.id).await);
        assert_eq!(counters.initialized(), 0);
    }

    #[tokio::test]
    async fn test_results_grouping() {
        let (manager, _) = manager(MockBehavior::default());
        let run = manager.create_run(request()).unwrap();
        manager.start_run(&run.id).await.unwrap();
        manager.wait(&run.id).await.unwrap();

        let results = manager.get_results(&run.id).unwrap();

        assert_eq!(results.models.len(), 2);
        assert_eq!(results.models["m2"].backend, BackendType::Anthropic);
        assert_eq!(results.categories["writing"].name, "Writing");
        assert_eq!(results.results_by_model["m1"]["writing"].len(), 3);
        assert_eq!(results.all_results().count(), 6);
        assert_eq!(results.aggregate_scores, results.run.aggregate_scores);
    }

    #[tokio::test]
    async fn test_revise_quality_score() {
        let (manager, repo) = manager(MockBehavior::default());
        let run = manager.create_run(request()).unwrap();
        manager.start_run(&run.id).await.unwrap();
        let before = manager.wait(&run.id).await.unwrap();

        let target = repo.list_results(&run.id).remove(0);
        assert_eq!(target.scores.quality_score.as_ref().unwrap().raw_score, 0.0);

        let revised = manager
            .revise_quality_score(&target.id, "readability", 8.0)
            .await
            .unwrap();

        let quality = revised.scores.quality_score.as_ref().unwrap();
        assert!((quality.raw_score - 8.0).abs() < 1e-9);
        assert!(revised.ultimate_score.unwrap() > 0.0);
        assert_eq!(
            revised.output_data.as_ref().unwrap()["readability_score"],
            Value::from(8.0)
        );

        let after = repo.get_run(&run.id).unwrap();
        let model = &target.model_id;
        assert!(after.aggregate_scores[model]["writing"] > before.aggregate_scores[model]["writing"]);
    }

    #[tokio::test]
    async fn test_revise_rejects_bad_input() {
        let (manager, repo) = manager(MockBehavior::default());
        let run = manager.create_run(request()).unwrap();
        manager.start_run(&run.id).await.unwrap();
        manager.wait(&run.id).await.unwrap();
        let target = repo.list_results(&run.id).remove(0);

        assert!(manager
            .revise_quality_score(&target.id, "readability", 11.0)
            .await
            .is_err());
        assert!(manager
            .revise_quality_score(&target.id, "correctness", 5.0)
            .await
            .is_err());
        assert!(matches!(
            manager.revise_quality_score("missing", "readability", 5.0).await,
            Err(BenchError::NotFound { .. })
        ));
    }
}
