//! @ai:module:intent Resolve a run's models and tasks, drive the task runner, aggregate and persist
//! @ai:module:layer application
//! @ai:module:public_api BenchmarkEngine, RunCell
//! @ai:module:stateless false

use crate::adapter::AdapterRegistry;
use crate::catalog::{Model, Task};
use crate::config::BenchmarkConfig;
use crate::engine::aggregator::{ScoreAggregator, ScoreAggregatorTrait};
use crate::engine::{BenchmarkRun, RunRequest, RunStatus, TaskResult};
use crate::error::{BenchError, Result};
use crate::runner::{CancellationToken, TaskRunner};
use crate::store::Repository;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Shared, single-writer record of a run in progress
pub type RunCell = Arc<Mutex<BenchmarkRun>>;

/// @ai:intent Benchmark orchestrator
pub struct BenchmarkEngine {
    repository: Arc<dyn Repository>,
    runner: TaskRunner,
    aggregator: ScoreAggregator,
    parallel_models: bool,
}

impl BenchmarkEngine {
    /// @ai:intent Create an engine over a repository and adapter registry
    /// @ai:effects pure
    pub fn new(
        repository: Arc<dyn Repository>,
        registry: AdapterRegistry,
        config: &BenchmarkConfig,
    ) -> Self {
        let runner = TaskRunner::new(
            repository.clone(),
            registry,
            config.run.clone(),
            config.scoring.clone(),
        );

        Self {
            repository,
            runner,
            aggregator: ScoreAggregator::new(),
            parallel_models: config.run.parallel_models,
        }
    }

    pub fn repository(&self) -> &Arc<dyn Repository> {
        &self.repository
    }

    pub fn runner(&self) -> &TaskRunner {
        &self.runner
    }

    /// @ai:intent Validate a request and persist it as a ready run
    /// @ai:post exactly one of category_ids / task_ids is non-empty
    /// @ai:effects state:write
    pub fn create_run(&self, request: RunRequest) -> Result<BenchmarkRun> {
        let category_ids = request.category_ids.filter(|ids| !ids.is_empty());
        let task_ids = request.task_ids.filter(|ids| !ids.is_empty());

        if request.model_ids.is_empty() {
            return Err(BenchError::Validation {
                message: "At least one model is required".to_string(),
                field: Some("model_ids".to_string()),
            });
        }
        match (&category_ids, &task_ids) {
            (Some(_), Some(_)) => {
                return Err(BenchError::validation(
                    "Specify either category_ids or task_ids, not both",
                ))
            }
            (None, None) => {
                return Err(BenchError::validation(
                    "Either category_ids or task_ids must be provided",
                ))
            }
            _ => {}
        }

        for model_id in &request.model_ids {
            if self.repository.get_model(model_id).is_none() {
                return Err(BenchError::Validation {
                    message: format!("Model not found: {}", model_id),
                    field: Some("model_ids".to_string()),
                });
            }
        }
        for category_id in category_ids.iter().flatten() {
            if self.repository.get_category(category_id).is_none() {
                return Err(BenchError::Validation {
                    message: format!("Category not found: {}", category_id),
                    field: Some("category_ids".to_string()),
                });
            }
        }

        let mut run = BenchmarkRun::new(request.name, request.model_ids);
        run.description = request.description;
        run.category_ids = category_ids;
        run.task_ids = task_ids;
        run.transition(RunStatus::Ready)?;

        if !self.repository.create_run(&mut run) {
            return Err(BenchError::Repository(format!(
                "Failed to create benchmark run {}",
                run.id
            )));
        }

        tracing::info!("Created benchmark run {} ({})", run.id, run.name);
        Ok(run)
    }

    /// @ai:intent Move a stored run to running and hand back its cell
    /// @ai:pre run status is draft or ready
    /// @ai:effects state:write, time
    pub fn begin(&self, run_id: &str) -> Result<RunCell> {
        let mut run = self
            .repository
            .get_run(run_id)
            .ok_or_else(|| BenchError::not_found("Benchmark run", run_id))?;

        if !matches!(run.status, RunStatus::Draft | RunStatus::Ready) {
            return Err(BenchError::InvalidState(format!(
                "Benchmark run {} is {} and cannot be started",
                run.id, run.status
            )));
        }

        run.mark_running()?;
        self.persist(&mut run)?;

        tracing::info!("Benchmark run {} started", run.id);
        Ok(Arc::new(Mutex::new(run)))
    }

    /// @ai:intent Begin and execute a run to the end on the current task
    /// @ai:effects network, state:write, time
    pub async fn execute_benchmark(&self, run_id: &str) -> Result<BenchmarkRun> {
        let cell = self.begin(run_id)?;
        self.execute(cell.clone(), CancellationToken::new()).await;

        let run = cell.lock().await.clone();
        Ok(run)
    }

    /// @ai:intent Execute every (model, task) pair and finish the run
    /// @ai:post the run ends completed or failed unless it was already terminal
    /// @ai:effects network, state:write, time
    pub async fn execute(&self, cell: RunCell, cancel: CancellationToken) {
        let snapshot = cell.lock().await.clone();
        let outcome = self.execute_pairs(&cell, &snapshot, &cancel).await;

        let mut run = cell.lock().await;
        match outcome {
            Ok(()) if run.mark_completed() => {
                tracing::info!(
                    "Benchmark run {} completed with {} results",
                    run.id,
                    run.results.len()
                );
            }
            Ok(()) => {
                tracing::info!("Benchmark run {} finished after it was {}", run.id, run.status);
            }
            Err(err) => {
                let err = err.for_run(&run.id);
                if run.mark_failed(err.to_string()) {
                    tracing::error!("Benchmark run {} failed: {}", run.id, err);
                }
            }
        }

        if let Err(err) = self.persist(&mut run) {
            tracing::error!("Could not persist final state of run {}: {}", run.id, err);
        }
    }

    async fn execute_pairs(
        &self,
        cell: &RunCell,
        run: &BenchmarkRun,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let models = self.resolve_models(run)?;
        let tasks = self.resolve_tasks(run)?;

        tracing::info!(
            "Run {}: {} models x {} tasks",
            run.id,
            models.len(),
            tasks.len()
        );

        if self.parallel_models {
            let sessions = models
                .iter()
                .map(|model| self.run_model(cell, &run.id, model, &tasks, cancel));
            // Every session runs to the end so each adapter gets its cleanup, then the first error wins.
            futures::future::join_all(sessions)
                .await
                .into_iter()
                .collect::<Result<Vec<()>>>()?;
        } else {
            for model in &models {
                self.run_model(cell, &run.id, model, &tasks, cancel).await?;
            }
        }

        Ok(())
    }

    /// @ai:intent Run every task for one model, sequentially
    /// @ai:effects network, state:write
    async fn run_model(
        &self,
        cell: &RunCell,
        run_id: &str,
        model: &Model,
        tasks: &[Task],
        cancel: &CancellationToken,
    ) -> Result<()> {
        tracing::info!("Running benchmark {} against model {}", run_id, model.id);

        for task in tasks {
            if cancel.is_cancelled() {
                tracing::info!("Run {} cancelled; model {} stops launching tasks", run_id, model.id);
                break;
            }

            let mut result = self.runner.execute(task, model, run_id, cancel).await;
            self.record(cell, &mut result).await?;
        }

        Ok(())
    }

    /// @ai:intent Persist a result, append it to the run and refresh aggregates
    /// @ai:effects state:write
    async fn record(&self, cell: &RunCell, result: &mut TaskResult) -> Result<()> {
        if !self.repository.create_result(result) {
            return Err(BenchError::Repository(format!(
                "Failed to store task result {}",
                result.id
            )));
        }

        let mut run = cell.lock().await;
        run.results.push(result.id.clone());
        self.refresh_aggregates(&mut run);
        self.persist(&mut run)
    }

    /// @ai:intent Recompute aggregate_scores from the run's stored results
    /// @ai:effects state:read
    pub fn refresh_aggregates(&self, run: &mut BenchmarkRun) {
        let results = self.repository.list_results(&run.id);
        run.aggregate_scores = self.aggregator.aggregate(&results);
    }

    /// @ai:effects state:write
    pub fn persist(&self, run: &mut BenchmarkRun) -> Result<()> {
        if self.repository.update_run(run) {
            Ok(())
        } else {
            Err(BenchError::Repository(format!(
                "Failed to update benchmark run {}",
                run.id
            )))
        }
    }

    /// @ai:intent Models of a run; any missing model fails the run
    /// @ai:effects state:read
    pub fn resolve_models(&self, run: &BenchmarkRun) -> Result<Vec<Model>> {
        run.model_ids
            .iter()
            .map(|id| {
                self.repository
                    .get_model(id)
                    .ok_or_else(|| BenchError::execution(format!("Model not found: {}", id)))
            })
            .collect()
    }

    /// @ai:intent Explicit tasks, or the de-duplicated union of category tasks in order
    /// @ai:post missing tasks are skipped; a missing category is an error
    /// @ai:effects state:read
    pub fn resolve_tasks(&self, run: &BenchmarkRun) -> Result<Vec<Task>> {
        let task_ids: Vec<String> = match (&run.task_ids, &run.category_ids) {
            (Some(ids), _) => ids.clone(),
            (None, Some(category_ids)) => {
                let mut ids = Vec::new();
                for category_id in category_ids {
                    let category = self.repository.get_category(category_id).ok_or_else(|| {
                        BenchError::execution(format!("Category not found: {}", category_id))
                    })?;
                    ids.extend(category.task_ids);
                }
                ids
            }
            (None, None) => Vec::new(),
        };

        let mut seen = HashSet::new();
        let mut tasks = Vec::new();

        for id in task_ids {
            if !seen.insert(id.clone()) {
                continue;
            }
            match self.repository.get_task(&id) {
                Some(task) => tasks.push(task),
                None => tracing::warn!("Run {}: task {} not found, skipping", run.id, id),
            }
        }

        Ok(tasks)
    }

    /// @ai:intent Expected number of executions (tasks × models); 0 when unresolvable
    /// @ai:effects state:read
    pub fn expected_executions(&self, run: &BenchmarkRun) -> usize {
        self.resolve_tasks(run).map(|tasks| tasks.len()).unwrap_or(0) * run.model_ids.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{MockAdapter, MockBehavior, MockCounters};
    use crate::catalog::{BackendType, Category, Template};
    use crate::engine::run::UNCATEGORIZED;
    use crate::store::scripted::ScriptedRepository;
    use crate::store::InMemoryRepository;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    struct Fixture {
        engine: BenchmarkEngine,
        repo: Arc<InMemoryRepository>,
        counters: Arc<MockCounters>,
    }

    fn fixture(behavior: MockBehavior, parallel: bool) -> Fixture {
        let repo = Arc::new(InMemoryRepository::new());
        repo.add_template(Template::new("plain", "Plain"));
        repo.add_model(Model::new("m1", BackendType::Ollama, "llama3"));
        repo.add_model(Model::new("m2", BackendType::OpenAi, "gpt-4o-mini"));

        let mut category = Category::new("coding", "Coding");
        category.task_ids = vec!["t1".to_string(), "t2".to_string(), "t3".to_string()];
        repo.add_category(category);

        for id in ["t1", "t2", "t3"] {
            repo.add_task(Task::new(id, format!("Task {}", id), "plain").with_category("coding"));
        }

        let (registry, counters) = MockAdapter::registry(behavior);
        let mut config = BenchmarkConfig::default();
        config.run.parallel_models = parallel;

        Fixture {
            engine: BenchmarkEngine::new(repo.clone(), registry, &config),
            repo,
            counters,
        }
    }

    fn request(category_ids: Option<Vec<&str>>, task_ids: Option<Vec<&str>>) -> RunRequest {
        let owned = |ids: Vec<&str>| ids.into_iter().map(str::to_string).collect();
        RunRequest {
            name: "nightly".to_string(),
            description: String::new(),
            model_ids: vec!["m1".to_string(), "m2".to_string()],
            category_ids: category_ids.map(owned),
            task_ids: task_ids.map(owned),
        }
    }

    #[test]
    fn test_create_run_requires_exactly_one_selector() {
        let f = fixture(MockBehavior::default(), false);

        assert!(f.engine.create_run(request(None, None)).is_err());
        assert!(f
            .engine
            .create_run(request(Some(vec!["coding"]), Some(vec!["t1"])))
            .is_err());
        assert!(f.engine.create_run(request(Some(vec![]), None)).is_err());

        let run = f.engine.create_run(request(None, Some(vec!["t1"]))).unwrap();
        assert_eq!(run.status, RunStatus::Ready);
        assert!(f.repo.get_run(&run.id).is_some());
    }

    #[test]
    fn test_create_run_checks_references() {
        let f = fixture(MockBehavior::default(), false);

        let mut bad_model = request(None, Some(vec!["t1"]));
        bad_model.model_ids.push("ghost".to_string());
        let err = f.engine.create_run(bad_model).unwrap_err();
        assert!(err.to_string().contains("Model not found: ghost"));

        let err = f
            .engine
            .create_run(request(Some(vec!["ghost"]), None))
            .unwrap_err();
        assert!(err.to_string().contains("Category not found: ghost"));

        let mut no_models = request(None, Some(vec!["t1"]));
        no_models.model_ids.clear();
        assert!(f.engine.create_run(no_models).is_err());
    }

    #[test]
    fn test_resolve_tasks_dedupes_and_skips_missing() {
        let f = fixture(MockBehavior::default(), false);
        let mut other = Category::new("other", "Other");
        other.task_ids = vec!["t3".to_string(), "ghost".to_string(), "t1".to_string()];
        f.repo.add_category(other);

        let run = f
            .engine
            .create_run(request(Some(vec!["coding", "other"]), None))
            .unwrap();
        let ids: Vec<String> = f
            .engine
            .resolve_tasks(&run)
            .unwrap()
            .into_iter()
            .map(|t| t.id)
            .collect();

        assert_eq!(ids, vec!["t1", "t2", "t3"]);
        assert_eq!(f.engine.expected_executions(&run), 6);
    }

    #[tokio::test]
    async fn test_two_models_three_tasks_all_succeed() {
        let f = fixture(MockBehavior::default(), false);
        let run = f.engine.create_run(request(Some(vec!["coding"]), None)).unwrap();

        let run = f.engine.execute_benchmark(&run.id).await.unwrap();

        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.results.len(), 6);
        assert_eq!(f.repo.list_results(&run.id).len(), 6);
        assert_eq!(run.aggregate_scores.len(), 2);
        assert!(run.aggregate_scores["m1"].contains_key("coding"));
        assert!(run.start_time.unwrap() <= run.end_time.unwrap());
        assert_eq!(f.counters.cleaned_up(), 6);

        let stored = f.repo.get_run(&run.id).unwrap();
        assert_eq!(stored.status, RunStatus::Completed);
    }

    #[tokio::test]
    async fn test_one_generate_failure_is_isolated() {
        let behavior = MockBehavior {
            fail_on: Some("Task t2".to_string()),
            ..MockBehavior::default()
        };
        let f = fixture(behavior, false);
        let run = f
            .engine
            .create_run(request(None, Some(vec!["t1", "t2", "t3"])))
            .unwrap();

        let run = f.engine.execute_benchmark(&run.id).await.unwrap();
        let results = f.repo.list_results(&run.id);

        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(results.len(), 6);

        let failed: Vec<_> = results.iter().filter(|r| r.error.is_some()).collect();
        assert_eq!(failed.len(), 2);
        for result in &failed {
            assert_eq!(result.task_id, "t2");
            assert!(result.scores.is_empty());
            assert_eq!(result.ultimate_score, None);
        }
        assert!(results
            .iter()
            .filter(|r| r.task_id != "t2")
            .all(|r| r.ultimate_score.is_some()));
    }

    #[tokio::test]
    async fn test_parallel_models_produce_same_shape() {
        let f = fixture(MockBehavior::default(), true);
        let run = f.engine.create_run(request(Some(vec!["coding"]), None)).unwrap();

        let run = f.engine.execute_benchmark(&run.id).await.unwrap();

        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.results.len(), 6);
        assert_eq!(run.aggregate_scores.len(), 2);
    }

    #[tokio::test]
    async fn test_parallel_failure_lets_other_sessions_clean_up() {
        let behavior = MockBehavior {
            delay: Some(Duration::from_millis(100)),
            ..MockBehavior::default()
        };
        let f = fixture(behavior.clone(), true);
        let mut scripted = ScriptedRepository::new(f.repo.clone());
        scripted.reject_results_for = Some("m1".to_string());

        let (registry, counters) = MockAdapter::registry(behavior);
        let mut config = BenchmarkConfig::default();
        config.run.parallel_models = true;
        let engine = BenchmarkEngine::new(Arc::new(scripted), registry, &config);

        let run = engine.create_run(request(Some(vec!["coding"]), None)).unwrap();
        let run = engine.execute_benchmark(&run.id).await.unwrap();

        assert_eq!(run.status, RunStatus::Failed);
        assert!(run.error.unwrap().contains("Failed to store task result"));
        assert_eq!(counters.initialized(), counters.cleaned_up());
        assert_eq!(counters.initialized(), 4);

        let stored = f.repo.list_results(&run.id);
        assert_eq!(stored.len(), 3);
        assert!(stored.iter().all(|r| r.model_id == "m2"));
    }

    #[tokio::test]
    async fn test_missing_model_fails_run() {
        let f = fixture(MockBehavior::default(), false);
        let run = f.engine.create_run(request(None, Some(vec!["t1"]))).unwrap();
        f.repo.models.delete("m2");

        let run = f.engine.execute_benchmark(&run.id).await.unwrap();

        assert_eq!(run.status, RunStatus::Failed);
        assert!(run.error.unwrap().contains("Model not found: m2"));
        assert!(run.end_time.is_some());
    }

    #[tokio::test]
    async fn test_uncategorized_tasks_aggregate_separately() {
        let f = fixture(MockBehavior::default(), false);
        f.repo.add_task(Task::new("loose", "Loose", "plain"));
        let run = f.engine.create_run(request(None, Some(vec!["loose", "t1"]))).unwrap();

        let run = f.engine.execute_benchmark(&run.id).await.unwrap();

        assert!(run.aggregate_scores["m1"].contains_key(UNCATEGORIZED));
        assert!(run.aggregate_scores["m1"].contains_key("coding"));
    }

    #[tokio::test]
    async fn test_category_weight_doubles_aggregate() {
        let baseline = fixture(MockBehavior::default(), false);
        let run = baseline
            .engine
            .create_run(request(Some(vec!["coding"]), None))
            .unwrap();
        let base = baseline.engine.execute_benchmark(&run.id).await.unwrap();

        let weighted = fixture(MockBehavior::default(), false);
        let mut category = weighted.repo.get_category("coding").unwrap();
        category.time_weight = 2.0;
        weighted.repo.add_category(category);

        let run = weighted
            .engine
            .create_run(request(Some(vec!["coding"]), None))
            .unwrap();
        let doubled = weighted.engine.execute_benchmark(&run.id).await.unwrap();

        for model in ["m1", "m2"] {
            let base_results = baseline.repo.list_results(&base.id);
            let doubled_results = weighted.repo.list_results(&doubled.id);
            for (b, d) in base_results
                .iter()
                .filter(|r| r.model_id == model)
                .zip(doubled_results.iter().filter(|r| r.model_id == model))
            {
                let b_time = b.scores.time_score.as_ref().unwrap();
                let d_time = d.scores.time_score.as_ref().unwrap();
                assert_eq!(b_time.weight, 1.0);
                assert_eq!(d_time.weight, 2.0);

                assert_eq!(b_time.normalized_score, d_time.normalized_score);

                let b_rest = b.ultimate_score.unwrap() / b_time.weighted();
                let d_rest = d.ultimate_score.unwrap() / d_time.weighted();
                assert!((b_rest - d_rest).abs() < 1e-9);
            }

            let base_score = base.aggregate_scores[model]["coding"];
            let doubled_score = doubled.aggregate_scores[model]["coding"];
            assert!(base_score > 0.0);
            assert!(
                (doubled_score - 2.0 * base_score).abs() < 1e-9,
                "{}: {} is not twice {}",
                model,
                doubled_score,
                base_score
            );
        }
    }

    #[test]
    fn test_begin_rejects_finished_run() {
        let f = fixture(MockBehavior::default(), false);
        let run = f.engine.create_run(request(None, Some(vec!["t1"]))).unwrap();

        let cell = f.engine.begin(&run.id).unwrap();
        assert_eq!(cell.try_lock().unwrap().status, RunStatus::Running);

        let err = f.engine.begin(&run.id).err().unwrap();
        assert!(matches!(err, BenchError::InvalidState(_)));
    }
}
