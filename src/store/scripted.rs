//! @ai:module:intent In-memory repository with scripted write failures and stalls, for engine tests
//! @ai:module:layer infrastructure
//! @ai:module:stateless false

use crate::catalog::{Category, Model, Task, Template};
use crate::engine::{BenchmarkRun, TaskResult};
use crate::store::{InMemoryRepository, Repository};
use std::sync::Arc;
use std::time::Duration;

/// @ai:intent Delegates to an InMemoryRepository, misbehaving where told to
pub struct ScriptedRepository {
    pub inner: Arc<InMemoryRepository>,
    /// create_result fails for results of this model
    pub reject_results_for: Option<String>,
    /// list_results blocks its thread this long before answering
    pub list_results_stall: Option<Duration>,
}

impl ScriptedRepository {
    pub fn new(inner: Arc<InMemoryRepository>) -> Self {
        Self {
            inner,
            reject_results_for: None,
            list_results_stall: None,
        }
    }
}

impl Repository for ScriptedRepository {
    fn get_model(&self, id: &str) -> Option<Model> {
        self.inner.get_model(id)
    }

    fn get_task(&self, id: &str) -> Option<Task> {
        self.inner.get_task(id)
    }

    fn get_category(&self, id: &str) -> Option<Category> {
        self.inner.get_category(id)
    }

    fn get_template(&self, id: &str) -> Option<Template> {
        self.inner.get_template(id)
    }

    fn list_models(&self) -> Vec<Model> {
        self.inner.list_models()
    }

    fn list_tasks(&self) -> Vec<Task> {
        self.inner.list_tasks()
    }

    fn list_categories(&self) -> Vec<Category> {
        self.inner.list_categories()
    }

    fn create_run(&self, run: &mut BenchmarkRun) -> bool {
        self.inner.create_run(run)
    }

    fn update_run(&self, run: &mut BenchmarkRun) -> bool {
        self.inner.update_run(run)
    }

    fn get_run(&self, id: &str) -> Option<BenchmarkRun> {
        self.inner.get_run(id)
    }

    fn delete_run(&self, id: &str) -> bool {
        self.inner.delete_run(id)
    }

    fn list_runs(&self) -> Vec<BenchmarkRun> {
        self.inner.list_runs()
    }

    fn create_result(&self, result: &mut TaskResult) -> bool {
        if self.reject_results_for.as_deref() == Some(result.model_id.as_str()) {
            return false;
        }
        self.inner.create_result(result)
    }

    fn update_result(&self, result: &mut TaskResult) -> bool {
        self.inner.update_result(result)
    }

    fn get_result(&self, id: &str) -> Option<TaskResult> {
        self.inner.get_result(id)
    }

    fn delete_result(&self, id: &str) -> bool {
        self.inner.delete_result(id)
    }

    fn list_results(&self, run_id: &str) -> Vec<TaskResult> {
        if let Some(stall) = self.list_results_stall {
            std::thread::sleep(stall);
        }
        self.inner.list_results(run_id)
    }
}
