//! @ai:module:intent Persistence contract consumed by the engine
//! @ai:module:layer domain
//! @ai:module:public_api Entity, Repository, InMemoryRepository

pub mod memory;
#[cfg(test)]
pub mod scripted;

pub use memory::{EntityStore, InMemoryRepository};

use crate::catalog::{Category, Model, Task, Template};
use crate::engine::{BenchmarkRun, TaskResult};

/// @ai:intent Capability every persisted entity must provide
pub trait Entity: Clone + Send + Sync {
    /// Human-readable entity kind used in logs and errors
    const KIND: &'static str;

    fn id(&self) -> &str;

    /// @ai:intent Refresh the entity's updated_at timestamp
    /// @ai:effects time
    fn touch(&mut self);
}

/// @ai:intent Storage collaborator: catalog lookups plus run/result persistence
///
/// Write operations report success as a boolean; the storage format is the
/// implementor's concern.
pub trait Repository: Send + Sync {
    fn get_model(&self, id: &str) -> Option<Model>;
    fn get_task(&self, id: &str) -> Option<Task>;
    fn get_category(&self, id: &str) -> Option<Category>;
    fn get_template(&self, id: &str) -> Option<Template>;

    fn list_models(&self) -> Vec<Model>;
    fn list_tasks(&self) -> Vec<Task>;
    fn list_categories(&self) -> Vec<Category>;

    fn create_run(&self, run: &mut BenchmarkRun) -> bool;
    fn update_run(&self, run: &mut BenchmarkRun) -> bool;
    fn get_run(&self, id: &str) -> Option<BenchmarkRun>;
    fn delete_run(&self, id: &str) -> bool;
    fn list_runs(&self) -> Vec<BenchmarkRun>;

    fn create_result(&self, result: &mut TaskResult) -> bool;
    fn update_result(&self, result: &mut TaskResult) -> bool;
    fn get_result(&self, id: &str) -> Option<TaskResult>;
    fn delete_result(&self, id: &str) -> bool;

    /// @ai:intent Results belonging to a run, oldest first
    fn list_results(&self, run_id: &str) -> Vec<TaskResult>;
}
