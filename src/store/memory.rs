//! @ai:module:intent In-memory repository used by the CLI and tests
//! @ai:module:layer infrastructure
//! @ai:module:public_api InMemoryRepository, EntityStore
//! @ai:module:stateless false

use crate::catalog::{Category, Model, Task, Template};
use crate::engine::{BenchmarkRun, TaskResult};
use crate::store::{Entity, Repository};
use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// @ai:intent Thread-safe map of entities keyed by id
pub struct EntityStore<T: Entity> {
    items: RwLock<BTreeMap<String, T>>,
}

impl<T: Entity> EntityStore<T> {
    pub fn new() -> Self {
        Self {
            items: RwLock::new(BTreeMap::new()),
        }
    }

    // A panicked writer cannot leave a half-written entity behind, so poisoned locks are reused.
    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, T>> {
        self.items.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, T>> {
        self.items.write().unwrap_or_else(|e| e.into_inner())
    }

    /// @ai:intent Insert a new entity; false if the id is taken
    /// @ai:effects state:write, time
    pub fn create(&self, entity: &mut T) -> bool {
        let mut items = self.write();

        if items.contains_key(entity.id()) {
            tracing::warn!("{} already exists: {}", T::KIND, entity.id());
            return false;
        }

        entity.touch();
        items.insert(entity.id().to_string(), entity.clone());
        true
    }

    /// @ai:intent Replace an existing entity; false if it does not exist
    /// @ai:effects state:write, time
    pub fn update(&self, entity: &mut T) -> bool {
        let mut items = self.write();

        match items.get_mut(entity.id()) {
            Some(slot) => {
                entity.touch();
                *slot = entity.clone();
                true
            }
            None => {
                tracing::warn!("Cannot update missing {}: {}", T::KIND, entity.id());
                false
            }
        }
    }

    /// @ai:intent Insert or replace without existence checks
    /// @ai:effects state:write, time
    pub fn upsert(&self, mut entity: T) {
        entity.touch();
        self.write().insert(entity.id().to_string(), entity);
    }

    pub fn get(&self, id: &str) -> Option<T> {
        self.read().get(id).cloned()
    }

    pub fn delete(&self, id: &str) -> bool {
        self.write().remove(id).is_some()
    }

    /// @ai:intent All entities ordered by id
    /// @ai:effects state:read
    pub fn list(&self) -> Vec<T> {
        self.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

impl<T: Entity> Default for EntityStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// @ai:intent Repository backed entirely by process memory
#[derive(Default)]
pub struct InMemoryRepository {
    pub models: EntityStore<Model>,
    pub tasks: EntityStore<Task>,
    pub categories: EntityStore<Category>,
    pub templates: EntityStore<Template>,
    pub runs: EntityStore<BenchmarkRun>,
    pub results: EntityStore<TaskResult>,
}

impl InMemoryRepository {
    /// @ai:intent Create an empty repository
    /// @ai:effects pure
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_model(&self, model: Model) {
        self.models.upsert(model);
    }

    pub fn add_task(&self, task: Task) {
        self.tasks.upsert(task);
    }

    pub fn add_category(&self, category: Category) {
        self.categories.upsert(category);
    }

    pub fn add_template(&self, template: Template) {
        self.templates.upsert(template);
    }
}

impl Repository for InMemoryRepository {
    fn get_model(&self, id: &str) -> Option<Model> {
        self.models.get(id)
    }

    fn get_task(&self, id: &str) -> Option<Task> {
        self.tasks.get(id)
    }

    fn get_category(&self, id: &str) -> Option<Category> {
        self.categories.get(id)
    }

    fn get_template(&self, id: &str) -> Option<Template> {
        self.templates.get(id)
    }

    fn list_models(&self) -> Vec<Model> {
        self.models.list()
    }

    fn list_tasks(&self) -> Vec<Task> {
        self.tasks.list()
    }

    fn list_categories(&self) -> Vec<Category> {
        self.categories.list()
    }

    fn create_run(&self, run: &mut BenchmarkRun) -> bool {
        self.runs.create(run)
    }

    fn update_run(&self, run: &mut BenchmarkRun) -> bool {
        self.runs.update(run)
    }

    fn get_run(&self, id: &str) -> Option<BenchmarkRun> {
        self.runs.get(id)
    }

    fn delete_run(&self, id: &str) -> bool {
        self.runs.delete(id)
    }

    fn list_runs(&self) -> Vec<BenchmarkRun> {
        let mut runs = self.runs.list();
        runs.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        runs
    }

    fn create_result(&self, result: &mut TaskResult) -> bool {
        self.results.create(result)
    }

    fn update_result(&self, result: &mut TaskResult) -> bool {
        self.results.update(result)
    }

    fn get_result(&self, id: &str) -> Option<TaskResult> {
        self.results.get(id)
    }

    fn delete_result(&self, id: &str) -> bool {
        self.results.delete(id)
    }

    fn list_results(&self, run_id: &str) -> Vec<TaskResult> {
        let mut results: Vec<_> = self
            .results
            .list()
            .into_iter()
            .filter(|r| r.run_id == run_id)
            .collect();
        results.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        results
    }
}
