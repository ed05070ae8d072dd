//! @ai:module:intent Load catalog entities from a data directory
//! @ai:module:layer infrastructure
//! @ai:module:public_api CatalogLoader, Catalog
//! @ai:module:stateless true

use crate::catalog::{Category, Model, Task, Template};
use crate::store::InMemoryRepository;
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// @ai:intent Everything read from a data directory
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub models: Vec<Model>,
    pub tasks: Vec<Task>,
    pub categories: Vec<Category>,
    pub templates: Vec<Template>,
    /// Files that were skipped, with the reason
    pub rejected: Vec<(PathBuf, String)>,
}

impl Catalog {
    /// @ai:intent Copy the catalog into a fresh in-memory repository
    /// @ai:effects state:write
    pub fn into_repository(self) -> InMemoryRepository {
        let repo = InMemoryRepository::new();

        for model in self.models {
            repo.add_model(model);
        }
        for task in self.tasks {
            repo.add_task(task);
        }
        for category in self.categories {
            repo.add_category(category);
        }
        for template in self.templates {
            repo.add_template(template);
        }

        repo
    }
}

/// @ai:intent Trait for loading the catalog
pub trait CatalogLoaderTrait: Send + Sync {
    /// @ai:intent Load all entities below the data directory
    fn load_all(&self, data_dir: &Path) -> Result<Catalog>;
}

/// @ai:intent Loads entity files from `models/`, `tasks/`, `categories/` and `templates/`
///
/// Each file holds one entity as JSON or TOML. Invalid files are skipped and
/// reported in `Catalog::rejected`.
pub struct CatalogLoader;

impl CatalogLoader {
    /// @ai:intent Create a new catalog loader
    /// @ai:effects pure
    pub fn new() -> Self {
        Self
    }

    /// @ai:intent Parse a single entity file by extension
    /// @ai:pre path points to a .json or .toml file
    /// @ai:effects fs:read
    fn parse_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read entity file: {}", path.display()))?;

        let is_toml = path.extension().map(|ext| ext == "toml").unwrap_or(false);

        if is_toml {
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse entity file: {}", path.display()))
        } else {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse entity file: {}", path.display()))
        }
    }

    /// @ai:intent Find all entity files in a directory, sorted by path
    /// @ai:effects fs:read
    fn find_entity_files(dir: &Path) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "json" || ext == "toml")
                    .unwrap_or(false)
            })
            .map(|e| e.path().to_path_buf())
            .collect();

        files.sort();
        files
    }

    /// @ai:intent Load every entity of one kind, applying a validation hook
    /// @ai:effects fs:read
    fn load_kind<T, V>(
        dir: &Path,
        validate: V,
        rejected: &mut Vec<(PathBuf, String)>,
    ) -> Vec<T>
    where
        T: DeserializeOwned,
        V: Fn(&T) -> crate::error::Result<()>,
    {
        let mut entities = Vec::new();

        for path in Self::find_entity_files(dir) {
            let parsed = Self::parse_file::<T>(&path)
                .and_then(|entity| validate(&entity).map(|_| entity).map_err(Into::into));

            match parsed {
                Ok(entity) => entities.push(entity),
                Err(e) => {
                    tracing::warn!("Skipping invalid entity file {}: {:#}", path.display(), e);
                    rejected.push((path, format!("{:#}", e)));
                }
            }
        }

        entities
    }
}

impl Default for CatalogLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl CatalogLoaderTrait for CatalogLoader {
    /// @ai:intent Load all entities below the data directory
    /// @ai:effects fs:read
    fn load_all(&self, data_dir: &Path) -> Result<Catalog> {
        if !data_dir.is_dir() {
            anyhow::bail!("Data directory not found: {}", data_dir.display());
        }

        let mut rejected = Vec::new();

        let models = Self::load_kind::<Model, _>(&data_dir.join("models"), |_| Ok(()), &mut rejected);
        let tasks = Self::load_kind::<Task, _>(&data_dir.join("tasks"), |_| Ok(()), &mut rejected);
        let categories = Self::load_kind::<Category, _>(
            &data_dir.join("categories"),
            Category::validate,
            &mut rejected,
        );
        let templates = Self::load_kind::<Template, _>(
            &data_dir.join("templates"),
            Template::validate,
            &mut rejected,
        );

        tracing::info!(
            "Loaded catalog from {}: {} models, {} tasks, {} categories, {} templates",
            data_dir.display(),
            models.len(),
            tasks.len(),
            categories.len(),
            templates.len()
        );

        Ok(Catalog {
            models,
            tasks,
            categories,
            templates,
            rejected,
        })
    }
}
