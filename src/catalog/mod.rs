//! @ai:module:intent Catalog entities (models, tasks, categories, templates) and their loader
//! @ai:module:layer domain
//! @ai:module:public_api Model, BackendType, GenerationParams, Task, Category, Template, CatalogLoader

pub mod loader;
pub mod model;
pub mod task;
pub mod template;

pub use loader::{Catalog, CatalogLoader, CatalogLoaderTrait};
pub use model::{BackendType, GenerationParams, Model};
pub use task::{Category, Task};
pub use template::{
    CriterionType, DataType, EvaluationCriterion, InputField, OutputField, Template,
};
