//! @ai:module:intent Resolve per-component weights from a category and task overrides
//! @ai:module:layer domain
//! @ai:module:public_api ScoreWeights
//! @ai:module:stateless true

use crate::catalog::{Category, Task};
use serde::{Deserialize, Serialize};

/// @ai:intent Weight applied to each score component
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub time: f64,
    pub quality: f64,
    pub complexity: f64,
    pub cost: f64,
    pub memory: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            time: 1.0,
            quality: 1.0,
            complexity: 1.0,
            cost: 1.0,
            memory: 1.0,
        }
    }
}

impl ScoreWeights {
    /// @ai:intent Copy the five weights of a category
    /// @ai:effects pure
    pub fn from_category(category: &Category) -> Self {
        Self {
            time: category.time_weight,
            quality: category.quality_weight,
            complexity: category.complexity_weight,
            cost: category.cost_weight,
            memory: category.memory_weight,
        }
    }

    /// @ai:intent Category weights (or all 1.0) overridden by the task's evaluation_weights
    /// @ai:effects pure
    pub fn resolve(category: Option<&Category>, task: &Task) -> Self {
        let mut weights = category.map(Self::from_category).unwrap_or_default();

        if let Some(overrides) = &task.evaluation_weights {
            for (key, value) in overrides {
                match key.as_str() {
                    "time" => weights.time = *value,
                    "quality" => weights.quality = *value,
                    "complexity" => weights.complexity = *value,
                    "cost" => weights.cost = *value,
                    "memory" => weights.memory = *value,
                    other => {
                        tracing::debug!("Ignoring unknown weight override '{}' on task {}", other, task.id)
                    }
                }
            }
        }

        weights
    }
}
