//! @ai:module:intent Benchmark task and category definitions
//! @ai:module:layer domain
//! @ai:module:public_api Task, Category
//! @ai:module:stateless true

use crate::store::Entity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// @ai:intent A benchmark task definition
/// @ai:effects pure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub name: String,
    pub template_id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category_id: Option<String>,
    /// Values for the template's input schema
    #[serde(default)]
    pub input_data: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub expected_output: Option<serde_json::Value>,
    /// Per-task overrides of the category weights, keyed by score name
    #[serde(default)]
    pub evaluation_weights: Option<BTreeMap<String, f64>>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// @ai:intent Create a task bound to a template
    /// @ai:effects time
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        template_id: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            template_id: template_id.into(),
            description: String::new(),
            category_id: None,
            input_data: BTreeMap::new(),
            expected_output: None,
            evaluation_weights: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// @ai:intent Builder-style input setter
    /// @ai:effects pure
    pub fn with_input(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.input_data.insert(key.into(), value);
        self
    }

    pub fn with_category(mut self, category_id: impl Into<String>) -> Self {
        self.category_id = Some(category_id.into());
        self
    }
}

impl Entity for Task {
    const KIND: &'static str = "Task";

    fn id(&self) -> &str {
        &self.id
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Upper bound of a category scoring weight
pub const MAX_CATEGORY_WEIGHT: f64 = 5.0;

/// @ai:intent Group of tasks sharing scoring weights
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub task_ids: Vec<String>,
    #[serde(default = "default_weight")]
    pub time_weight: f64,
    #[serde(default = "default_weight")]
    pub quality_weight: f64,
    #[serde(default = "default_weight")]
    pub complexity_weight: f64,
    #[serde(default = "default_weight")]
    pub cost_weight: f64,
    #[serde(default = "default_weight")]
    pub memory_weight: f64,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

fn default_weight() -> f64 {
    1.0
}

impl Category {
    /// @ai:intent Create a category with all weights at 1.0
    /// @ai:effects time
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            task_ids: Vec::new(),
            time_weight: 1.0,
            quality_weight: 1.0,
            complexity_weight: 1.0,
            cost_weight: 1.0,
            memory_weight: 1.0,
            created_at: now,
            updated_at: now,
        }
    }

    /// @ai:intent Check every weight is in (0, 5]
    /// @ai:effects pure
    pub fn validate(&self) -> crate::error::Result<()> {
        let weights = [
            ("time_weight", self.time_weight),
            ("quality_weight", self.quality_weight),
            ("complexity_weight", self.complexity_weight),
            ("cost_weight", self.cost_weight),
            ("memory_weight", self.memory_weight),
        ];

        for (name, weight) in weights {
            if !(weight > 0.0 && weight <= MAX_CATEGORY_WEIGHT) {
                return Err(crate::error::BenchError::Validation {
                    message: format!(
                        "Category {} weight must be in (0, {}], got {}",
                        self.id, MAX_CATEGORY_WEIGHT, weight
                    ),
                    field: Some(name.to_string()),
                });
            }
        }

        Ok(())
    }
}

impl Entity for Category {
    const KIND: &'static str = "Category";

    fn id(&self) -> &str {
        &self.id
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_defaults_to_unit_weights() {
        let category: Category =
            serde_json::from_str(r#"{"id": "coding", "name": "Coding", "time_weight": 2.0}"#)
                .unwrap();
        assert!((category.time_weight - 2.0).abs() < f64::EPSILON);
        assert!((category.memory_weight - 1.0).abs() < f64::EPSILON);
        assert!(category.validate().is_ok());
    }

    #[test]
    fn test_category_weight_bounds() {
        let mut category = Category::new("c", "C");
        category.cost_weight = 0.0;
        assert!(category.validate().is_err());

        category.cost_weight = 5.5;
        let err = category.validate().unwrap_err();
        assert!(err.to_string().contains("cost_weight"));
    }

    #[test]
    fn test_task_builder() {
        let task = Task::new("t1", "Sum", "code")
            .with_input("numbers", serde_json::json!([1, 2, 3]))
            .with_category("coding");
        assert_eq!(task.category_id.as_deref(), Some("coding"));
        assert_eq!(task.input_data.len(), 1);
    }
}
