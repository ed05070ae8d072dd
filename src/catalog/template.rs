//! @ai:module:intent Task templates: input/output schemas and evaluation criteria
//! @ai:module:layer domain
//! @ai:module:public_api Template, DataType, CriterionType, EvaluationCriterion, InputField, OutputField
//! @ai:module:stateless true

use crate::error::{BenchError, Result};
use crate::store::Entity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Allowed distance of the criteria weight sum from 1.0
pub const WEIGHT_SUM_TOLERANCE: f64 = 0.01;

/// @ai:intent Data type of a schema field
/// @ai:effects pure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    String,
    Number,
    Boolean,
    Object,
    Array,
    ImagePath,
    Text,
    StringArray,
    JsonObject,
}

impl DataType {
    /// @ai:intent Whether the type carries nested structure
    /// @ai:effects pure
    pub fn is_structured(&self) -> bool {
        matches!(
            self,
            DataType::Object | DataType::JsonObject | DataType::Array | DataType::StringArray
        )
    }
}

/// @ai:intent Kind of evaluation rule feeding the quality score
/// @ai:effects pure
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CriterionType {
    UnitTest,
    ManualReview,
    StaticAnalysis,
    Benchmark,
    GroundTruthComparison,
    TimeMeasurement,
    /// Criterion types this engine does not know how to score
    #[serde(untagged)]
    Other(String),
}

impl CriterionType {
    /// @ai:intent Convert criterion type to string representation
    /// @ai:effects pure
    pub fn as_str(&self) -> &str {
        match self {
            CriterionType::UnitTest => "unit_test",
            CriterionType::ManualReview => "manual_review",
            CriterionType::StaticAnalysis => "static_analysis",
            CriterionType::Benchmark => "benchmark",
            CriterionType::GroundTruthComparison => "ground_truth_comparison",
            CriterionType::TimeMeasurement => "time_measurement",
            CriterionType::Other(name) => name,
        }
    }
}

impl std::fmt::Display for CriterionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputField {
    #[serde(rename = "type")]
    pub data_type: DataType,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_required")]
    pub required: bool,
    #[serde(default)]
    pub default: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputField {
    #[serde(rename = "type")]
    pub data_type: DataType,
    #[serde(default)]
    pub description: String,
}

/// @ai:intent One weighted evaluation rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationCriterion {
    #[serde(rename = "type")]
    pub kind: CriterionType,
    pub weight: f64,
}

fn default_required() -> bool {
    true
}

/// @ai:intent Schema and evaluation rules shared by a family of tasks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub input_schema: BTreeMap<String, InputField>,
    #[serde(default)]
    pub output_schema: BTreeMap<String, OutputField>,
    #[serde(default)]
    pub evaluation_criteria: BTreeMap<String, EvaluationCriterion>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Template {
    /// @ai:intent Create an empty template
    /// @ai:effects time
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            input_schema: BTreeMap::new(),
            output_schema: BTreeMap::new(),
            evaluation_criteria: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// @ai:intent Names of input fields that must be present on a task
    /// @ai:effects pure
    pub fn required_inputs(&self) -> impl Iterator<Item = &str> {
        self.input_schema
            .iter()
            .filter(|(_, field)| field.required)
            .map(|(name, _)| name.as_str())
    }

    /// @ai:intent Check criterion weights are in (0, 1] and sum to 1.0 within tolerance
    /// @ai:pre template is about to be stored
    /// @ai:effects pure
    pub fn validate(&self) -> Result<()> {
        for (name, criterion) in &self.evaluation_criteria {
            if !(criterion.weight > 0.0 && criterion.weight <= 1.0) {
                return Err(BenchError::Validation {
                    message: format!(
                        "Criterion weight must be in (0, 1], got {} for template {}",
                        criterion.weight, self.id
                    ),
                    field: Some(name.clone()),
                });
            }
        }

        if self.evaluation_criteria.is_empty() {
            return Ok(());
        }

        let total: f64 = self.evaluation_criteria.values().map(|c| c.weight).sum();

        if (total - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(BenchError::Validation {
                message: format!(
                    "Evaluation criteria weights of template {} sum to {:.3}, expected 1.0",
                    self.id, total
                ),
                field: Some("evaluation_criteria".to_string()),
            });
        }

        Ok(())
    }
}

impl Entity for Template {
    const KIND: &'static str = "Template";

    fn id(&self) -> &str {
        &self.id
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
