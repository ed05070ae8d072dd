//! @ai:module:intent Combine measurements, template and weights into a ScoreSet
//! @ai:module:layer domain
//! @ai:module:public_api ScoreCalculator, ScoreCalculatorTrait, ScoreInput
//! @ai:module:stateless true

use crate::catalog::{Category, Task, Template};
use crate::config::ScoringConfig;
use crate::scoring::complexity::complexity;
use crate::scoring::components::{cost_score, memory_score, time_score};
use crate::scoring::quality::quality;
use crate::scoring::{ScoreComponent, ScoreSet, ScoreWeights};
use serde_json::Value;

/// @ai:intent Everything needed to score one successful task execution
#[derive(Debug, Clone, Copy)]
pub struct ScoreInput<'a> {
    pub task: &'a Task,
    pub template: Option<&'a Template>,
    pub category: Option<&'a Category>,
    pub execution_time_seconds: Option<f64>,
    pub memory_usage_mb: Option<f64>,
    pub token_count: Option<u64>,
    pub output: Option<&'a Value>,
}

/// @ai:intent Trait for score calculation
pub trait ScoreCalculatorTrait: Send + Sync {
    /// @ai:intent Compute every available score component
    fn score(&self, input: &ScoreInput<'_>) -> ScoreSet;
}

/// @ai:intent Pure score calculator parameterised by reference points
pub struct ScoreCalculator {
    references: ScoringConfig,
}

impl ScoreCalculator {
    /// @ai:intent Create a calculator with default reference points
    /// @ai:effects pure
    pub fn new() -> Self {
        Self::with_references(ScoringConfig::default())
    }

    pub fn with_references(references: ScoringConfig) -> Self {
        Self { references }
    }

    /// @ai:intent Quality component; ×10 raw scale
    /// @ai:effects pure
    fn quality_component(input: &ScoreInput<'_>, weight: f64) -> Option<ScoreComponent> {
        let template = input.template?;
        let normalized = quality(input.output?, &template.evaluation_criteria)?;

        Some(ScoreComponent {
            raw_score: normalized * 10.0,
            normalized_score: normalized,
            weight,
            description: "Quality evaluation based on template criteria".to_string(),
        })
    }

    /// @ai:intent Complexity component; ×5 raw scale
    /// @ai:effects pure
    fn complexity_component(input: &ScoreInput<'_>, weight: f64) -> Option<ScoreComponent> {
        let template = input.template?;
        let normalized = complexity(input.task, template, input.category);

        Some(ScoreComponent {
            raw_score: normalized * 5.0,
            normalized_score: normalized,
            weight,
            description: "Task complexity evaluation".to_string(),
        })
    }
}

impl Default for ScoreCalculator {
    fn default() -> Self {
        Self::new()
    }
}

impl ScoreCalculatorTrait for ScoreCalculator {
    /// @ai:intent Compute every available score component
    /// @ai:effects pure
    fn score(&self, input: &ScoreInput<'_>) -> ScoreSet {
        let weights = ScoreWeights::resolve(input.category, input.task);

        ScoreSet {
            time_score: time_score(
                input.execution_time_seconds,
                self.references.time_reference_secs,
                weights.time,
            ),
            quality_score: Self::quality_component(input, weights.quality),
            complexity_score: Self::complexity_component(input, weights.complexity),
            cost_score: cost_score(
                input.token_count,
                self.references.cost_reference_tokens,
                weights.cost,
            ),
            memory_score: memory_score(
                input.memory_usage_mb,
                self.references.memory_reference_mb,
                weights.memory,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CriterionType, EvaluationCriterion};
    use serde_json::json;

    fn template() -> Template {
        let mut template = Template::new("tpl", "Template");
        template.evaluation_criteria.insert(
            "tests".to_string(),
            EvaluationCriterion {
                kind: CriterionType::UnitTest,
                weight: 1.0,
            },
        );
        template
    }

    #[test]
    fn test_full_score_set() {
        let task = Task::new("t", "T", "tpl");
        let template = template();
        let output = json!({"test_results": [{"passed": true}, {"passed": false}]});

        let scores = ScoreCalculator::new().score(&ScoreInput {
            task: &task,
            template: Some(&template),
            category: None,
            execution_time_seconds: Some(0.5),
            memory_usage_mb: Some(200.0),
            token_count: Some(1000),
            output: Some(&output),
        });

        assert_eq!(scores.time_score.as_ref().unwrap().normalized_score, 1.5);
        assert_eq!(scores.memory_score.as_ref().unwrap().normalized_score, 0.5);
        assert_eq!(scores.cost_score.as_ref().unwrap().normalized_score, 1.0);
        assert_eq!(scores.quality_score.as_ref().unwrap().raw_score, 5.0);

        let complexity = scores.complexity_score.as_ref().unwrap();
        assert!((complexity.normalized_score - 0.36).abs() < 1e-9);
        assert!((complexity.raw_score - 1.8).abs() < 1e-9);

        let expected = 100.0 * 1.5 * 0.5 * 0.36 * 1.0 * 0.5;
        assert!((scores.ultimate_score().unwrap() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_without_template_only_measurements() {
        let task = Task::new("t", "T", "tpl");
        let scores = ScoreCalculator::new().score(&ScoreInput {
            task: &task,
            template: None,
            category: None,
            execution_time_seconds: Some(2.0),
            memory_usage_mb: None,
            token_count: None,
            output: None,
        });

        assert!(scores.quality_score.is_none());
        assert!(scores.complexity_score.is_none());
        assert_eq!(scores.components().count(), 1);
    }

    #[test]
    fn test_custom_references() {
        let task = Task::new("t", "T", "tpl");
        let calculator = ScoreCalculator::with_references(ScoringConfig {
            time_reference_secs: 4.0,
            ..ScoringConfig::default()
        });
        let scores = calculator.score(&ScoreInput {
            task: &task,
            template: None,
            category: None,
            execution_time_seconds: Some(4.0),
            memory_usage_mb: None,
            token_count: None,
            output: None,
        });

        assert_eq!(scores.time_score.unwrap().normalized_score, 1.0);
    }
}
