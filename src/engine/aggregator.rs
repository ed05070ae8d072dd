//! @ai:module:intent Aggregate task results into per-model, per-category mean scores
//! @ai:module:layer application
//! @ai:module:public_api ScoreAggregator, AggregateScores
//! @ai:module:stateless true

use crate::engine::TaskResult;
use std::collections::BTreeMap;

/// model id → category id → mean ultimate score
pub type AggregateScores = BTreeMap<String, BTreeMap<String, f64>>;

/// @ai:intent Trait for score aggregation
pub trait ScoreAggregatorTrait: Send + Sync {
    /// @ai:intent Mean ultimate score per (model, category)
    fn aggregate(&self, results: &[TaskResult]) -> AggregateScores;
}

/// @ai:intent Averages ultimate scores, ignoring results without one
pub struct ScoreAggregator;

impl ScoreAggregator {
    /// @ai:intent Create a new score aggregator
    /// @ai:effects pure
    pub fn new() -> Self {
        Self
    }
}

impl Default for ScoreAggregator {
    fn default() -> Self {
        Self::new()
    }
}

/// @ai:intent Calculate average of an iterator of f64
/// @ai:effects pure
pub fn average<I: Iterator<Item = f64>>(iter: I) -> f64 {
    let (sum, count) = iter.fold((0.0, 0u32), |(s, c), v| (s + v, c + 1));

    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

impl ScoreAggregatorTrait for ScoreAggregator {
    /// @ai:intent Mean ultimate score per (model, category); failed results are left out
    /// @ai:effects pure
    fn aggregate(&self, results: &[TaskResult]) -> AggregateScores {
        let mut buckets: BTreeMap<(&str, &str), Vec<f64>> = BTreeMap::new();

        for result in results {
            if let Some(score) = result.ultimate_score {
                buckets
                    .entry((result.model_id.as_str(), result.category_key()))
                    .or_default()
                    .push(score);
            }
        }

        let mut aggregates = AggregateScores::new();
        for ((model_id, category_id), scores) in buckets {
            aggregates
                .entry(model_id.to_string())
                .or_default()
                .insert(category_id.to_string(), average(scores.into_iter()));
        }

        aggregates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::run::UNCATEGORIZED;

    fn result(model: &str, category: Option<&str>, score: Option<f64>) -> TaskResult {
        let mut result = TaskResult::new("t", model, "run");
        result.category_id = category.map(str::to_string);
        result.ultimate_score = score;
        result
    }

    #[test]
    fn test_average() {
        assert_eq!(average(vec![1.0, 2.0, 3.0].into_iter()), 2.0);
        assert_eq!(average(std::iter::empty()), 0.0);
    }

    #[test]
    fn test_groups_by_model_and_category() {
        let results = vec![
            result("m1", Some("coding"), Some(40.0)),
            result("m1", Some("coding"), Some(60.0)),
            result("m1", None, Some(10.0)),
            result("m2", Some("coding"), Some(30.0)),
            result("m2", Some("coding"), None),
        ];

        let aggregates = ScoreAggregator::new().aggregate(&results);
        assert_eq!(aggregates.len(), 2);
        assert_eq!(aggregates["m1"]["coding"], 50.0);
        assert_eq!(aggregates["m1"][UNCATEGORIZED], 10.0);
        assert_eq!(aggregates["m2"]["coding"], 30.0);
    }

    #[test]
    fn test_only_failed_results_yield_nothing() {
        let results = vec![result("m1", Some("coding"), None)];
        assert!(ScoreAggregator::new().aggregate(&results).is_empty());
    }
}
