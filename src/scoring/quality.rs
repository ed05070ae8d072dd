//! @ai:module:intent Quality score from template evaluation criteria and the task output payload
//! @ai:module:layer domain
//! @ai:module:public_api quality, criterion_score
//! @ai:module:stateless true

use crate::catalog::{CriterionType, EvaluationCriterion};
use serde_json::Value;
use std::collections::BTreeMap;

/// Execution time that earns a full time_measurement score
const FAST_MS: f64 = 100.0;
/// Span over which the time_measurement score falls to zero
const SLOW_SPAN_MS: f64 = 1900.0;

/// @ai:intent Weighted mean of the scorable criteria, in [0, 1]
/// @ai:post None when there are no criteria, no output, or nothing could be scored
/// @ai:effects pure
pub fn quality(output: &Value, criteria: &BTreeMap<String, EvaluationCriterion>) -> Option<f64> {
    let payload = output.as_object().filter(|o| !o.is_empty())?;
    if criteria.is_empty() {
        return None;
    }

    let mut weighted = 0.0;
    let mut total_weight = 0.0;

    for (name, criterion) in criteria {
        let Some(score) = criterion_score(name, &criterion.kind, payload) else {
            tracing::warn!(
                "Skipping evaluation criterion '{}' of unsupported type {}",
                name,
                criterion.kind
            );
            continue;
        };

        weighted += score * criterion.weight;
        total_weight += criterion.weight;
    }

    if total_weight > 0.0 {
        Some(weighted / total_weight)
    } else {
        None
    }
}

/// @ai:intent Score one criterion in [0, 1]; None for types that cannot be scored automatically
/// @ai:effects pure
pub fn criterion_score(
    name: &str,
    kind: &CriterionType,
    payload: &serde_json::Map<String, Value>,
) -> Option<f64> {
    let score = match kind {
        CriterionType::UnitTest => unit_test_score(payload),
        CriterionType::ManualReview => payload
            .get(&format!("{}_score", name))
            .and_then(Value::as_f64)
            .map(|s| (s / 10.0).clamp(0.0, 1.0))
            .unwrap_or(0.0),
        CriterionType::StaticAnalysis => payload
            .get("static_analysis")
            .map(|analysis| {
                let issues = analysis.get("issues").and_then(Value::as_f64).unwrap_or(0.0);
                (1.0 - issues * 0.1).max(0.0)
            })
            .unwrap_or(0.0),
        CriterionType::GroundTruthComparison => ground_truth_score(payload),
        CriterionType::TimeMeasurement => payload
            .get("execution_time_ms")
            .and_then(Value::as_f64)
            .map(|ms| (1.0 - (ms - FAST_MS) / SLOW_SPAN_MS).clamp(0.0, 1.0))
            .unwrap_or(0.0),
        CriterionType::Benchmark | CriterionType::Other(_) => return None,
    };

    Some(score)
}

fn unit_test_score(payload: &serde_json::Map<String, Value>) -> f64 {
    let Some(tests) = payload.get("test_results").and_then(Value::as_array) else {
        return 0.0;
    };
    if tests.is_empty() {
        return 0.0;
    }

    let passed = tests
        .iter()
        .filter(|t| t.get("passed").and_then(Value::as_bool).unwrap_or(false))
        .count();

    passed as f64 / tests.len() as f64
}

/// Fraction of ground-truth keys (or positions) the actual output reproduces
fn ground_truth_score(payload: &serde_json::Map<String, Value>) -> f64 {
    let (Some(truth), Some(actual)) = (payload.get("ground_truth"), payload.get("actual_output"))
    else {
        return 0.0;
    };

    match truth {
        Value::Object(expected) if !expected.is_empty() => {
            let matches = expected
                .iter()
                .filter(|(key, value)| actual.get(key.as_str()) == Some(*value))
                .count();
            matches as f64 / expected.len() as f64
        }
        Value::Array(expected) if !expected.is_empty() => {
            let actual = actual.as_array().map(Vec::as_slice).unwrap_or(&[]);
            let matches = expected
                .iter()
                .enumerate()
                .filter(|(i, value)| actual.get(*i) == Some(*value))
                .count();
            matches as f64 / expected.len() as f64
        }
        _ => 0.0,
    }
}
