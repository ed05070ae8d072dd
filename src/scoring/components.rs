//! @ai:module:intent Inverse scores for execution time, memory and token cost
//! @ai:module:layer domain
//! @ai:module:public_api time_score, memory_score, cost_score
//! @ai:module:stateless true

use crate::scoring::{ScoreComponent, MAX_INVERSE_SCORE, MIN_INVERSE_SCORE};

/// @ai:intent reference / measured, clamped to [0.5, 1.5]
/// @ai:post a zero measurement yields the upper bound
/// @ai:effects pure
pub fn inverse_score(reference: f64, measured: f64) -> f64 {
    let ratio = reference / measured;

    if ratio.is_nan() {
        return MIN_INVERSE_SCORE;
    }
    ratio.clamp(MIN_INVERSE_SCORE, MAX_INVERSE_SCORE)
}

/// @ai:intent Faster is better
/// @ai:effects pure
pub fn time_score(seconds: Option<f64>, reference_secs: f64, weight: f64) -> Option<ScoreComponent> {
    let seconds = seconds?;

    Some(ScoreComponent {
        raw_score: seconds,
        normalized_score: inverse_score(reference_secs, seconds),
        weight,
        description: format!("Execution time: {:.2}s", seconds),
    })
}

/// @ai:intent Less memory is better
/// @ai:effects pure
pub fn memory_score(mb: Option<f64>, reference_mb: f64, weight: f64) -> Option<ScoreComponent> {
    let mb = mb?;

    Some(ScoreComponent {
        raw_score: mb,
        normalized_score: inverse_score(reference_mb, mb),
        weight,
        description: format!("Memory usage: {:.2}MB", mb),
    })
}

/// @ai:intent Fewer tokens is better
/// @ai:effects pure
pub fn cost_score(tokens: Option<u64>, reference_tokens: f64, weight: f64) -> Option<ScoreComponent> {
    let tokens = tokens?;

    Some(ScoreComponent {
        raw_score: tokens as f64,
        normalized_score: inverse_score(reference_tokens, tokens as f64),
        weight,
        description: format!("Token count: {}", tokens),
    })
}
