//! @ai:module:intent Five-component scoring of task results and the ultimate score
//! @ai:module:layer domain
//! @ai:module:public_api ScoreComponent, ScoreSet, ScoreWeights, ScoreCalculator
//! @ai:module:stateless true

pub mod calculator;
pub mod complexity;
pub mod components;
pub mod quality;
pub mod weights;

pub use calculator::{ScoreCalculator, ScoreCalculatorTrait};
pub use weights::ScoreWeights;

use serde::{Deserialize, Serialize};

/// Lower bound of the inverse time/memory/cost scores
pub const MIN_INVERSE_SCORE: f64 = 0.5;
/// Upper bound of the inverse time/memory/cost scores
pub const MAX_INVERSE_SCORE: f64 = 1.5;

/// @ai:intent One scored dimension of a task result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreComponent {
    /// Measured value in its natural unit (seconds, MB, tokens, 0-10, 0-5)
    pub raw_score: f64,
    pub normalized_score: f64,
    pub weight: f64,
    pub description: String,
}

impl ScoreComponent {
    /// @ai:intent Contribution of this component to the ultimate product
    /// @ai:effects pure
    pub fn weighted(&self) -> f64 {
        self.normalized_score * self.weight
    }
}

/// @ai:intent The five optional score components of a task result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreSet {
    #[serde(default)]
    pub time_score: Option<ScoreComponent>,
    #[serde(default)]
    pub quality_score: Option<ScoreComponent>,
    #[serde(default)]
    pub complexity_score: Option<ScoreComponent>,
    #[serde(default)]
    pub cost_score: Option<ScoreComponent>,
    #[serde(default)]
    pub memory_score: Option<ScoreComponent>,
}

impl ScoreSet {
    /// @ai:intent Present components in a fixed order
    /// @ai:effects pure
    pub fn components(&self) -> impl Iterator<Item = &ScoreComponent> {
        [
            &self.time_score,
            &self.quality_score,
            &self.complexity_score,
            &self.cost_score,
            &self.memory_score,
        ]
        .into_iter()
        .flatten()
    }

    pub fn is_empty(&self) -> bool {
        self.components().next().is_none()
    }

    /// @ai:intent 100 × product of normalized × weight over present components
    /// @ai:post None when no component is present
    /// @ai:effects pure
    pub fn ultimate_score(&self) -> Option<f64> {
        if self.is_empty() {
            return None;
        }

        let product: f64 = self.components().map(ScoreComponent::weighted).product();
        Some(product * 100.0)
    }
}
