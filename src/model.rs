//! Linear score model
//!
//! Five weights (one per feature) plus a bias. The model output is the dot
//! product plus bias, clamped to [0, 1] and mapped to an integer score.

use crate::types::{FeatureVector, FEATURE_COUNT};
use serde::{Deserialize, Serialize};

/// Initial weight for every feature (equal-weight baseline)
pub const DEFAULT_WEIGHT: f64 = 0.2;

/// Initial bias
pub const DEFAULT_BIAS: f64 = 0.0;

/// Lowest score ever reported
pub const MIN_SCORE: u32 = 1;

/// Highest score ever reported
pub const MAX_SCORE: u32 = 100;

/// Model parameters. The weight count is fixed by the type.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelParameters {
    pub weights: [f64; FEATURE_COUNT],
    pub bias: f64,
}

impl Default for ModelParameters {
    fn default() -> Self {
        Self {
            weights: [DEFAULT_WEIGHT; FEATURE_COUNT],
            bias: DEFAULT_BIAS,
        }
    }
}

impl ModelParameters {
    /// Rebuild parameters from stored values.
    ///
    /// Returns `None` when the weight list is missing or does not hold exactly
    /// one weight per feature; callers fall back to the defaults. A missing
    /// bias alongside valid weights is read as the default bias.
    pub fn from_stored(weights: Option<&[f64]>, bias: Option<f64>) -> Option<Self> {
        let weights: [f64; FEATURE_COUNT] = weights?.try_into().ok()?;
        Some(Self {
            weights,
            bias: bias.unwrap_or(DEFAULT_BIAS),
        })
    }

    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }

    /// `w · x + b`, unclamped
    pub fn linear(&self, features: &FeatureVector) -> f64 {
        self.weights
            .iter()
            .zip(features.as_array())
            .map(|(w, x)| w * x)
            .sum::<f64>()
            + self.bias
    }

    /// Model output in [0, 1]
    pub fn output(&self, features: &FeatureVector) -> f64 {
        self.linear(features).clamp(0.0, 1.0)
    }

    /// Integer score in [MIN_SCORE, MAX_SCORE]. Never 0.
    pub fn score(&self, features: &FeatureVector) -> u32 {
        output_to_score(self.output(features))
    }
}

/// Map a [0, 1] output to an integer score, rounding half away from zero
pub fn output_to_score(output: f64) -> u32 {
    let scaled = (output.clamp(0.0, 1.0) * 100.0).round() as u32;
    scaled.clamp(MIN_SCORE, MAX_SCORE)
}
