//! Core types for the ImmuneScore engine
//!
//! This module defines the data structures that flow through scoring and
//! training: raw daily metrics, the normalized feature vector, and training
//! samples.

use serde::{Deserialize, Serialize};

/// Number of features consumed by the linear model
pub const FEATURE_COUNT: usize = 5;

/// Raw daily wellness metrics as recorded by the app.
///
/// All values are unsigned, so negative durations or counts cannot reach the
/// normalizer. Fields missing from JSON default to zero, matching a freshly
/// created daily entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMetrics {
    /// Minutes asleep
    #[serde(default)]
    pub sleep_minutes: u32,
    /// Step count
    #[serde(default)]
    pub steps: u32,
    /// Active energy burned (kilocalories)
    #[serde(default)]
    pub kcal: u32,
    /// Self-reported stress, ordinal 0-10
    #[serde(default)]
    pub stress_level: u32,
    /// Screen time (minutes)
    #[serde(default)]
    pub screen_minutes: u32,
}

impl RawMetrics {
    pub fn new(
        sleep_minutes: u32,
        steps: u32,
        kcal: u32,
        stress_level: u32,
        screen_minutes: u32,
    ) -> Self {
        Self {
            sleep_minutes,
            steps,
            kcal,
            stress_level,
            screen_minutes,
        }
    }
}

/// Normalized model input. Every component lies in [0, 1].
///
/// Component order is fixed and matches the weight order of
/// [`ModelParameters`](crate::model::ModelParameters).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector([f64; FEATURE_COUNT]);

impl FeatureVector {
    /// Build from components in feature order, clamping each to [0, 1].
    pub fn from_components(components: [f64; FEATURE_COUNT]) -> Self {
        Self(components.map(|c| c.clamp(0.0, 1.0)))
    }

    pub fn sleep(&self) -> f64 {
        self.0[0]
    }

    pub fn steps(&self) -> f64 {
        self.0[1]
    }

    pub fn energy(&self) -> f64 {
        self.0[2]
    }

    pub fn stress(&self) -> f64 {
        self.0[3]
    }

    pub fn screen(&self) -> f64 {
        self.0[4]
    }

    pub fn as_array(&self) -> &[f64; FEATURE_COUNT] {
        &self.0
    }
}

/// One labelled observation used by `fit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingSample {
    #[serde(flatten)]
    pub metrics: RawMetrics,
    /// Observed or manually entered score (1-100) to fit toward
    pub target_score: u32,
}

impl TrainingSample {
    pub fn new(metrics: RawMetrics, target_score: u32) -> Self {
        Self {
            metrics,
            target_score,
        }
    }

    /// Target mapped into model output space
    pub fn target(&self) -> f64 {
        f64::from(self.target_score) / 100.0
    }
}

/// Observable lifecycle of the model parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelState {
    /// Never fit, or explicitly reset
    Default,
    /// Fit at least once since the last reset
    Trained,
}

impl ModelState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelState::Default => "default",
            ModelState::Trained => "trained",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_vector_clamps_components() {
        let features = FeatureVector::from_components([1.5, -0.2, 0.3, 0.0, 1.0]);
        assert_eq!(features.as_array(), &[1.0, 0.0, 0.3, 0.0, 1.0]);
        assert_eq!(features.sleep(), 1.0);
        assert_eq!(features.steps(), 0.0);
        assert_eq!(features.energy(), 0.3);
    }

    #[test]
    fn test_raw_metrics_missing_fields_default_to_zero() {
        let metrics: RawMetrics = serde_json::from_str(r#"{"sleep_minutes": 420}"#).unwrap();
        assert_eq!(metrics, RawMetrics::new(420, 0, 0, 0, 0));
    }

    #[test]
    fn test_raw_metrics_reject_negative_values() {
        let result = serde_json::from_str::<RawMetrics>(r#"{"sleep_minutes": -30}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_training_sample_flattened_json() {
        let sample: TrainingSample = serde_json::from_str(
            r#"{"sleep_minutes": 480, "steps": 10000, "kcal": 1000,
                "stress_level": 0, "screen_minutes": 0, "target_score": 90}"#,
        )
        .unwrap();
        assert_eq!(sample.metrics.steps, 10000);
        assert!((sample.target() - 0.9).abs() < 1e-12);
    }
}
