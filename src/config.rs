//! Training configuration
//!
//! Loaded from JSON (FFI, CLI) with optional environment overrides.

use crate::error::ScoreError;
use serde::{Deserialize, Serialize};

/// Default number of passes over the samples
pub const DEFAULT_EPOCHS: usize = 200;

/// Default SGD step size
pub const DEFAULT_LEARNING_RATE: f64 = 0.01;

/// Epochs used when retraining from the full daily history
pub const HISTORY_RETRAIN_EPOCHS: usize = 250;

pub const ENV_EPOCHS: &str = "IMMUNE_SCORE_EPOCHS";
pub const ENV_LEARNING_RATE: &str = "IMMUNE_SCORE_LEARNING_RATE";
pub const ENV_SEED: &str = "IMMUNE_SCORE_SEED";

/// Order in which samples are visited within an epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleOrder {
    /// Fresh OS-seeded permutation every epoch
    #[default]
    Shuffled,
    /// Fresh permutation every epoch from a fixed seed (reproducible)
    Seeded(u64),
    /// Input order, every epoch
    Fixed,
}

/// Parameters for a single `fit` call
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub epochs: usize,
    pub learning_rate: f64,
    pub order: SampleOrder,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: DEFAULT_EPOCHS,
            learning_rate: DEFAULT_LEARNING_RATE,
            order: SampleOrder::Shuffled,
        }
    }
}

impl TrainingConfig {
    /// Preset used by the "retrain from my data" action
    pub fn history_retrain() -> Self {
        Self {
            epochs: HISTORY_RETRAIN_EPOCHS,
            ..Self::default()
        }
    }

    pub fn with_epochs(mut self, epochs: usize) -> Self {
        self.epochs = epochs;
        self
    }

    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    pub fn with_order(mut self, order: SampleOrder) -> Self {
        self.order = order;
        self
    }

    /// Parse from JSON; absent fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, ScoreError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `IMMUNE_SCORE_*` environment overrides
    pub fn with_env_overrides(self) -> Result<Self, ScoreError> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Result<Self, ScoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_EPOCHS) {
            self.epochs = raw
                .trim()
                .parse()
                .map_err(|_| ScoreError::InvalidConfig(format!("{ENV_EPOCHS}={raw}")))?;
        }
        if let Some(raw) = lookup(ENV_LEARNING_RATE) {
            self.learning_rate = raw
                .trim()
                .parse()
                .map_err(|_| ScoreError::InvalidConfig(format!("{ENV_LEARNING_RATE}={raw}")))?;
        }
        if let Some(raw) = lookup(ENV_SEED) {
            let seed = raw
                .trim()
                .parse()
                .map_err(|_| ScoreError::InvalidConfig(format!("{ENV_SEED}={raw}")))?;
            self.order = SampleOrder::Seeded(seed);
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ScoreError> {
        if self.epochs == 0 {
            return Err(ScoreError::InvalidConfig(
                "epochs must be at least 1".to_string(),
            ));
        }
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(ScoreError::InvalidConfig(format!(
                "learning_rate must be positive and finite, got {}",
                self.learning_rate
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = TrainingConfig::default();
        assert_eq!(config.epochs, 200);
        assert_eq!(config.learning_rate, 0.01);
        assert_eq!(config.order, SampleOrder::Shuffled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_history_retrain_preset() {
        let config = TrainingConfig::history_retrain();
        assert_eq!(config.epochs, 250);
        assert_eq!(config.learning_rate, DEFAULT_LEARNING_RATE);
    }

    #[test]
    fn test_from_json_partial() {
        let config = TrainingConfig::from_json(r#"{"epochs": 50, "order": {"seeded": 7}}"#).unwrap();
        assert_eq!(
            config,
            TrainingConfig {
                epochs: 50,
                learning_rate: DEFAULT_LEARNING_RATE,
                order: SampleOrder::Seeded(7),
            }
        );

        let config = TrainingConfig::from_json(r#"{"order": "fixed"}"#).unwrap();
        assert_eq!(config.order, SampleOrder::Fixed);
    }

    #[test]
    fn test_from_json_rejects_invalid() {
        assert!(TrainingConfig::from_json(r#"{"epochs": 0}"#).is_err());
        assert!(TrainingConfig::from_json(r#"{"learning_rate": -0.1}"#).is_err());
        assert!(TrainingConfig::from_json("not json").is_err());
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            (ENV_EPOCHS, "12"),
            (ENV_LEARNING_RATE, "0.05"),
            (ENV_SEED, "99"),
        ]
        .into_iter()
        .collect();

        let config = TrainingConfig::default()
            .with_overrides_from(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.epochs, 12);
        assert_eq!(config.learning_rate, 0.05);
        assert_eq!(config.order, SampleOrder::Seeded(99));
    }

    #[test]
    fn test_overrides_reject_garbage() {
        let result = TrainingConfig::default().with_overrides_from(|k| {
            (k == ENV_EPOCHS).then(|| "many".to_string())
        });
        assert!(matches!(result, Err(ScoreError::InvalidConfig(_))));
    }
}
