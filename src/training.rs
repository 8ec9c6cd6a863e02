//! Online SGD training
//!
//! Squared-error gradient descent over the clamped linear model. Updates are
//! applied per sample. The gradient ignores the derivative of the output
//! clamp, so weights keep moving while the output is saturated.

use crate::config::{SampleOrder, TrainingConfig};
use crate::model::ModelParameters;
use crate::normalizer::Normalizer;
use crate::types::{FeatureVector, TrainingSample};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// Summary of one `fit` call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitReport {
    pub samples: usize,
    pub epochs: usize,
    pub learning_rate: f64,
    /// Mean squared error (output space) before the first epoch
    pub initial_loss: f64,
    /// Mean squared error after each epoch
    pub epoch_losses: Vec<f64>,
}

impl FitReport {
    pub fn final_loss(&self) -> f64 {
        self.epoch_losses
            .last()
            .copied()
            .unwrap_or(self.initial_loss)
    }
}

/// Sample visiting order for one training run
enum Visitor {
    Fixed,
    Shuffled(StdRng),
}

impl Visitor {
    fn new(order: SampleOrder) -> Self {
        match order {
            SampleOrder::Fixed => Visitor::Fixed,
            SampleOrder::Seeded(seed) => Visitor::Shuffled(StdRng::seed_from_u64(seed)),
            SampleOrder::Shuffled => Visitor::Shuffled(StdRng::from_os_rng()),
        }
    }

    /// Reorder `indices` for the next epoch
    fn next_epoch(&mut self, indices: &mut [usize]) {
        if let Visitor::Shuffled(rng) = self {
            indices.shuffle(rng);
        }
    }
}

/// Train starting from `initial` and return the updated parameters.
///
/// `samples` must be non-empty; the caller handles the empty no-op.
pub fn train(
    initial: ModelParameters,
    samples: &[TrainingSample],
    config: &TrainingConfig,
) -> (ModelParameters, FitReport) {
    let prepared: Vec<(FeatureVector, f64)> = samples
        .iter()
        .map(|s| (Normalizer::normalize(&s.metrics), s.target()))
        .collect();

    let mut params = initial;
    let mut visitor = Visitor::new(config.order);
    let mut indices: Vec<usize> = (0..prepared.len()).collect();
    let initial_loss = mean_squared_error(&params, &prepared);
    let mut epoch_losses = Vec::with_capacity(config.epochs);

    for _ in 0..config.epochs {
        visitor.next_epoch(&mut indices);
        for &i in &indices {
            let (features, target) = &prepared[i];
            step(&mut params, features, *target, config.learning_rate);
        }
        epoch_losses.push(mean_squared_error(&params, &prepared));
    }

    let report = FitReport {
        samples: prepared.len(),
        epochs: config.epochs,
        learning_rate: config.learning_rate,
        initial_loss,
        epoch_losses,
    };
    (params, report)
}

/// One SGD update. dL/dw = 2·err·x, dL/db = 2·err
fn step(params: &mut ModelParameters, features: &FeatureVector, target: f64, learning_rate: f64) {
    let err = params.output(features) - target;
    for (w, x) in params.weights.iter_mut().zip(features.as_array()) {
        *w -= learning_rate * 2.0 * err * x;
    }
    params.bias -= learning_rate * 2.0 * err;
}

fn mean_squared_error(params: &ModelParameters, prepared: &[(FeatureVector, f64)]) -> f64 {
    if prepared.is_empty() {
        return 0.0;
    }
    let total: f64 = prepared
        .iter()
        .map(|(features, target)| (params.output(features) - target).powi(2))
        .sum();
    total / prepared.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RawMetrics;
    use pretty_assertions::assert_eq;

    fn best_day(target: u32) -> TrainingSample {
        TrainingSample::new(RawMetrics::new(480, 10_000, 1_000, 0, 0), target)
    }

    fn varied_samples() -> Vec<TrainingSample> {
        vec![
            TrainingSample::new(RawMetrics::new(420, 8_000, 600, 3, 120), 72),
            TrainingSample::new(RawMetrics::new(300, 2_000, 200, 8, 400), 30),
            TrainingSample::new(RawMetrics::new(480, 12_000, 900, 2, 60), 88),
            TrainingSample::new(RawMetrics::new(360, 5_000, 400, 5, 240), 50),
        ]
    }

    #[test]
    fn test_single_update_matches_rule() {
        // Zero weights: yhat = 0, target 1, err = -1 → each weight += 0.02
        let initial = ModelParameters {
            weights: [0.0; 5],
            bias: 0.0,
        };
        let config = TrainingConfig::default()
            .with_epochs(1)
            .with_order(SampleOrder::Fixed);

        let (params, report) = train(initial, &[best_day(100)], &config);

        for w in params.weights {
            assert!((w - 0.02).abs() < 1e-12);
        }
        assert!((params.bias - 0.02).abs() < 1e-12);
        assert_eq!(report.samples, 1);
        assert_eq!(report.epochs, 1);
        assert!((report.initial_loss - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_gradient_flows_while_saturated() {
        // Output saturates at 1.0 while the target is 0.5: the clamp derivative
        // would be zero, but the update still applies.
        let initial = ModelParameters {
            weights: [0.5; 5],
            bias: 0.0,
        };
        let config = TrainingConfig::default()
            .with_epochs(1)
            .with_order(SampleOrder::Fixed);

        let (params, _) = train(initial, &[best_day(50)], &config);

        // err = 1.0 - 0.5 = 0.5 → w -= 0.01 * 2 * 0.5 * 1.0
        for w in params.weights {
            assert!((w - 0.49).abs() < 1e-12);
        }
        assert!((params.bias + 0.01).abs() < 1e-12);
    }

    #[test]
    fn test_converges_toward_target() {
        let config = TrainingConfig::default().with_order(SampleOrder::Fixed);
        let (params, report) = train(ModelParameters::default(), &[best_day(60)], &config);

        let features = Normalizer::normalize(&best_day(60).metrics);
        assert_eq!(params.score(&features), 60);
        assert!(report.final_loss() < 1e-6);

        for pair in report.epoch_losses.windows(2) {
            assert!(pair[1] <= pair[0] + 1e-15);
        }
    }

    #[test]
    fn test_seeded_order_is_reproducible() {
        let config = TrainingConfig::default()
            .with_epochs(30)
            .with_order(SampleOrder::Seeded(42));
        let samples = varied_samples();

        let (a, report_a) = train(ModelParameters::default(), &samples, &config);
        let (b, report_b) = train(ModelParameters::default(), &samples, &config);

        assert_eq!(a, b);
        assert_eq!(report_a, report_b);
    }

    #[test]
    fn test_fixed_order_is_reproducible() {
        let config = TrainingConfig::default()
            .with_epochs(30)
            .with_order(SampleOrder::Fixed);
        let samples = varied_samples();

        let (a, _) = train(ModelParameters::default(), &samples, &config);
        let (b, _) = train(ModelParameters::default(), &samples, &config);
        assert_eq!(a, b);
    }

    #[test]
    fn test_loss_decreases_on_varied_data() {
        let config = TrainingConfig::default().with_order(SampleOrder::Seeded(7));
        let (_, report) = train(ModelParameters::default(), &varied_samples(), &config);
        assert!(report.final_loss() < report.initial_loss);
    }

    #[test]
    fn test_shuffled_order_trains() {
        let config = TrainingConfig::default().with_epochs(50);
        let (params, report) = train(ModelParameters::default(), &varied_samples(), &config);
        assert_eq!(report.epoch_losses.len(), 50);
        assert!(params.weights.iter().all(|w| w.is_finite()));
        assert!(params.bias.is_finite());
    }
}
