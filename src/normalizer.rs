//! Feature normalization
//!
//! This module maps raw daily metrics with heterogeneous units into the
//! common [0, 1] feature space used by the score model.
//! - Sleep against an 8 hour target
//! - Steps and energy against fixed daily references
//! - Stress and screen time inverted (less is better)

use crate::types::{FeatureVector, RawMetrics};

/// Sleep target (minutes)
pub const SLEEP_TARGET_MINUTES: f64 = 8.0 * 60.0;

/// Step count at which the steps feature saturates
pub const STEPS_REFERENCE: f64 = 10_000.0;

/// Active energy (kcal) at which the energy feature saturates
pub const KCAL_REFERENCE: f64 = 1_000.0;

/// Upper bound of the ordinal stress scale
pub const STRESS_SCALE_MAX: f64 = 10.0;

/// Screen time (minutes) at which the screen feature reaches zero
pub const SCREEN_CEILING_MINUTES: f64 = 8.0 * 60.0;

/// Normalizer for converting raw metrics to model features
pub struct Normalizer;

impl Normalizer {
    /// Normalize raw metrics. Pure; each component is clamped to [0, 1].
    pub fn normalize(metrics: &RawMetrics) -> FeatureVector {
        FeatureVector::from_components([
            normalize_sleep(metrics.sleep_minutes),
            normalize_steps(metrics.steps),
            normalize_energy(metrics.kcal),
            normalize_stress(metrics.stress_level),
            normalize_screen(metrics.screen_minutes),
        ])
    }
}

fn normalize_sleep(minutes: u32) -> f64 {
    (f64::from(minutes) / SLEEP_TARGET_MINUTES).min(1.0)
}

fn normalize_steps(steps: u32) -> f64 {
    (f64::from(steps) / STEPS_REFERENCE).min(1.0)
}

fn normalize_energy(kcal: u32) -> f64 {
    (f64::from(kcal) / KCAL_REFERENCE).min(1.0)
}

/// Lower stress maps closer to 1.0
fn normalize_stress(level: u32) -> f64 {
    ((STRESS_SCALE_MAX - f64::from(level)) / STRESS_SCALE_MAX).clamp(0.0, 1.0)
}

/// 1.0 at no screen time, 0.0 at or beyond the ceiling
fn normalize_screen(minutes: u32) -> f64 {
    ((SCREEN_CEILING_MINUTES - f64::from(minutes)) / SCREEN_CEILING_MINUTES).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_best_case_saturates() {
        let features = Normalizer::normalize(&RawMetrics::new(480, 10_000, 1_000, 0, 0));
        assert_eq!(features.as_array(), &[1.0; 5]);
    }

    #[test]
    fn test_worst_case_is_zero() {
        let features = Normalizer::normalize(&RawMetrics::new(0, 0, 0, 10, 720));
        assert_eq!(features.as_array(), &[0.0; 5]);
    }

    #[test]
    fn test_partial_values() {
        let features = Normalizer::normalize(&RawMetrics::new(420, 8_500, 450, 3, 120));

        // 7h of 8h
        assert!((features.sleep() - 0.875).abs() < 1e-9);
        assert!((features.steps() - 0.85).abs() < 1e-9);
        assert!((features.energy() - 0.45).abs() < 1e-9);
        assert!((features.stress() - 0.7).abs() < 1e-9);
        // 2h of an 8h ceiling
        assert!((features.screen() - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_caps_above_references() {
        let features = Normalizer::normalize(&RawMetrics::new(720, 25_000, 3_000, 0, 0));
        assert_eq!(features.sleep(), 1.0);
        assert_eq!(features.steps(), 1.0);
        assert_eq!(features.energy(), 1.0);
    }

    #[test]
    fn test_out_of_scale_stress_clamps_to_zero() {
        let features = Normalizer::normalize(&RawMetrics::new(0, 0, 0, 15, 0));
        assert_eq!(features.stress(), 0.0);
    }

    #[test]
    fn test_components_stay_in_unit_interval() {
        let inputs = [0u32, 1, 59, 240, 479, 480, 481, 1_440, 9_999, 10_001, u32::MAX];
        for &v in &inputs {
            let metrics = RawMetrics::new(v, v, v, v % 20, v);
            let features = Normalizer::normalize(&metrics);
            for &c in features.as_array() {
                assert!((0.0..=1.0).contains(&c), "component {c} out of range for {v}");
            }
        }
    }
}
