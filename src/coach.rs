//! Coaching rules
//!
//! Simple threshold nudges derived from one day's metrics. Each rule fires
//! independently; a day that trips none gets [`Recommendation::KeepRoutine`].

use crate::history::DailyRecord;
use serde::{Deserialize, Serialize};

/// Days averaged for the tomorrow forecast
pub const FORECAST_WINDOW_DAYS: usize = 3;

/// Stress above this level triggers a relaxation nudge
pub const STRESS_ALERT_LEVEL: u32 = 6;

/// Screen time above this (minutes) triggers a screen nudge
pub const SCREEN_ALERT_MINUTES: u32 = 240;

/// Daily step floor
pub const STEPS_FLOOR: u32 = 7_500;

/// Daily active energy floor (kcal)
pub const KCAL_FLOOR: u32 = 400;

/// Smallest extra sleep ever suggested (minutes)
pub const MIN_EXTRA_SLEEP_MINUTES: u32 = 30;

/// Step increase suggested when below the floor
pub const EXTRA_STEPS: u32 = 2_000;

/// One coaching nudge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Recommendation {
    /// Slept less than the day's goal
    MoreSleep { minutes: u32 },
    ReduceStress,
    LimitScreenTime,
    MoreSteps { extra: u32 },
    MoreActivity { target_kcal: u32 },
    /// Nothing to improve
    KeepRoutine,
}

impl Recommendation {
    pub fn message(&self) -> String {
        match self {
            Recommendation::MoreSleep { minutes } => format!(
                "Plan {} more minutes of sleep tonight (earlier bedtime, evening routine).",
                minutes
            ),
            Recommendation::ReduceStress => {
                "Take 10-15 minutes to unwind (breathing exercise, a walk) to lower stress."
                    .to_string()
            }
            Recommendation::LimitScreenTime => {
                "Cut screen time before bed (night mode, a fixed offline hour).".to_string()
            }
            Recommendation::MoreSteps { extra } => {
                format!("Aim for +{} steps (a brisk 20-25 minute walk).", extra)
            }
            Recommendation::MoreActivity { target_kcal } => format!(
                "Add active movement (e.g. a workout) to reach about {} active kcal.",
                target_kcal
            ),
            Recommendation::KeepRoutine => {
                "Keep it up and hold your routines steady.".to_string()
            }
        }
    }
}

/// Nudges for one day, in a stable order
pub fn recommendations(record: &DailyRecord) -> Vec<Recommendation> {
    let m = &record.metrics;
    let mut tips = Vec::new();

    if m.sleep_minutes < record.sleep_goal_minutes {
        let shortfall = record.sleep_goal_minutes - m.sleep_minutes;
        tips.push(Recommendation::MoreSleep {
            minutes: shortfall.max(MIN_EXTRA_SLEEP_MINUTES),
        });
    }
    if m.stress_level > STRESS_ALERT_LEVEL {
        tips.push(Recommendation::ReduceStress);
    }
    if m.screen_minutes > SCREEN_ALERT_MINUTES {
        tips.push(Recommendation::LimitScreenTime);
    }
    if m.steps < STEPS_FLOOR {
        tips.push(Recommendation::MoreSteps { extra: EXTRA_STEPS });
    }
    if m.kcal < KCAL_FLOOR {
        tips.push(Recommendation::MoreActivity {
            target_kcal: KCAL_FLOOR,
        });
    }

    if tips.is_empty() {
        tips.push(Recommendation::KeepRoutine);
    }
    tips
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RawMetrics;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn day(metrics: RawMetrics) -> DailyRecord {
        DailyRecord::new(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(), metrics)
    }

    #[test]
    fn test_good_day_keeps_routine() {
        let record = day(RawMetrics::new(480, 9_000, 500, 3, 120));
        assert_eq!(recommendations(&record), vec![Recommendation::KeepRoutine]);
    }

    #[test]
    fn test_every_rule_fires() {
        let record = day(RawMetrics::new(300, 2_000, 150, 8, 400));
        assert_eq!(
            recommendations(&record),
            vec![
                Recommendation::MoreSleep { minutes: 180 },
                Recommendation::ReduceStress,
                Recommendation::LimitScreenTime,
                Recommendation::MoreSteps { extra: 2_000 },
                Recommendation::MoreActivity { target_kcal: 400 },
            ]
        );
    }

    #[test]
    fn test_thresholds_are_strict() {
        // Exactly at every threshold: nothing fires
        let record = day(RawMetrics::new(480, 7_500, 400, 6, 240));
        assert_eq!(recommendations(&record), vec![Recommendation::KeepRoutine]);
    }

    #[test]
    fn test_small_sleep_shortfall_rounds_up() {
        let record = day(RawMetrics::new(470, 9_000, 500, 3, 120));
        assert_eq!(
            recommendations(&record),
            vec![Recommendation::MoreSleep { minutes: 30 }]
        );

        // Personal goal below the default
        let record = day(RawMetrics::new(400, 9_000, 500, 3, 120)).with_sleep_goal(420);
        assert_eq!(
            recommendations(&record),
            vec![Recommendation::MoreSleep { minutes: 30 }]
        );
        let record = record.with_sleep_goal(360);
        assert_eq!(recommendations(&record), vec![Recommendation::KeepRoutine]);
    }

    #[test]
    fn test_serialized_shape_and_messages() {
        let json = serde_json::to_value(Recommendation::MoreSleep { minutes: 45 }).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "more_sleep", "minutes": 45}));

        let json = serde_json::to_value(Recommendation::ReduceStress).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "reduce_stress"}));

        assert!(Recommendation::MoreSleep { minutes: 45 }.message().contains("45"));
        assert!(Recommendation::MoreSteps { extra: 2_000 }.message().contains("2000"));
    }
}
