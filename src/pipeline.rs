//! Pipeline orchestration
//!
//! Flows the app runs against the predictor and its daily history:
//! rescoring days after their metrics change, retraining from all scored
//! days, and the coach view (forecast plus nudges). JSON entry points are
//! shared by the FFI layer and the CLI.

use crate::coach::{recommendations, Recommendation};
use crate::config::TrainingConfig;
use crate::error::ScoreError;
use crate::history::{DailyHistory, DailyRecord};
use crate::predictor::ScorePredictor;
use crate::training::FitReport;
use crate::types::RawMetrics;
use chrono::NaiveDate;
use serde::Serialize;

/// Recompute `immune_score` for every record from its current metrics.
///
/// Returns the number of records whose score changed.
pub fn score_history(predictor: &ScorePredictor, history: &mut DailyHistory) -> usize {
    let mut changed = 0;
    for record in history.records_mut() {
        if rescore_record(predictor, record) {
            changed += 1;
        }
    }
    tracing::debug!(records = history.len(), changed, "history rescored");
    changed
}

/// Rescore a single record; returns true when the score changed
pub fn rescore_record(predictor: &ScorePredictor, record: &mut DailyRecord) -> bool {
    let score = predictor.predict(&record.metrics);
    let changed = record.immune_score != Some(score);
    record.immune_score = Some(score);
    changed
}

/// Fit the predictor on every scored record in `history`.
///
/// Returns `Ok(None)` when no record carries a score.
pub fn retrain_from_history(
    predictor: &ScorePredictor,
    history: &DailyHistory,
    config: &TrainingConfig,
) -> Result<Option<FitReport>, ScoreError> {
    let samples = history.training_samples();
    if samples.is_empty() {
        tracing::debug!(records = history.len(), "no scored records to train on");
    }
    predictor.fit_with(&samples, config)
}

/// Expected score if the next day looks like the mean of the last `days`.
///
/// Returns `None` for an empty history or a zero window.
pub fn forecast(predictor: &ScorePredictor, history: &DailyHistory, days: usize) -> Option<u32> {
    history
        .averages(days)
        .map(|averages| predictor.predict(&averages))
}

/// Everything the coach view shows
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoachReport {
    pub window_days: usize,
    /// Per-metric means over the window
    pub averages: Option<RawMetrics>,
    pub forecast: Option<u32>,
    /// Day the recommendations are for (the latest record)
    pub date: Option<NaiveDate>,
    pub recommendations: Vec<Recommendation>,
}

/// Forecast over the last `days` plus nudges for the latest record
pub fn coach_report(predictor: &ScorePredictor, history: &DailyHistory, days: usize) -> CoachReport {
    let latest = history.latest();
    CoachReport {
        window_days: days,
        averages: history.averages(days),
        forecast: forecast(predictor, history, days),
        date: latest.map(|record| record.date),
        recommendations: latest.map(recommendations).unwrap_or_default(),
    }
}

/// Parse records from either a JSON array or newline-delimited JSON
pub fn records_from_json(input: &str) -> Result<DailyHistory, ScoreError> {
    if input.trim_start().starts_with('[') {
        DailyHistory::from_json_array(input)
    } else {
        DailyHistory::from_ndjson(input)
    }
}

/// Score raw metrics given as a JSON object
pub fn predict_json(predictor: &ScorePredictor, metrics_json: &str) -> Result<u32, ScoreError> {
    let metrics: RawMetrics = serde_json::from_str(metrics_json)?;
    Ok(predictor.predict(&metrics))
}

/// Rescore records given as JSON and return them as a JSON array
pub fn score_history_json(
    predictor: &ScorePredictor,
    records_json: &str,
) -> Result<String, ScoreError> {
    let mut history = records_from_json(records_json)?;
    score_history(predictor, &mut history);
    Ok(history.to_json()?)
}

/// Coach report for records given as JSON, serialized as JSON
pub fn coach_json(
    predictor: &ScorePredictor,
    records_json: &str,
    days: usize,
) -> Result<String, ScoreError> {
    let history = records_from_json(records_json)?;
    Ok(serde_json::to_string(&coach_report(predictor, &history, days))?)
}
