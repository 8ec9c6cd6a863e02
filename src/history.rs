//! Daily history
//!
//! Date-keyed daily records as handed over by the app's data store. The
//! history feeds training (records with a score become samples), dashboard
//! averages, and rescoring.

use crate::error::ScoreError;
use crate::types::{RawMetrics, TrainingSample};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Date key format (`YYYY-MM-DD`)
pub const DATE_KEY_FORMAT: &str = "%Y-%m-%d";

/// Sleep goal for records that do not carry one (8 h)
pub const DEFAULT_SLEEP_GOAL_MINUTES: u32 = 8 * 60;

fn default_sleep_goal() -> u32 {
    DEFAULT_SLEEP_GOAL_MINUTES
}

/// One calendar day of wellness metrics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyRecord {
    pub date: NaiveDate,
    #[serde(flatten)]
    pub metrics: RawMetrics,
    /// Personal sleep target for the day, used by coaching only
    #[serde(default = "default_sleep_goal")]
    pub sleep_goal_minutes: u32,
    /// Computed or manually entered score (1-100), if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub immune_score: Option<u32>,
}

impl DailyRecord {
    pub fn new(date: NaiveDate, metrics: RawMetrics) -> Self {
        Self {
            date,
            metrics,
            sleep_goal_minutes: DEFAULT_SLEEP_GOAL_MINUTES,
            immune_score: None,
        }
    }

    pub fn with_score(mut self, score: u32) -> Self {
        self.immune_score = Some(score);
        self
    }

    pub fn with_sleep_goal(mut self, minutes: u32) -> Self {
        self.sleep_goal_minutes = minutes;
        self
    }

    /// Unique key for this record's day
    pub fn date_key(&self) -> String {
        self.date.format(DATE_KEY_FORMAT).to_string()
    }

    /// Training sample, when the record carries a score
    pub fn training_sample(&self) -> Option<TrainingSample> {
        self.immune_score
            .map(|score| TrainingSample::new(self.metrics, score))
    }
}

/// Daily records ordered by date, at most one per day
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DailyHistory {
    records: Vec<DailyRecord>,
}

impl DailyHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records<I: IntoIterator<Item = DailyRecord>>(records: I) -> Self {
        let mut history = Self::new();
        for record in records {
            history.upsert(record);
        }
        history
    }

    /// Insert a record, replacing any existing record for the same day
    pub fn upsert(&mut self, record: DailyRecord) {
        match self.records.binary_search_by_key(&record.date, |r| r.date) {
            Ok(i) => self.records[i] = record,
            Err(i) => self.records.insert(i, record),
        }
    }

    pub fn get(&self, date: NaiveDate) -> Option<&DailyRecord> {
        self.records
            .binary_search_by_key(&date, |r| r.date)
            .ok()
            .map(|i| &self.records[i])
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All records, oldest first
    pub fn records(&self) -> &[DailyRecord] {
        &self.records
    }

    pub fn records_mut(&mut self) -> impl Iterator<Item = &mut DailyRecord> {
        self.records.iter_mut()
    }

    /// Most recent record, if any
    pub fn latest(&self) -> Option<&DailyRecord> {
        self.records.last()
    }

    /// The most recent `days` records, oldest first
    pub fn recent(&self, days: usize) -> &[DailyRecord] {
        let start = self.records.len().saturating_sub(days);
        &self.records[start..]
    }

    /// Per-metric integer mean over the most recent `days` records
    pub fn averages(&self, days: usize) -> Option<RawMetrics> {
        let window = self.recent(days);
        if window.is_empty() {
            return None;
        }
        Some(RawMetrics {
            sleep_minutes: mean_of(window, |m| m.sleep_minutes),
            steps: mean_of(window, |m| m.steps),
            kcal: mean_of(window, |m| m.kcal),
            stress_level: mean_of(window, |m| m.stress_level),
            screen_minutes: mean_of(window, |m| m.screen_minutes),
        })
    }

    /// Samples for every record that carries a score
    pub fn training_samples(&self) -> Vec<TrainingSample> {
        self.records
            .iter()
            .filter_map(DailyRecord::training_sample)
            .collect()
    }

    /// Parse newline-delimited JSON records (blank lines ignored)
    pub fn from_ndjson(input: &str) -> Result<Self, ScoreError> {
        let mut records = Vec::new();
        for (line_no, line) in input.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let record: DailyRecord = serde_json::from_str(trimmed).map_err(|e| {
                ScoreError::InvalidRecord(format!("line {}: {}", line_no + 1, e))
            })?;
            records.push(record);
        }
        Ok(Self::from_records(records))
    }

    /// Parse a JSON array of records
    pub fn from_json_array(input: &str) -> Result<Self, ScoreError> {
        let records: Vec<DailyRecord> = serde_json::from_str(input)
            .map_err(|e| ScoreError::InvalidRecord(e.to_string()))?;
        Ok(Self::from_records(records))
    }

    /// Serialize as a JSON array
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize as newline-delimited JSON
    pub fn to_ndjson(&self) -> Result<String, serde_json::Error> {
        let mut out = String::new();
        for record in &self.records {
            out.push_str(&serde_json::to_string(record)?);
            out.push('\n');
        }
        Ok(out)
    }
}

/// Truncating mean of one metric over a non-empty window
fn mean_of(window: &[DailyRecord], metric: impl Fn(&RawMetrics) -> u32) -> u32 {
    let total: u64 = window.iter().map(|r| u64::from(metric(&r.metrics))).sum();
    // Mean of u32 values always fits in u32
    (total / window.len() as u64) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn record(d: u32, sleep: u32, steps: u32, score: Option<u32>) -> DailyRecord {
        DailyRecord {
            date: day(d),
            metrics: RawMetrics::new(sleep, steps, 400, 4, 180),
            sleep_goal_minutes: DEFAULT_SLEEP_GOAL_MINUTES,
            immune_score: score,
        }
    }

    #[test]
    fn test_upsert_orders_and_replaces() {
        let mut history = DailyHistory::new();
        history.upsert(record(3, 400, 1, None));
        history.upsert(record(1, 410, 2, None));
        history.upsert(record(2, 420, 3, None));
        history.upsert(record(1, 430, 4, Some(60)));

        let dates: Vec<_> = history.records().iter().map(|r| r.date).collect();
        assert_eq!(dates, vec![day(1), day(2), day(3)]);
        assert_eq!(history.len(), 3);
        assert_eq!(history.get(day(1)).unwrap().metrics.sleep_minutes, 430);
        assert_eq!(history.get(day(1)).unwrap().immune_score, Some(60));
        assert!(history.get(day(9)).is_none());
    }

    #[test]
    fn test_date_key() {
        assert_eq!(record(5, 0, 0, None).date_key(), "2024-01-05");
    }

    #[test]
    fn test_recent_and_averages() {
        let history = DailyHistory::from_records([
            record(1, 300, 1_000, None),
            record(2, 400, 2_000, None),
            record(3, 450, 3_001, None),
            record(4, 500, 4_000, None),
        ]);

        assert_eq!(history.recent(2).len(), 2);
        assert_eq!(history.recent(2)[0].date, day(3));
        assert_eq!(history.recent(10).len(), 4);
        assert_eq!(history.latest().unwrap().date, day(4));
        assert!(DailyHistory::new().latest().is_none());

        let avg = history.averages(3).unwrap();
        // (400 + 450 + 500) / 3 = 450, (2000 + 3001 + 4000) / 3 = 3000 (truncated)
        assert_eq!(avg.sleep_minutes, 450);
        assert_eq!(avg.steps, 3_000);
        assert_eq!(avg.kcal, 400);

        assert!(DailyHistory::new().averages(3).is_none());
        assert!(history.averages(0).is_none());
    }

    #[test]
    fn test_training_samples_skip_unscored() {
        let history = DailyHistory::from_records([
            record(1, 300, 1_000, Some(40)),
            record(2, 400, 2_000, None),
            record(3, 450, 3_000, Some(75)),
        ]);

        let samples = history.training_samples();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].target_score, 40);
        assert_eq!(samples[1].metrics.steps, 3_000);

        let scored = DailyRecord::new(day(9), RawMetrics::new(480, 0, 0, 0, 0)).with_score(55);
        assert_eq!(scored.training_sample().unwrap().target_score, 55);
    }

    #[test]
    fn test_ndjson_parsing() {
        let input = r#"
{"date": "2024-01-02", "sleep_minutes": 420, "steps": 8000, "kcal": 500, "stress_level": 3, "screen_minutes": 90, "sleep_goal_minutes": 450, "immune_score": 71}

{"date": "2024-01-01", "sleep_minutes": 360}
"#;
        let history = DailyHistory::from_ndjson(input).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history.records()[0].date, day(1));
        assert_eq!(history.records()[0].metrics.steps, 0);
        assert_eq!(history.records()[0].sleep_goal_minutes, 480);
        assert_eq!(history.records()[1].immune_score, Some(71));
        assert_eq!(history.records()[1].sleep_goal_minutes, 450);
    }

    #[test]
    fn test_ndjson_reports_line() {
        let input = "{\"date\": \"2024-01-01\"}\n{\"date\": \"not-a-date\"}\n";
        match DailyHistory::from_ndjson(input) {
            Err(ScoreError::InvalidRecord(msg)) => assert!(msg.starts_with("line 2")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_json_round_trip() {
        let history = DailyHistory::from_records([
            record(1, 300, 1_000, Some(40)),
            record(2, 400, 2_000, None),
        ]);

        let json = history.to_json().unwrap();
        assert_eq!(DailyHistory::from_json_array(&json).unwrap(), history);

        let ndjson = history.to_ndjson().unwrap();
        assert_eq!(ndjson.lines().count(), 2);
        assert!(!ndjson.lines().nth(1).unwrap().contains("immune_score"));
    }
}
