//! Offline scoring and personalized calibration.
//!
//! Scores a reference feature table (one row per training window, with
//! `subject_id`, `start_ts`, `end_ts` and `label` alongside the feature
//! columns) with the serving classifier, then summarizes a subject:
//! - rush index: percentage of windows classified as rush
//! - personalized threshold: a per-subject cutoff calibrated from that
//!   subject's own probability distribution
//! - a coarse level with a short feedback sentence
//!
//! Nothing here touches the latest state store.

use serde::Serialize;

use crate::error::CalibrationError;
use crate::inference::InferenceEngine;
use crate::schema::{FeatureSource, TrainingSchema};
use crate::types::RushStatus;

/// How a personalized threshold is derived from a subject's probabilities.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum ThresholdMethod {
    /// The q-th quantile, linearly interpolated between order statistics.
    Quantile { q: f64 },
    /// Mean plus half a population standard deviation.
    MeanStd,
}

impl Default for ThresholdMethod {
    fn default() -> Self {
        Self::Quantile { q: 0.9 }
    }
}

/// Percentage (0–100) of windows classified as rush. Empty input gives 0.
pub fn rush_index(statuses: &[RushStatus]) -> f64 {
    if statuses.is_empty() {
        return 0.0;
    }
    let rush = statuses.iter().filter(|s| **s == RushStatus::Rush).count();
    100.0 * rush as f64 / statuses.len() as f64
}

/// Derive a threshold from a subject's probabilities.
pub fn personalized_threshold(
    probabilities: &[f64],
    method: ThresholdMethod,
) -> Result<f64, CalibrationError> {
    if probabilities.is_empty() {
        return Err(CalibrationError::Empty);
    }
    match method {
        ThresholdMethod::Quantile { q } => quantile(probabilities, q),
        ThresholdMethod::MeanStd => {
            let n = probabilities.len() as f64;
            let mean = probabilities.iter().sum::<f64>() / n;
            let var = probabilities.iter().map(|p| (p - mean) * (p - mean)).sum::<f64>() / n;
            Ok(mean + 0.5 * var.sqrt())
        }
    }
}

fn quantile(values: &[f64], q: f64) -> Result<f64, CalibrationError> {
    if !(0.0..=1.0).contains(&q) {
        return Err(CalibrationError::InvalidQuantile(q));
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let position = q * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;
    Ok(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

/// Coarse summary of how often a subject rushes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RushLevel {
    /// Rush index above 40%.
    Frequent,
    /// Rush index above 20%.
    Occasional,
    Calm,
}

impl RushLevel {
    pub fn from_index(rush_index: f64) -> Self {
        if rush_index > 40.0 {
            Self::Frequent
        } else if rush_index > 20.0 {
            Self::Occasional
        } else {
            Self::Calm
        }
    }

    pub fn feedback(self) -> &'static str {
        match self {
            Self::Frequent => {
                "You rush often. A short break or a steadier pace might help."
            }
            Self::Occasional => "You rush now and then. Try spreading your tasks more evenly.",
            Self::Calm => "Your pace is mostly calm. Well done!",
        }
    }
}

/// One reference-table row after scoring.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredWindow {
    pub subject_id: Option<String>,
    pub start_ts: Option<String>,
    pub end_ts: Option<String>,
    pub label: Option<String>,
    pub p_rush: f64,
    /// Decision under the serving (global) threshold.
    pub status: RushStatus,
}

/// A row of the reference table, read by column name.
struct TableRow<'a> {
    headers: &'a csv::StringRecord,
    record: &'a csv::StringRecord,
}

impl TableRow<'_> {
    fn text(&self, name: &str) -> Option<String> {
        let idx = self.headers.iter().position(|h| h == name)?;
        self.record
            .get(idx)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }
}

impl FeatureSource for TableRow<'_> {
    fn feature(&self, name: &str) -> Option<f64> {
        let idx = self.headers.iter().position(|h| h == name)?;
        self.record.get(idx)?.trim().parse().ok()
    }
}

/// Score every row of a reference feature table.
///
/// Rows go through the same schema alignment as live windows, so missing
/// or non-numeric feature cells become 0.0.
pub fn score_feature_table(
    table: &[u8],
    schema: &TrainingSchema,
    engine: &InferenceEngine,
) -> Result<Vec<ScoredWindow>, CalibrationError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(table);
    let headers = reader.headers()?.clone();

    let mut scored = Vec::new();
    for record in reader.records() {
        let record = record?;
        let row = TableRow {
            headers: &headers,
            record: &record,
        };
        let prediction = engine.predict(&schema.align(&row))?;
        scored.push(ScoredWindow {
            subject_id: row.text("subject_id"),
            start_ts: row.text("start_ts"),
            end_ts: row.text("end_ts"),
            label: row.text("label"),
            p_rush: prediction.probability,
            status: prediction.status,
        });
    }
    Ok(scored)
}

/// Distinct subject ids in first-seen order.
pub fn subjects(rows: &[ScoredWindow]) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for id in rows.iter().filter_map(|r| r.subject_id.as_ref()) {
        if !seen.contains(id) {
            seen.push(id.clone());
        }
    }
    seen
}

/// Calibration report for one subject (or for all rows).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubjectReport {
    pub subject_id: Option<String>,
    pub windows: usize,
    pub global_threshold: f64,
    pub rush_index_global: f64,
    pub threshold_method: ThresholdMethod,
    pub personalized_threshold: f64,
    pub rush_index_personal: f64,
    pub level: RushLevel,
    pub feedback: &'static str,
}

/// Summarize scored rows for one subject, or all rows when `subject` is `None`.
///
/// The level and feedback follow the personalized rush index.
pub fn summarize(
    rows: &[ScoredWindow],
    subject: Option<&str>,
    method: ThresholdMethod,
    global_threshold: f64,
) -> Result<SubjectReport, CalibrationError> {
    let selected: Vec<&ScoredWindow> = rows
        .iter()
        .filter(|r| subject.is_none() || r.subject_id.as_deref() == subject)
        .collect();
    if selected.is_empty() {
        return Err(match subject {
            Some(id) => CalibrationError::UnknownSubject(id.to_string()),
            None => CalibrationError::Empty,
        });
    }

    let probabilities: Vec<f64> = selected.iter().map(|r| r.p_rush).collect();
    let global: Vec<RushStatus> = selected.iter().map(|r| r.status).collect();
    let threshold = personalized_threshold(&probabilities, method)?;
    let personal: Vec<RushStatus> = probabilities
        .iter()
        .map(|p| RushStatus::from_probability(*p, threshold))
        .collect();

    let rush_index_personal = rush_index(&personal);
    let level = RushLevel::from_index(rush_index_personal);

    Ok(SubjectReport {
        subject_id: subject.map(str::to_string),
        windows: selected.len(),
        global_threshold,
        rush_index_global: rush_index(&global),
        threshold_method: method,
        personalized_threshold: threshold,
        rush_index_personal,
        level,
        feedback: level.feedback(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BareModel, LogisticRegression};
    use std::sync::Arc;

    fn scored(subject: &str, p: f64) -> ScoredWindow {
        ScoredWindow {
            subject_id: Some(subject.to_string()),
            start_ts: None,
            end_ts: None,
            label: None,
            p_rush: p,
            status: RushStatus::from_probability(p, 0.5),
        }
    }

    #[test]
    fn test_rush_index() {
        use RushStatus::{Calm, Rush};
        assert_eq!(rush_index(&[]), 0.0);
        assert_eq!(rush_index(&[Rush, Calm, Calm, Calm]), 25.0);
        assert_eq!(rush_index(&[Rush, Rush]), 100.0);
    }

    #[test]
    fn test_quantile_interpolates() {
        let values = [0.4, 0.1, 0.3, 0.2, 0.5];
        let q50 = personalized_threshold(&values, ThresholdMethod::Quantile { q: 0.5 }).unwrap();
        assert!((q50 - 0.3).abs() < 1e-12);
        // position 0.9 * 4 = 3.6 → 0.4 + 0.6 * 0.1
        let q90 = personalized_threshold(&values, ThresholdMethod::Quantile { q: 0.9 }).unwrap();
        assert!((q90 - 0.46).abs() < 1e-12);
        let q0 = personalized_threshold(&values, ThresholdMethod::Quantile { q: 0.0 }).unwrap();
        assert_eq!(q0, 0.1);
    }

    #[test]
    fn test_mean_std_threshold() {
        // mean 0.5, population std 0.2
        let t = personalized_threshold(&[0.3, 0.7], ThresholdMethod::MeanStd).unwrap();
        assert!((t - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_threshold_errors() {
        assert!(matches!(
            personalized_threshold(&[], ThresholdMethod::MeanStd),
            Err(CalibrationError::Empty)
        ));
        assert!(matches!(
            personalized_threshold(&[0.5], ThresholdMethod::Quantile { q: 1.5 }),
            Err(CalibrationError::InvalidQuantile(_))
        ));
    }

    #[test]
    fn test_rush_level_tiers() {
        assert_eq!(RushLevel::from_index(41.0), RushLevel::Frequent);
        assert_eq!(RushLevel::from_index(40.0), RushLevel::Occasional);
        assert_eq!(RushLevel::from_index(20.0), RushLevel::Calm);
    }

    #[test]
    fn test_summarize_single_subject() {
        let rows = vec![
            scored("1600", 0.1),
            scored("1600", 0.2),
            scored("1600", 0.6),
            scored("1600", 0.9),
            scored("1601", 0.95),
        ];
        let report = summarize(&rows, Some("1600"), ThresholdMethod::MeanStd, 0.5).unwrap();

        assert_eq!(report.windows, 4);
        assert_eq!(report.rush_index_global, 50.0);
        assert!(report.personalized_threshold > 0.45);
        // Only 0.9 clears mean + 0.5 std (≈ 0.57)
        assert_eq!(report.rush_index_personal, 25.0);
        assert_eq!(report.level, RushLevel::Occasional);
    }

    #[test]
    fn test_summarize_unknown_subject() {
        let rows = vec![scored("1600", 0.1)];
        let err = summarize(&rows, Some("42"), ThresholdMethod::default(), 0.5).unwrap_err();
        assert!(matches!(err, CalibrationError::UnknownSubject(id) if id == "42"));
    }

    #[test]
    fn test_subjects_first_seen_order() {
        let rows = vec![scored("b", 0.1), scored("a", 0.1), scored("b", 0.2)];
        assert_eq!(subjects(&rows), vec!["b", "a"]);
    }

    #[test]
    fn test_score_feature_table() {
        let schema = TrainingSchema::new(vec!["x_std".into(), "mag_std".into()], 0.5).unwrap();
        let engine = InferenceEngine::new(
            Arc::new(BareModel {
                model: LogisticRegression {
                    coef: vec![1.0, 1.0],
                    intercept: -2.0,
                },
                threshold: None,
            }),
            0.5,
        );
        let table = b"subject_id,start_ts,end_ts,label,x_std,mag_std\n\
                      1600,0,5000,0,0.1,0.2\n\
                      1600,5000,10000,1,2.0,3.0\n\
                      1601,0,5000,1,n/a,4.0\n";

        let rows = score_feature_table(table, &schema, &engine).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].subject_id.as_deref(), Some("1600"));
        assert_eq!(rows[0].status, RushStatus::Calm);
        assert_eq!(rows[1].status, RushStatus::Rush);
        assert_eq!(rows[1].label.as_deref(), Some("1"));
        // Non-numeric x_std is zero-filled: σ(0 + 4 - 2) > 0.5
        assert_eq!(rows[2].status, RushStatus::Rush);
    }
}
