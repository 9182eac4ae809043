//! Training schema and feature alignment.
//!
//! The classifier was fit against a fixed, ordered list of feature columns.
//! Every extracted feature set is reconciled against that list before it
//! reaches the model:
//! - names in the schema but absent from the features become 0.0
//! - names present in the features but absent from the schema are dropped
//! - non-finite values become 0.0
//! - the output order is the schema order
//!
//! Alignment never fails. That keeps the serving path up under feature
//! drift, at the cost of masking extraction bugs; callers that want
//! strictness should check `missing_features` first.

use std::collections::{BTreeMap, HashMap};
use std::hash::BuildHasher;
use std::path::Path;

use tracing::debug;

use crate::error::SchemaLoadError;
use crate::types::{AlignedVector, FeatureVector, FEATURE_NAMES};

/// Columns of the reference feature table that are not model inputs.
pub const NON_FEATURE_COLUMNS: [&str; 4] = ["label", "subject_id", "start_ts", "end_ts"];

/// Default decision threshold when neither config nor artifact sets one.
pub const DEFAULT_THRESHOLD: f64 = 0.5;

/// Anything that can answer "what is the value of feature `name`?".
pub trait FeatureSource {
    /// The value of a feature, or `None` if absent or not numeric.
    fn feature(&self, name: &str) -> Option<f64>;
}

impl FeatureSource for FeatureVector {
    fn feature(&self, name: &str) -> Option<f64> {
        self.get(name)
    }
}

impl<S: BuildHasher> FeatureSource for HashMap<String, f64, S> {
    fn feature(&self, name: &str) -> Option<f64> {
        self.get(name).copied()
    }
}

impl FeatureSource for BTreeMap<String, f64> {
    fn feature(&self, name: &str) -> Option<f64> {
        self.get(name).copied()
    }
}

/// Ordered feature columns plus the decision threshold.
///
/// Loaded once at startup and shared read-only afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSchema {
    columns: Vec<String>,
    threshold: f64,
}

impl TrainingSchema {
    /// Build a schema from explicit columns.
    ///
    /// Columns must be non-empty and unique; the threshold must be in [0, 1].
    pub fn new(columns: Vec<String>, threshold: f64) -> Result<Self, SchemaLoadError> {
        if columns.is_empty() {
            return Err(SchemaLoadError::NoFeatureColumns);
        }
        for (i, column) in columns.iter().enumerate() {
            if columns[..i].contains(column) {
                return Err(SchemaLoadError::DuplicateColumn(column.clone()));
            }
        }
        validate_threshold(threshold)?;
        Ok(Self { columns, threshold })
    }

    /// The extractor's own 18 names in canonical order, threshold 0.5.
    pub fn canonical() -> Self {
        Self {
            columns: FEATURE_NAMES.iter().map(|n| (*n).to_string()).collect(),
            threshold: DEFAULT_THRESHOLD,
        }
    }

    /// Derive the schema from a reference table's header row.
    ///
    /// Label, subject and window-boundary columns are excluded.
    pub fn from_reference_header<I, S>(headers: I, threshold: f64) -> Result<Self, SchemaLoadError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let columns = headers
            .into_iter()
            .map(|h| h.as_ref().trim().to_string())
            .filter(|h| !h.is_empty() && !NON_FEATURE_COLUMNS.contains(&h.as_str()))
            .collect();
        Self::new(columns, threshold)
    }

    /// Read only the header row of a reference CSV feature table.
    pub fn from_reference_table(path: &Path, threshold: f64) -> Result<Self, SchemaLoadError> {
        let read_err = |source| SchemaLoadError::Read {
            path: path.to_path_buf(),
            source,
        };
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(path)
            .map_err(read_err)?;
        let headers = reader.headers().map_err(read_err)?.clone();
        Self::from_reference_header(headers.iter(), threshold)
    }

    /// Same columns, different threshold.
    pub fn with_threshold(mut self, threshold: f64) -> Result<Self, SchemaLoadError> {
        validate_threshold(threshold)?;
        self.threshold = threshold;
        Ok(self)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Schema columns the source cannot supply as a finite number.
    pub fn missing_features(&self, source: &impl FeatureSource) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| !source.feature(c).is_some_and(f64::is_finite))
            .map(String::as_str)
            .collect()
    }

    /// Align a feature source to this schema. Never fails.
    pub fn align(&self, source: &impl FeatureSource) -> AlignedVector {
        let mut filled = 0usize;
        let values = self
            .columns
            .iter()
            .map(|column| match source.feature(column) {
                Some(v) if v.is_finite() => v,
                _ => {
                    filled += 1;
                    0.0
                }
            })
            .collect();

        if filled > 0 {
            debug!(
                filled,
                missing = ?self.missing_features(source),
                "zero-filled schema columns during alignment"
            );
        }

        AlignedVector::new(values)
    }
}

fn validate_threshold(threshold: f64) -> Result<(), SchemaLoadError> {
    if (0.0..=1.0).contains(&threshold) {
        Ok(())
    } else {
        Err(SchemaLoadError::InvalidThreshold(threshold))
    }
}
