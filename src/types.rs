//! Core data types for the rush inference pipeline.
//!
//! Each stage boundary gets its own type: the raw table as it arrives over
//! the wire, the normalized window, the fixed feature vector, the row aligned
//! to the classifier's training schema, and the result held by the latest
//! state store. Nothing crosses a stage boundary as an untyped tuple or map.
//!
//! Precision: everything is `f64`. Windows are small (a few seconds at
//! 20 Hz) and the classifier was fit on double-precision features.

use serde::{Serialize, Serializer};

/// Standard gravity in m/s².
pub const STANDARD_GRAVITY: f64 = 9.80665;

/// Largest accepted |value| of a raw or normalized axis reading.
///
/// About 100 000 g, far beyond any phone sensor. Keeps every feature,
/// including the squared spectral energy, inside the `f64` range.
pub const MAX_ABS_ACCEL: f64 = 1.0e6;

/// Column names of the three raw accelerometer axes in the ingestion payload.
pub const RAW_AXIS_COLUMNS: [&str; 3] = ["ax", "ay", "az"];

/// Optional timestamp column in the ingestion payload.
pub const TIMESTAMP_COLUMN: &str = "timestamp_ms";

/// Number of features produced for every window.
pub const FEATURE_COUNT: usize = 18;

/// Canonical feature names, in extraction order.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "x_mean",
    "x_std",
    "x_min",
    "x_max",
    "y_mean",
    "y_std",
    "y_min",
    "y_max",
    "z_mean",
    "z_std",
    "z_min",
    "z_max",
    "mag_mean",
    "mag_std",
    "mag_min",
    "mag_max",
    "fft_energy_0p5_4Hz",
    "fft_peak_freq",
];

// ============================================================================
// RAW INPUT
// ============================================================================

/// A window exactly as it arrived: named columns and string cells.
///
/// Nothing here is interpreted yet. Rows keep their payload order, which is
/// temporal order; the spectral features depend on it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawWindow {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl RawWindow {
    /// Create a raw window from header names and rows of cells.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    /// Build a raw window with `ax,ay,az` columns from numeric samples.
    pub fn from_accel(samples: &[[f64; 3]]) -> Self {
        let headers = RAW_AXIS_COLUMNS.iter().map(|c| (*c).to_string()).collect();
        let rows = samples
            .iter()
            .map(|s| s.iter().map(|v| v.to_string()).collect())
            .collect();
        Self { headers, rows }
    }

    /// Column names, in payload order.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Position of a named column, if present.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// All rows, in payload order.
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// A single cell. Ragged rows read as missing cells.
    pub fn cell(&self, row: usize, column: usize) -> Option<&str> {
        self.rows.get(row)?.get(column).map(String::as_str)
    }

    /// Number of rows, before any cleaning.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True if the payload carried no data rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// ============================================================================
// NORMALIZED WINDOW
// ============================================================================

/// One cleaned accelerometer sample in m/s².
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccelSample {
    /// Timestamp carried from the payload. Never used for computation.
    pub timestamp_ms: Option<u64>,

    /// Acceleration [x, y, z] in m/s².
    pub accel: [f64; 3],
}

impl AccelSample {
    /// Create a sample without a timestamp.
    pub fn new(accel: [f64; 3]) -> Self {
        Self {
            timestamp_ms: None,
            accel,
        }
    }

    /// Every component finite and within ±`MAX_ABS_ACCEL`.
    pub fn in_range(&self) -> bool {
        self.accel
            .iter()
            .all(|v| v.is_finite() && v.abs() <= MAX_ABS_ACCEL)
    }

    /// Euclidean norm of the acceleration vector, m/s².
    pub fn magnitude(&self) -> f64 {
        let [x, y, z] = self.accel;
        x.hypot(y).hypot(z)
    }
}

/// One of the three canonical axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    /// All axes in feature order.
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

/// A non-empty window of samples in m/s², axes named x/y/z.
///
/// Every component is finite and within ±`MAX_ABS_ACCEL`.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedWindow {
    samples: Vec<AccelSample>,
    scaled_from_g: bool,
    dropped_rows: usize,
}

impl NormalizedWindow {
    /// Wrap samples that are already in m/s².
    ///
    /// Returns `None` for an empty sample list, which has no defined
    /// statistics, or when any component is non-finite or beyond
    /// `MAX_ABS_ACCEL`.
    pub fn new(samples: Vec<AccelSample>) -> Option<Self> {
        Self::with_provenance(samples, false, 0)
    }

    /// Wrap samples and record how the normalizer produced them.
    pub fn with_provenance(
        samples: Vec<AccelSample>,
        scaled_from_g: bool,
        dropped_rows: usize,
    ) -> Option<Self> {
        if samples.is_empty() || !samples.iter().all(AccelSample::in_range) {
            return None;
        }
        Some(Self {
            samples,
            scaled_from_g,
            dropped_rows,
        })
    }

    /// Convenience constructor from bare [x, y, z] triples.
    pub fn from_accel(samples: &[[f64; 3]]) -> Option<Self> {
        Self::new(samples.iter().copied().map(AccelSample::new).collect())
    }

    /// The samples, in temporal order.
    pub fn samples(&self) -> &[AccelSample] {
        &self.samples
    }

    /// Number of samples. Always at least one.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Values of one axis.
    pub fn axis(&self, axis: Axis) -> Vec<f64> {
        let index = axis.index();
        self.samples.iter().map(|s| s.accel[index]).collect()
    }

    /// Per-sample magnitudes.
    pub fn magnitudes(&self) -> Vec<f64> {
        self.samples.iter().map(AccelSample::magnitude).collect()
    }

    /// Whether the input was detected as g units and rescaled.
    pub fn scaled_from_g(&self) -> bool {
        self.scaled_from_g
    }

    /// Rows discarded during numeric coercion.
    pub fn dropped_rows(&self) -> usize {
        self.dropped_rows
    }
}

// ============================================================================
// FEATURES
// ============================================================================

/// The fixed 18-entry feature set of one window.
///
/// Values are stored in `FEATURE_NAMES` order. Immutable once produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector {
    values: [f64; FEATURE_COUNT],
}

impl FeatureVector {
    /// Build from values in `FEATURE_NAMES` order.
    pub fn from_values(values: [f64; FEATURE_COUNT]) -> Self {
        Self { values }
    }

    /// Look up a feature by name.
    pub fn get(&self, name: &str) -> Option<f64> {
        FEATURE_NAMES
            .iter()
            .position(|n| *n == name)
            .map(|i| self.values[i])
    }

    /// Values in `FEATURE_NAMES` order.
    pub fn values(&self) -> &[f64; FEATURE_COUNT] {
        &self.values
    }

    /// (name, value) pairs in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        FEATURE_NAMES.iter().copied().zip(self.values.iter().copied())
    }

    /// Number of features. Always `FEATURE_COUNT`.
    pub fn len(&self) -> usize {
        FEATURE_COUNT
    }

    /// Always false.
    pub fn is_empty(&self) -> bool {
        false
    }
}

/// A feature row in the exact column order of the training schema.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedVector {
    values: Vec<f64>,
}

impl AlignedVector {
    pub(crate) fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

// ============================================================================
// INFERENCE RESULTS
// ============================================================================

/// Binary decision derived from the rush probability.
///
/// Serialized as the integer 0 (calm) or 1 (rush), which is what polling
/// consumers expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RushStatus {
    /// Calm or normal-paced movement.
    Calm,
    /// Fast walking or jogging.
    Rush,
}

impl RushStatus {
    /// Threshold a probability. Ties go to `Rush`.
    pub fn from_probability(probability: f64, threshold: f64) -> Self {
        if probability >= threshold {
            RushStatus::Rush
        } else {
            RushStatus::Calm
        }
    }

    /// 0 for calm, 1 for rush.
    pub fn as_u8(self) -> u8 {
        match self {
            RushStatus::Calm => 0,
            RushStatus::Rush => 1,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RushStatus::Calm => "CALM",
            RushStatus::Rush => "RUSH",
        }
    }
}

impl Serialize for RushStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.as_u8())
    }
}

impl std::fmt::Display for RushStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Probability and decision for one window, before it is stored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Prediction {
    /// P(rush) in [0, 1].
    #[serde(rename = "p_rush")]
    pub probability: f64,
    /// Thresholded decision.
    pub status: RushStatus,
}

/// A prediction as held by the latest state store.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InferenceResult {
    pub prediction: Prediction,
    /// Number of successful updates up to and including this one.
    pub sequence: u64,
}

/// Body returned by a successful ingestion.
pub type IngestResponse = Prediction;

/// Read-only view of the latest state store.
///
/// Before the first successful ingestion `p_rush` and `status` are `None`
/// (serialized as `null`) and `window_count` is 0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub p_rush: Option<f64>,
    pub status: Option<RushStatus>,
    pub window_count: u64,
}

impl StatusSnapshot {
    /// The "no data yet" sentinel.
    pub fn empty() -> Self {
        Self {
            p_rush: None,
            status: None,
            window_count: 0,
        }
    }
}

impl From<InferenceResult> for StatusSnapshot {
    fn from(result: InferenceResult) -> Self {
        Self {
            p_rush: Some(result.prediction.probability),
            status: Some(result.prediction.status),
            window_count: result.sequence,
        }
    }
}
