//! Error types for rush_sensing

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using the library's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for rush_sensing
#[derive(Error, Debug)]
pub enum Error {
    /// Per-window ingestion failures
    #[error("Ingest error: {0}")]
    Ingest(#[from] IngestError),

    /// Classifier artifact errors
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    /// Training schema errors
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaLoadError),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Calibration and offline scoring errors
    #[error("Calibration error: {0}")]
    Calibration(#[from] CalibrationError),

    /// Logging setup errors
    #[error("Logging error: {0}")]
    Log(#[from] crate::logging::LogError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures of a single ingestion request.
///
/// None of these mutate the latest state store.
#[derive(Error, Debug)]
pub enum IngestError {
    /// Required axis columns are absent from the payload.
    #[error("payload is missing required column(s): {}", missing.join(", "))]
    Schema { missing: Vec<String> },

    /// Every row was dropped during numeric coercion.
    #[error("window is empty after numeric coercion ({dropped} row(s) dropped)")]
    EmptyWindow { dropped: usize },

    /// The payload could not be decoded as a table.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// The classifier itself failed.
    #[error(transparent)]
    Predict(#[from] PredictError),
}

impl IngestError {
    /// Stable short name for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            IngestError::Schema { .. } => "schema_error",
            IngestError::EmptyWindow { .. } => "empty_window_error",
            IngestError::MalformedPayload(_) => "malformed_payload",
            IngestError::Predict(_) => "predict_error",
        }
    }

    /// True when the caller sent bad input; false for deployment defects.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, IngestError::Predict(_))
    }
}

/// Failure of the classifier capability.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PredictError {
    #[error("feature row has {actual} value(s) but the model expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("model produced a non-finite probability")]
    NonFinite,
}

/// Classifier artifact loading errors. Fatal at startup.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("no model artifact found (tried: {})", display_paths(tried))]
    NotFound { tried: Vec<PathBuf> },

    #[error("failed to read model artifact {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse model artifact {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid model artifact: {0}")]
    Invalid(String),
}

/// Training schema loading errors. Fatal at startup.
#[derive(Error, Debug)]
pub enum SchemaLoadError {
    #[error("failed to read reference table {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("training schema has no feature columns")]
    NoFeatureColumns,

    #[error("duplicate feature column in training schema: {0}")]
    DuplicateColumn(String),

    #[error("decision threshold {0} is outside [0, 1]")]
    InvalidThreshold(f64),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Calibration and offline scoring errors
#[derive(Error, Debug)]
pub enum CalibrationError {
    #[error("no probabilities to calibrate against")]
    Empty,

    #[error("quantile {0} is outside [0, 1]")]
    InvalidQuantile(f64),

    #[error("no scored windows for subject {0}")]
    UnknownSubject(String),

    #[error("failed to read feature table: {0}")]
    Table(#[from] csv::Error),

    #[error(transparent)]
    Predict(#[from] PredictError),
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
