//! Trained classifier capability.
//!
//! The rest of the crate sees one interface: "given a row of features in
//! schema order, return P(rush)". Two artifact shapes implement it:
//! - a preprocessing pipeline (standard scaler + logistic regression)
//! - a bare logistic regression
//!
//! Which one is used is decided once, at startup, by artifact availability.
//! The pipeline is preferred. Falling back to the bare model is allowed but
//! logged as a warning: a bare model fed unscaled features produces skewed
//! probabilities.
//!
//! Artifacts are JSON files:
//!
//! ```text
//! pipeline: {"scaler": {"mean": [..], "scale": [..]},
//!            "model": {"coef": [..], "intercept": -1.2},
//!            "threshold": 0.5}
//! bare:     {"coef": [..], "intercept": -1.2, "threshold": 0.5}
//! ```
//!
//! `threshold` is optional in both.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ModelError, PredictError};

/// Which artifact shape is serving predictions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Pipeline,
    Bare,
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pipeline => write!(f, "pipeline"),
            Self::Bare => write!(f, "bare"),
        }
    }
}

/// Predict the probability of the positive (rush) class.
pub trait ProbabilityModel: Send + Sync + fmt::Debug {
    /// P(rush) for one row in schema order.
    fn predict_proba(&self, row: &[f64]) -> Result<f64, PredictError>;

    /// Number of input features the model was fit on.
    fn n_features(&self) -> usize;

    fn kind(&self) -> ModelKind;

    /// Decision threshold stored with the artifact, if any.
    fn threshold(&self) -> Option<f64> {
        None
    }
}

/// Binary logistic regression: P = σ(w·x + b).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression {
    pub coef: Vec<f64>,
    pub intercept: f64,
}

impl LogisticRegression {
    fn validate(&self) -> Result<(), ModelError> {
        if self.coef.is_empty() {
            return Err(ModelError::Invalid("logistic regression has no coefficients".into()));
        }
        if !self.intercept.is_finite() || self.coef.iter().any(|c| !c.is_finite()) {
            return Err(ModelError::Invalid(
                "logistic regression has non-finite parameters".into(),
            ));
        }
        Ok(())
    }

    fn check_width(&self, row: &[f64]) -> Result<(), PredictError> {
        if row.len() == self.coef.len() {
            Ok(())
        } else {
            Err(PredictError::DimensionMismatch {
                expected: self.coef.len(),
                actual: row.len(),
            })
        }
    }

    fn decision_function(&self, row: &[f64]) -> f64 {
        self.coef.iter().zip(row).map(|(w, x)| w * x).sum::<f64>() + self.intercept
    }
}

/// Per-feature standardization: (x - mean) / scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    fn validate(&self, width: usize) -> Result<(), ModelError> {
        if self.mean.len() != width || self.scale.len() != width {
            return Err(ModelError::Invalid(format!(
                "scaler has {} mean(s) and {} scale(s) but the model has {} coefficient(s)",
                self.mean.len(),
                self.scale.len(),
                width
            )));
        }
        if self.mean.iter().chain(&self.scale).any(|v| !v.is_finite()) {
            return Err(ModelError::Invalid("scaler has non-finite parameters".into()));
        }
        Ok(())
    }

    fn transform(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(x, (mean, scale))| {
                // Constant training features are stored with scale 0
                let scale = if *scale == 0.0 { 1.0 } else { *scale };
                (x - mean) / scale
            })
            .collect()
    }
}

/// Bare model artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BareModel {
    #[serde(flatten)]
    pub model: LogisticRegression,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
}

impl ProbabilityModel for BareModel {
    fn predict_proba(&self, row: &[f64]) -> Result<f64, PredictError> {
        self.model.check_width(row)?;
        finite_probability(sigmoid(self.model.decision_function(row)))
    }

    fn n_features(&self) -> usize {
        self.model.coef.len()
    }

    fn kind(&self) -> ModelKind {
        ModelKind::Bare
    }

    fn threshold(&self) -> Option<f64> {
        self.threshold
    }
}

/// Scaler + logistic regression pipeline artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaledPipeline {
    pub scaler: StandardScaler,
    pub model: LogisticRegression,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
}

impl ProbabilityModel for ScaledPipeline {
    fn predict_proba(&self, row: &[f64]) -> Result<f64, PredictError> {
        self.model.check_width(row)?;
        let scaled = self.scaler.transform(row);
        finite_probability(sigmoid(self.model.decision_function(&scaled)))
    }

    fn n_features(&self) -> usize {
        self.model.coef.len()
    }

    fn kind(&self) -> ModelKind {
        ModelKind::Pipeline
    }

    fn threshold(&self) -> Option<f64> {
        self.threshold
    }
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

fn finite_probability(p: f64) -> Result<f64, PredictError> {
    if p.is_finite() {
        Ok(p.clamp(0.0, 1.0))
    } else {
        Err(PredictError::NonFinite)
    }
}

/// Load a pipeline artifact from JSON.
pub fn load_pipeline(path: &Path) -> Result<ScaledPipeline, ModelError> {
    let pipeline: ScaledPipeline = read_json(path)?;
    pipeline.model.validate()?;
    pipeline.scaler.validate(pipeline.model.coef.len())?;
    validate_artifact_threshold(pipeline.threshold)?;
    Ok(pipeline)
}

/// Load a bare model artifact from JSON.
pub fn load_bare_model(path: &Path) -> Result<BareModel, ModelError> {
    let model: BareModel = read_json(path)?;
    model.model.validate()?;
    validate_artifact_threshold(model.threshold)?;
    Ok(model)
}

/// Select and load the classifier once at startup.
///
/// Prefers the pipeline when its file exists; otherwise falls back to the
/// bare model with a warning. Fails if neither file exists or the chosen
/// one is invalid.
pub fn load_classifier(
    pipeline_path: Option<&Path>,
    model_path: Option<&Path>,
) -> Result<Arc<dyn ProbabilityModel>, ModelError> {
    if let Some(path) = pipeline_path {
        if path.exists() {
            let pipeline = load_pipeline(path)?;
            info!(
                path = %path.display(),
                features = pipeline.n_features(),
                "loaded classifier pipeline"
            );
            return Ok(Arc::new(pipeline));
        }
        warn!(
            path = %path.display(),
            "classifier pipeline not found; falling back to bare model without scaling"
        );
    }

    if let Some(path) = model_path {
        if path.exists() {
            let model = load_bare_model(path)?;
            warn!(
                path = %path.display(),
                features = model.n_features(),
                "serving bare model without preprocessing"
            );
            return Ok(Arc::new(model));
        }
    }

    let tried: Vec<PathBuf> = pipeline_path
        .into_iter()
        .chain(model_path)
        .map(Path::to_path_buf)
        .collect();
    Err(ModelError::NotFound { tried })
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ModelError> {
    let text = std::fs::read_to_string(path).map_err(|source| ModelError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| ModelError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn validate_artifact_threshold(threshold: Option<f64>) -> Result<(), ModelError> {
    match threshold {
        Some(t) if !(0.0..=1.0).contains(&t) => Err(ModelError::Invalid(format!(
            "artifact threshold {t} is outside [0, 1]"
        ))),
        _ => Ok(()),
    }
}
