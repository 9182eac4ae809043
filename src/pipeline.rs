//! Complete ingestion-to-inference pipeline.
//!
//! Orchestrates one window from raw bytes to the latest state store:
//! 1. **Payload decoding**: CSV bytes to a `RawWindow`
//! 2. **Unit normalization**: validate axes, coerce, convert g to m/s²
//! 3. **Feature extraction**: 18 statistical and spectral features
//! 4. **Schema alignment**: reorder and zero-fill to the training columns
//! 5. **Inference**: probability and thresholded decision
//! 6. **Store update**: replace the latest result
//!
//! Any stage can fail; a failure returns before step 6, so the store only
//! ever changes on full success. No window data is retained after the call.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{Error, IngestError};
use crate::features::{FeatureConfig, FeatureExtractor};
use crate::inference::InferenceEngine;
use crate::model::{self, ProbabilityModel};
use crate::normalize::{NormalizerConfig, UnitNormalizer};
use crate::payload;
use crate::schema::{TrainingSchema, DEFAULT_THRESHOLD};
use crate::store::LatestStateStore;
use crate::types::{FeatureVector, IngestResponse, Prediction, StatusSnapshot};

/// Stage configuration for the pipeline.
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    /// Unit detection parameters.
    pub normalizer_config: NormalizerConfig,

    /// Spectral feature parameters.
    pub feature_config: FeatureConfig,
}

/// The full ingestion pipeline plus the store it writes to.
///
/// Shared across request handlers behind an `Arc`; all methods take `&self`.
#[derive(Debug)]
pub struct InferencePipeline {
    normalizer: UnitNormalizer,
    extractor: FeatureExtractor,
    schema: TrainingSchema,
    engine: InferenceEngine,
    store: LatestStateStore,
}

impl InferencePipeline {
    /// Assemble a pipeline from already-loaded collaborators.
    ///
    /// The engine's threshold is taken from the schema.
    pub fn new(
        config: PipelineConfig,
        schema: TrainingSchema,
        model: Arc<dyn ProbabilityModel>,
    ) -> Self {
        if model.n_features() != schema.len() {
            warn!(
                schema_columns = schema.len(),
                model_features = model.n_features(),
                "training schema and model disagree on width; every prediction will fail"
            );
        }
        let engine = InferenceEngine::new(model, schema.threshold());
        Self {
            normalizer: UnitNormalizer::new(config.normalizer_config),
            extractor: FeatureExtractor::new(config.feature_config),
            schema,
            engine,
            store: LatestStateStore::new(),
        }
    }

    /// Load the classifier and training schema described by `config`.
    ///
    /// Threshold precedence: `model.threshold` in config, then the
    /// artifact's own threshold, then 0.5.
    pub fn from_config(config: &Config) -> Result<Self, Error> {
        let model = model::load_classifier(
            config.model.pipeline_path.as_deref(),
            config.model.model_path.as_deref(),
        )?;
        let threshold = config
            .model
            .threshold
            .or_else(|| model.threshold())
            .unwrap_or(DEFAULT_THRESHOLD);
        let schema = load_schema(config, threshold)?;

        info!(
            model_kind = %model.kind(),
            schema_columns = schema.len(),
            threshold,
            "inference pipeline ready"
        );

        let stages = PipelineConfig {
            normalizer_config: config.normalizer.clone(),
            feature_config: config.features.clone(),
        };
        Ok(Self::new(stages, schema, model))
    }

    pub fn schema(&self) -> &TrainingSchema {
        &self.schema
    }

    pub fn engine(&self) -> &InferenceEngine {
        &self.engine
    }

    /// Features of one payload, without inference.
    pub fn extract(&self, payload: &[u8]) -> Result<FeatureVector, IngestError> {
        let raw = payload::parse_csv(payload)?;
        let window = self.normalizer.normalize(&raw)?;
        Ok(self.extractor.extract(&window))
    }

    /// Run every stage except the store update.
    pub fn evaluate(&self, payload: &[u8]) -> Result<Prediction, IngestError> {
        let raw = payload::parse_csv(payload)?;
        debug!(rows = raw.len(), columns = ?raw.headers(), "decoded payload");

        let window = self.normalizer.normalize(&raw)?;
        let features = self.extractor.extract(&window);
        debug!(
            samples = window.len(),
            x_std = features.get("x_std"),
            mag_mean = features.get("mag_mean"),
            fft_energy = features.get("fft_energy_0p5_4Hz"),
            "extracted features"
        );

        let aligned = self.schema.align(&features);
        Ok(self.engine.predict(&aligned)?)
    }

    /// Process one window end to end and update the store.
    pub fn ingest(&self, payload: &[u8]) -> Result<IngestResponse, IngestError> {
        match self.evaluate(payload) {
            Ok(prediction) => {
                let stored = self.store.update(prediction);
                info!(
                    p_rush = prediction.probability,
                    status = prediction.status.as_u8(),
                    window_count = stored.sequence,
                    "window ingested"
                );
                Ok(prediction)
            }
            Err(e) => {
                if e.is_client_error() {
                    warn!(error_kind = e.kind(), error = %e, "window rejected");
                } else {
                    error!(error_kind = e.kind(), error = %e, "window failed");
                }
                Err(e)
            }
        }
    }

    /// Current contents of the store. Never fails.
    pub fn status(&self) -> StatusSnapshot {
        self.store.read()
    }
}

fn load_schema(config: &Config, threshold: f64) -> Result<TrainingSchema, Error> {
    let schema = if let Some(path) = &config.schema.reference_path {
        TrainingSchema::from_reference_table(path, threshold)?
    } else if !config.schema.columns.is_empty() {
        TrainingSchema::new(config.schema.columns.clone(), threshold)?
    } else {
        TrainingSchema::canonical().with_threshold(threshold)?
    };
    Ok(schema)
}
