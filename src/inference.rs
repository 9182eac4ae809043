//! Probability-to-decision inference.
//!
//! Wraps the classifier capability and the decision threshold. A failure of
//! the capability means the schema and the model disagree, or the artifact
//! is broken; it is logged with full context and propagated, never hidden.

use std::sync::Arc;

use tracing::error;

use crate::error::PredictError;
use crate::model::ProbabilityModel;
use crate::types::{AlignedVector, Prediction, RushStatus};

/// Classifier plus threshold.
#[derive(Debug, Clone)]
pub struct InferenceEngine {
    model: Arc<dyn ProbabilityModel>,
    threshold: f64,
}

impl InferenceEngine {
    pub fn new(model: Arc<dyn ProbabilityModel>, threshold: f64) -> Self {
        Self { model, threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn model(&self) -> &dyn ProbabilityModel {
        self.model.as_ref()
    }

    /// Probability and thresholded decision for one aligned row.
    pub fn predict(&self, row: &AlignedVector) -> Result<Prediction, PredictError> {
        let probability = self.model.predict_proba(row.as_slice()).inspect_err(|e| {
            error!(
                error = %e,
                row_len = row.len(),
                model_features = self.model.n_features(),
                model_kind = %self.model.kind(),
                "classifier prediction failed"
            );
        })?;

        Ok(Prediction {
            probability,
            status: RushStatus::from_probability(probability, self.threshold),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BareModel, LogisticRegression};
    use crate::schema::TrainingSchema;
    use std::collections::HashMap;

    fn engine(coef: Vec<f64>, threshold: f64) -> InferenceEngine {
        let model = BareModel {
            model: LogisticRegression {
                coef,
                intercept: 0.0,
            },
            threshold: None,
        };
        InferenceEngine::new(Arc::new(model), threshold)
    }

    fn row(values: &[f64]) -> AlignedVector {
        let columns: Vec<String> = (0..values.len()).map(|i| format!("f{i}")).collect();
        let map: HashMap<String, f64> = columns
            .iter()
            .cloned()
            .zip(values.iter().copied())
            .collect();
        TrainingSchema::new(columns, 0.5).unwrap().align(&map)
    }

    #[test]
    fn test_decision_matches_threshold() {
        let engine = engine(vec![1.0], 0.5);
        for x in [-5.0, -0.1, 0.0, 0.1, 5.0] {
            let prediction = engine.predict(&row(&[x])).unwrap();
            assert!((0.0..=1.0).contains(&prediction.probability));
            assert_eq!(
                prediction.status == RushStatus::Rush,
                prediction.probability >= engine.threshold()
            );
        }
    }

    #[test]
    fn test_custom_threshold() {
        let engine = engine(vec![1.0], 0.9);
        // σ(1) ≈ 0.73
        let prediction = engine.predict(&row(&[1.0])).unwrap();
        assert_eq!(prediction.status, RushStatus::Calm);
    }

    #[test]
    fn test_predict_error_propagates() {
        let engine = engine(vec![1.0, 1.0], 0.5);
        let err = engine.predict(&row(&[1.0])).unwrap_err();
        assert!(matches!(err, PredictError::DimensionMismatch { expected: 2, actual: 1 }));
    }
}
