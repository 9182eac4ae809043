//! Rush Sensing Library
//!
//! Turns five-second windows of phone accelerometer samples into a
//! "rush" probability and a binary decision, and keeps the most recent
//! result available for polling.
//!
//! # Design Philosophy
//!
//! - **Fail loud, mutate nothing**: A window that cannot be parsed,
//!   normalized or scored is rejected with a typed error and the latest
//!   state is left exactly as it was.
//! - **Training parity**: Features are computed and ordered exactly as the
//!   classifier saw them during training; absent features are zero-filled.
//! - **No retention**: Raw samples live only for the duration of one call.
//!
//! # Example
//!
//! ```ignore
//! use rush_sensing::pipeline::{InferencePipeline, PipelineConfig};
//! use rush_sensing::schema::TrainingSchema;
//! use rush_sensing::model::load_classifier;
//!
//! let model = load_classifier(Some("models/logreg_pipe.json".as_ref()), None)?;
//! let pipeline = InferencePipeline::new(
//!     PipelineConfig::default(),
//!     TrainingSchema::canonical(),
//!     model,
//! );
//!
//! let response = pipeline.ingest(b"timestamp_ms,ax,ay,az\n0,0.01,0.02,0.98\n")?;
//! println!("p_rush={} status={}", response.probability, response.status);
//! ```

pub mod calibration;
pub mod config;
pub mod error;
pub mod features;
pub mod inference;
pub mod logging;
pub mod model;
pub mod normalize;
pub mod payload;
pub mod pipeline;
pub mod schema;
pub mod server;
pub mod store;
pub mod types;

#[cfg(test)]
mod integration_tests;


// Re-export commonly used types
pub use config::Config;
pub use error::{Error, IngestError, PredictError, Result};
pub use pipeline::{InferencePipeline, PipelineConfig};
pub use types::{
    FeatureVector, IngestResponse, NormalizedWindow, Prediction, RawWindow, RushStatus,
    StatusSnapshot, FEATURE_NAMES,
};
