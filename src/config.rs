//! Configuration management for rush_sensing
//!
//! Handles loading and validation of `rush.toml` configuration files. Every
//! section is optional; a missing file section falls back to its defaults.
//!
//! ```toml
//! [server]
//! bind = "0.0.0.0:8000"
//!
//! [model]
//! pipeline_path = "models/logreg_pipe.json"
//! model_path = "models/logreg.json"
//!
//! [schema]
//! reference_path = "prepared/features_5s_50pct_purity80.csv"
//!
//! [logging]
//! level = "debug"
//! format = "json"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::features::FeatureConfig;
use crate::logging::LogConfig;
use crate::normalize::NormalizerConfig;
use crate::types::MAX_ABS_ACCEL;

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Classifier artifact settings
    #[serde(default)]
    pub model: ModelConfig,

    /// Training schema settings
    #[serde(default)]
    pub schema: SchemaConfig,

    /// Spectral feature settings
    #[serde(default)]
    pub features: FeatureConfig,

    /// Unit detection settings
    #[serde(default)]
    pub normalizer: NormalizerConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LogConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Largest accepted ingestion body in bytes
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

fn default_max_body_bytes() -> usize {
    1024 * 1024
}

/// Classifier artifact configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Preferred artifact: scaler + model pipeline
    #[serde(default = "default_pipeline_path")]
    pub pipeline_path: Option<PathBuf>,

    /// Fallback artifact: bare model
    #[serde(default = "default_model_path")]
    pub model_path: Option<PathBuf>,

    /// Decision threshold; overrides the artifact's own
    #[serde(default)]
    pub threshold: Option<f64>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            pipeline_path: default_pipeline_path(),
            model_path: default_model_path(),
            threshold: None,
        }
    }
}

fn default_pipeline_path() -> Option<PathBuf> {
    Some(PathBuf::from("models/logreg_pipe.json"))
}

fn default_model_path() -> Option<PathBuf> {
    Some(PathBuf::from("models/logreg.json"))
}

/// Training schema configuration
///
/// `reference_path` wins over `columns`; with neither, the extractor's
/// canonical feature order is used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SchemaConfig {
    /// Reference feature table whose header defines the schema
    #[serde(default)]
    pub reference_path: Option<PathBuf>,

    /// Explicit ordered feature columns
    #[serde(default)]
    pub columns: Vec<String>,
}

impl Config {
    /// Parse configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Load from `path` if given, otherwise use defaults
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load_from(path),
            None => Ok(Self::default()),
        }
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(t) = self.model.threshold {
            if !(0.0..=1.0).contains(&t) {
                return Err(ConfigError::Invalid(format!(
                    "model.threshold {t} is outside [0, 1]"
                )));
            }
        }
        if self.model.pipeline_path.is_none() && self.model.model_path.is_none() {
            return Err(ConfigError::Invalid(
                "one of model.pipeline_path or model.model_path is required".into(),
            ));
        }
        let f = &self.features;
        if !(f.sample_rate_hz.is_finite() && f.sample_rate_hz > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "features.sample_rate_hz must be positive, got {}",
                f.sample_rate_hz
            )));
        }
        if !(f.band_low_hz >= 0.0 && f.band_low_hz <= f.band_high_hz) {
            return Err(ConfigError::Invalid(format!(
                "features band [{}, {}] Hz is empty or negative",
                f.band_low_hz, f.band_high_hz
            )));
        }
        let n = &self.normalizer;
        let finite = n.g_unit_threshold.is_finite() && n.standard_gravity.is_finite();
        if !(finite && n.standard_gravity > 0.0) {
            return Err(ConfigError::Invalid(
                "normalizer parameters must be finite and standard_gravity positive".into(),
            ));
        }
        if n.g_unit_threshold * n.standard_gravity > MAX_ABS_ACCEL {
            return Err(ConfigError::Invalid(format!(
                "normalizer would scale g windows past {MAX_ABS_ACCEL} m/s²"
            )));
        }
        if self.server.max_body_bytes == 0 {
            return Err(ConfigError::Invalid("server.max_body_bytes must be non-zero".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::LogFormat;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.server.bind, "127.0.0.1:8000");
        assert_eq!(config.features.sample_rate_hz, 20.0);
        assert_eq!(config.normalizer.g_unit_threshold, 3.0);
        assert!(config.schema.reference_path.is_none());
    }

    #[test]
    fn empty_toml_uses_defaults() {
        assert_eq!(Config::from_toml_str("").unwrap(), Config::default());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = Config::from_toml_str(
            r#"
            [server]
            bind = "0.0.0.0:9000"

            [features]
            band_high_hz = 3.5

            [logging]
            format = "json"
            "#,
        )
        .unwrap();
        assert_eq!(config.server.bind, "0.0.0.0:9000");
        assert_eq!(config.server.max_body_bytes, 1024 * 1024);
        assert_eq!(config.features.band_high_hz, 3.5);
        assert_eq!(config.features.band_low_hz, 0.5);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn invalid_threshold_rejected() {
        let err = Config::from_toml_str("[model]\nthreshold = 1.2\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn oversized_unit_threshold_rejected() {
        let err = Config::from_toml_str("[normalizer]\ng_unit_threshold = 1e9\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn inverted_band_rejected() {
        let err = Config::from_toml_str("[features]\nband_low_hz = 5.0\nband_high_hz = 1.0\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn malformed_toml_rejected() {
        let err = Config::from_toml_str("[server\nbind = 1").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[schema]\ncolumns = [\"x_mean\", \"x_std\"]").unwrap();
        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.schema.columns, vec!["x_mean", "x_std"]);
    }

    #[test]
    fn load_missing_file_fails() {
        let err = Config::load(Some(Path::new("/nonexistent/rush.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
