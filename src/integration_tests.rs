/// Integration tests for the complete ingestion pipeline
/// Exercises realistic accelerometer windows end to end: payload decoding,
/// unit normalization, feature extraction, schema alignment, inference and
/// the latest state store.

#[cfg(test)]
mod integration_tests {
    use std::f64::consts::PI;
    use std::io::Write;
    use std::sync::Arc;

    use crate::config::Config;
    use crate::error::IngestError;
    use crate::model::{BareModel, LogisticRegression, ModelKind, ProbabilityModel};
    use crate::pipeline::*;
    use crate::schema::TrainingSchema;
    use crate::types::*;

    const SAMPLE_RATE_HZ: f64 = 20.0;

    /// Helper: render samples as a recorder-style CSV payload
    fn csv_payload(samples: &[[f64; 3]]) -> Vec<u8> {
        let mut out = String::from("timestamp_ms,ax,ay,az\n");
        for (i, [x, y, z]) in samples.iter().enumerate() {
            out.push_str(&format!("{},{x},{y},{z}\n", i * 50));
        }
        out.into_bytes()
    }

    /// Helper: phone lying flat, in g units
    fn resting_window(len: usize) -> Vec<[f64; 3]> {
        vec![[0.0, 0.0, 1.0]; len]
    }

    /// Helper: hurried vertical bouncing at `freq_hz`, in g units
    fn bouncing_window(len: usize, freq_hz: f64, amplitude_g: f64) -> Vec<[f64; 3]> {
        (0..len)
            .map(|i| {
                let t = i as f64 / SAMPLE_RATE_HZ;
                [0.0, 0.0, 1.0 + amplitude_g * (2.0 * PI * freq_hz * t).sin()]
            })
            .collect()
    }

    /// Helper: logistic model over the canonical features with named weights
    fn weighted_model(weights: &[(&str, f64)], intercept: f64) -> Arc<dyn ProbabilityModel> {
        let mut coef = vec![0.0; FEATURE_COUNT];
        for (name, w) in weights {
            let idx = FEATURE_NAMES
                .iter()
                .position(|n| n == name)
                .expect("unknown feature name");
            coef[idx] = *w;
        }
        Arc::new(BareModel {
            model: LogisticRegression { coef, intercept },
            threshold: None,
        })
    }

    fn motion_pipeline() -> InferencePipeline {
        InferencePipeline::new(
            PipelineConfig::default(),
            TrainingSchema::canonical(),
            weighted_model(&[("mag_std", 2.0)], -3.0),
        )
    }

    #[test]
    fn test_resting_phone_is_calm() {
        let pipeline = motion_pipeline();
        let response = pipeline.ingest(&csv_payload(&resting_window(100))).unwrap();

        // σ(-3)
        assert!(response.probability < 0.1);
        assert_eq!(response.status, RushStatus::Calm);

        let status = pipeline.status();
        assert_eq!(status.window_count, 1);
        assert_eq!(status.status, Some(RushStatus::Calm));
    }

    #[test]
    fn test_bouncing_phone_is_rush() {
        let pipeline = motion_pipeline();
        let response = pipeline
            .ingest(&csv_payload(&bouncing_window(100, 2.0, 0.8)))
            .unwrap();

        assert!(response.probability > 0.99);
        assert_eq!(response.status, RushStatus::Rush);
    }

    #[test]
    fn test_bouncing_features_match_signal() {
        let pipeline = motion_pipeline();
        let features = pipeline
            .extract(&csv_payload(&bouncing_window(100, 2.0, 0.8)))
            .unwrap();

        // g input was scaled to m/s²
        let z_mean = features.get("z_mean").unwrap();
        assert!((z_mean - 9.80665).abs() < 1e-9);

        // A pure sinusoid has std = amplitude / √2
        let expected_std = 0.8 * 9.80665 / 2f64.sqrt();
        assert!((features.get("mag_std").unwrap() - expected_std).abs() < 1e-6);

        // 100 samples at 20 Hz: bin 10 is exactly 2 Hz
        assert!((features.get("fft_peak_freq").unwrap() - 2.0).abs() < 1e-12);
        assert!(features.get("fft_energy_0p5_4Hz").unwrap() > 0.0);
    }

    #[test]
    fn test_metric_input_not_rescaled() {
        let pipeline = motion_pipeline();
        let features = pipeline
            .extract(b"ax,ay,az\n0.1,0.2,9.7\n0.1,0.2,9.7\n")
            .unwrap();
        assert!((features.get("z_mean").unwrap() - 9.7).abs() < 1e-12);
        assert!((features.get("x_max").unwrap() - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_missing_axis_rejected_and_store_unchanged() {
        let pipeline = motion_pipeline();
        pipeline.ingest(&csv_payload(&resting_window(20))).unwrap();
        let before = pipeline.status();

        let err = pipeline.ingest(b"timestamp_ms,ax,ay\n0,0,0\n").unwrap_err();
        match err {
            IngestError::Schema { missing } => assert_eq!(missing, vec!["az".to_string()]),
            other => panic!("expected schema error, got {other:?}"),
        }
        assert_eq!(pipeline.status(), before);
    }

    #[test]
    fn test_header_only_payload_is_empty_window() {
        let pipeline = motion_pipeline();
        let err = pipeline.ingest(b"timestamp_ms,ax,ay,az\n").unwrap_err();
        assert!(matches!(err, IngestError::EmptyWindow { .. }));
        assert_eq!(pipeline.status(), StatusSnapshot::empty());
    }

    #[test]
    fn test_all_rows_unparseable_is_empty_window() {
        let pipeline = motion_pipeline();
        let err = pipeline.ingest(b"ax,ay,az\nNaN,1,1\nfoo,bar,baz\n").unwrap_err();
        assert!(matches!(err, IngestError::EmptyWindow { dropped: 2 }));
    }

    #[test]
    fn test_bad_rows_dropped_rest_scored() {
        let pipeline = motion_pipeline();
        let features = pipeline
            .extract(b"ax,ay,az\n0,0,1\nx,0,1\n0,0,1\n")
            .unwrap();
        assert_eq!(features.get("mag_std"), Some(0.0));
        assert!(pipeline.ingest(b"ax,ay,az\n0,0,1\nx,0,1\n0,0,1\n").is_ok());
    }

    #[test]
    fn test_schema_with_unknown_features_zero_filled() {
        let mut columns: Vec<String> = FEATURE_NAMES.iter().map(|s| s.to_string()).collect();
        columns.extend(["gyro_energy", "step_rate", "hr_mean"].map(String::from));
        let schema = TrainingSchema::new(columns, 0.5).unwrap();

        let mut coef = vec![0.0; FEATURE_COUNT + 3];
        // Weights on features the extractor never produces contribute nothing
        coef[FEATURE_COUNT..].copy_from_slice(&[10.0, 10.0, 10.0]);
        let model = Arc::new(BareModel {
            model: LogisticRegression {
                coef,
                intercept: -1.0,
            },
            threshold: None,
        });
        let pipeline = InferencePipeline::new(PipelineConfig::default(), schema, model);

        let payload = csv_payload(&resting_window(40));
        let features = pipeline.extract(&payload).unwrap();
        assert_eq!(pipeline.schema().missing_features(&features).len(), 3);

        let response = pipeline.ingest(&payload).unwrap();
        assert!((response.probability - 1.0 / (1.0 + 1f64.exp())).abs() < 1e-12);
        assert_eq!(response.status, RushStatus::Calm);
    }

    #[test]
    fn test_latest_tracks_most_recent_window() {
        let pipeline = motion_pipeline();
        pipeline.ingest(&csv_payload(&bouncing_window(100, 2.0, 0.8))).unwrap();
        pipeline.ingest(&csv_payload(&resting_window(100))).unwrap();

        let status = pipeline.status();
        assert_eq!(status.window_count, 2);
        assert_eq!(status.status, Some(RushStatus::Calm));
    }

    #[test]
    fn test_duplicate_windows_each_counted() {
        let pipeline = motion_pipeline();
        let payload = csv_payload(&resting_window(10));
        for _ in 0..3 {
            pipeline.ingest(&payload).unwrap();
        }
        assert_eq!(pipeline.status().window_count, 3);
    }

    #[test]
    fn test_from_config_with_artifacts() {
        let dir = tempfile::tempdir().unwrap();

        let pipe_path = dir.path().join("logreg_pipe.json");
        let mut pipe = std::fs::File::create(&pipe_path).unwrap();
        write!(
            pipe,
            r#"{{"scaler":{{"mean":[0.0,0.0],"scale":[1.0,2.0]}},
                "model":{{"coef":[1.0,1.0],"intercept":-20.0}},
                "threshold":0.4}}"#
        )
        .unwrap();

        let table_path = dir.path().join("features.csv");
        std::fs::write(
            &table_path,
            "subject_id,start_ts,end_ts,z_mean,mag_mean,label\n1600,0,5000,9.8,9.8,0\n",
        )
        .unwrap();

        let mut config = Config::default();
        config.model.pipeline_path = Some(pipe_path);
        config.model.model_path = None;
        config.schema.reference_path = Some(table_path);

        let pipeline = InferencePipeline::from_config(&config).unwrap();
        assert_eq!(pipeline.schema().columns(), &["z_mean", "mag_mean"]);
        assert_eq!(pipeline.engine().threshold(), 0.4);
        assert_eq!(pipeline.engine().model().kind(), ModelKind::Pipeline);

        // 9.80665 + 9.80665 / 2 - 20 < 0
        let response = pipeline.ingest(&csv_payload(&resting_window(20))).unwrap();
        assert_eq!(response.status, RushStatus::Calm);
    }

    #[test]
    fn test_from_config_falls_back_to_bare_model() {
        let dir = tempfile::tempdir().unwrap();
        let bare_path = dir.path().join("logreg.json");
        let coef = vec!["0.0"; FEATURE_COUNT].join(",");
        std::fs::write(&bare_path, format!(r#"{{"coef":[{coef}],"intercept":1.0}}"#)).unwrap();

        let mut config = Config::default();
        config.model.pipeline_path = Some(dir.path().join("missing_pipe.json"));
        config.model.model_path = Some(bare_path);
        config.model.threshold = Some(0.9);

        let pipeline = InferencePipeline::from_config(&config).unwrap();
        assert_eq!(pipeline.engine().model().kind(), ModelKind::Bare);
        assert_eq!(pipeline.engine().threshold(), 0.9);

        // σ(1) ≈ 0.73 is below the configured 0.9
        let response = pipeline.ingest(&csv_payload(&resting_window(20))).unwrap();
        assert_eq!(response.status, RushStatus::Calm);
    }

    #[test]
    fn test_from_config_without_artifacts_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.model.pipeline_path = Some(dir.path().join("a.json"));
        config.model.model_path = Some(dir.path().join("b.json"));
        assert!(InferencePipeline::from_config(&config).is_err());
    }
}
