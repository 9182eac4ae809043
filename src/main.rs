//! Rush Sensing
//!
//! `serve` runs the HTTP inference service; `score` batch-scores a
//! reference feature table and prints a calibration report as JSON.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;

use rush_sensing::calibration::{self, SubjectReport, ThresholdMethod};
use rush_sensing::logging::{init_logging, LogFormat};
use rush_sensing::{server, Config, InferencePipeline};

#[derive(Parser, Debug)]
#[command(name = "rush-sensing", version, about = "Accelerometer rush/calm inference service")]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(long, global = true, env = "RUSH_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log level filter (overridden by RUST_LOG)
    #[arg(long, global = true, env = "RUSH_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log output format: pretty or json
    #[arg(long, global = true, env = "RUSH_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP ingestion and status service
    Serve {
        /// Listen address, e.g. 0.0.0.0:8000
        #[arg(long, env = "RUSH_BIND")]
        bind: Option<String>,
    },

    /// Score a reference feature table and print a calibration report
    Score {
        /// CSV feature table with subject_id/start_ts/end_ts/label columns
        #[arg(long, value_name = "PATH")]
        features: PathBuf,

        /// Report on one subject only; default is one report per subject
        #[arg(long)]
        subject: Option<String>,

        /// Personalized threshold method
        #[arg(long, value_enum, default_value_t = Method::Quantile)]
        method: Method,

        /// Quantile used by `--method quantile`
        #[arg(long, default_value_t = 0.9)]
        q: f64,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Method {
    Quantile,
    MeanStd,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    if let Some(format) = cli.log_format {
        config.logging.format = format;
    }
    init_logging(&config.logging).context("failed to initialize logging")?;

    match cli.command {
        Command::Serve { bind } => {
            if let Some(bind) = bind {
                config.server.bind = bind;
            }
            run_serve(&config).await
        }
        Command::Score {
            features,
            subject,
            method,
            q,
        } => {
            let method = match method {
                Method::Quantile => ThresholdMethod::Quantile { q },
                Method::MeanStd => ThresholdMethod::MeanStd,
            };
            run_score(&config, &features, subject.as_deref(), method)
        }
    }
}

async fn run_serve(config: &Config) -> Result<()> {
    let addr: SocketAddr = config
        .server
        .bind
        .parse()
        .with_context(|| format!("invalid bind address {:?}", config.server.bind))?;
    let pipeline = InferencePipeline::from_config(config).context("failed to start pipeline")?;

    server::serve(addr, Arc::new(pipeline), config.server.max_body_bytes)
        .await
        .context("HTTP server failed")
}

fn run_score(
    config: &Config,
    features: &std::path::Path,
    subject: Option<&str>,
    method: ThresholdMethod,
) -> Result<()> {
    let pipeline = InferencePipeline::from_config(config).context("failed to load classifier")?;
    let table = std::fs::read(features)
        .with_context(|| format!("failed to read {}", features.display()))?;

    let rows = calibration::score_feature_table(&table, pipeline.schema(), pipeline.engine())
        .context("failed to score feature table")?;
    info!(rows = rows.len(), "scored reference table");

    let threshold = pipeline.engine().threshold();
    let reports: Vec<SubjectReport> = match subject {
        Some(id) => vec![calibration::summarize(&rows, Some(id), method, threshold)?],
        None => {
            let ids = calibration::subjects(&rows);
            if ids.is_empty() {
                vec![calibration::summarize(&rows, None, method, threshold)?]
            } else {
                ids.iter()
                    .map(|id| calibration::summarize(&rows, Some(id), method, threshold))
                    .collect::<Result<_, _>>()?
            }
        }
    };

    println!("{}", serde_json::to_string_pretty(&reports)?);
    Ok(())
}
