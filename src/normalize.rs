//! Unit normalization of raw accelerometer windows.
//!
//! Turns a `RawWindow` (string cells, raw `ax/ay/az` columns) into a
//! `NormalizedWindow` in m/s² with canonical x/y/z axes:
//! - Axis columns are located by name; any missing one is a schema error
//! - Cells are coerced to finite reals within ±`MAX_ABS_ACCEL`; rows that
//!   fail are dropped
//! - Units are detected from the window's peak absolute value
//!
//! Unit detection: mobile OS motion APIs report acceleration in g, raw
//! sensor exports report m/s². A window whose peak |value| across all axes
//! is below `g_unit_threshold` (3.0) is treated as g and multiplied by
//! standard gravity. This is an approximation: a genuine m/s² window that
//! never exceeds 3.0 (device lying flat with gravity removed, for example)
//! is scaled up wrongly, and a g window with a spike above 3 g is left
//! unscaled. Both cases go through silently.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::IngestError;
use crate::types::{
    AccelSample, NormalizedWindow, RawWindow, MAX_ABS_ACCEL, RAW_AXIS_COLUMNS,
    STANDARD_GRAVITY, TIMESTAMP_COLUMN,
};

/// Parameters for unit detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// Peak |value| below which the window is assumed to be in g.
    pub g_unit_threshold: f64,

    /// Multiplier applied to g-unit windows, m/s² per g.
    pub standard_gravity: f64,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            g_unit_threshold: 3.0,
            standard_gravity: STANDARD_GRAVITY,
        }
    }
}

/// Validates and rescales raw windows.
#[derive(Debug, Clone, Default)]
pub struct UnitNormalizer {
    config: NormalizerConfig,
}

impl UnitNormalizer {
    pub fn new(config: NormalizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &NormalizerConfig {
        &self.config
    }

    /// Normalize one raw window.
    ///
    /// Errors:
    /// - `Schema` if any of `ax`, `ay`, `az` is absent
    /// - `EmptyWindow` if no row survives coercion
    pub fn normalize(&self, raw: &RawWindow) -> Result<NormalizedWindow, IngestError> {
        let columns = locate_axis_columns(raw)?;
        let timestamp_column = raw.column_index(TIMESTAMP_COLUMN);

        let mut samples = Vec::with_capacity(raw.len());
        for row in 0..raw.len() {
            let Some(accel) = coerce_row(raw, row, columns) else {
                continue;
            };
            let timestamp_ms = timestamp_column
                .and_then(|col| raw.cell(row, col))
                .and_then(parse_timestamp);
            samples.push(AccelSample {
                timestamp_ms,
                accel,
            });
        }

        let dropped = raw.len() - samples.len();
        if samples.is_empty() {
            return Err(IngestError::EmptyWindow { dropped });
        }

        let peak = peak_abs(&samples);
        let scaled_from_g = peak < self.config.g_unit_threshold;
        if scaled_from_g {
            let g = self.config.standard_gravity;
            for sample in &mut samples {
                for value in &mut sample.accel {
                    *value *= g;
                }
            }
        }

        debug!(
            rows = raw.len(),
            dropped,
            peak_abs = peak,
            scaled_from_g,
            "normalized window"
        );

        NormalizedWindow::with_provenance(samples, scaled_from_g, dropped)
            .ok_or(IngestError::EmptyWindow { dropped })
    }
}

fn locate_axis_columns(raw: &RawWindow) -> Result<[usize; 3], IngestError> {
    let found = RAW_AXIS_COLUMNS.map(|name| raw.column_index(name));
    match found {
        [Some(x), Some(y), Some(z)] => Ok([x, y, z]),
        _ => {
            let missing = RAW_AXIS_COLUMNS
                .iter()
                .zip(found)
                .filter(|(_, idx)| idx.is_none())
                .map(|(name, _)| (*name).to_string())
                .collect();
            Err(IngestError::Schema { missing })
        }
    }
}

fn coerce_row(raw: &RawWindow, row: usize, columns: [usize; 3]) -> Option<[f64; 3]> {
    let mut accel = [0.0; 3];
    for (slot, col) in accel.iter_mut().zip(columns) {
        *slot = coerce_value(raw.cell(row, col)?)?;
    }
    Some(accel)
}

/// A cell counts as numeric only if it parses to a finite, plausible real.
fn coerce_value(cell: &str) -> Option<f64> {
    cell.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && v.abs() <= MAX_ABS_ACCEL)
}

fn parse_timestamp(cell: &str) -> Option<u64> {
    let cell = cell.trim();
    cell.parse::<u64>().ok().or_else(|| {
        cell.parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && *v >= 0.0)
            .map(|v| v as u64)
    })
}

fn peak_abs(samples: &[AccelSample]) -> f64 {
    samples
        .iter()
        .flat_map(|s| s.accel)
        .map(f64::abs)
        .fold(0.0, f64::max)
}
