//! Feature extraction from normalized windows.
//!
//! Produces the fixed 18-entry `FeatureVector` the classifier was trained on:
//! - Per-axis mean, population standard deviation, min and max (x, y, z)
//! - The same four statistics of the per-sample magnitude
//! - Band energy and peak frequency of the magnitude spectrum
//!
//! The spectral step removes the DC component, takes the one-sided DFT at a
//! nominal sampling rate, sums squared bin magnitudes inside the gait
//! cadence band and reports the frequency of the strongest bin.
//!
//! Extraction is a pure function of the window: no state is carried between
//! calls, so the same window always yields the same vector.

use rustfft::{num_complex::Complex, FftPlanner};
use serde::{Deserialize, Serialize};

use crate::types::{Axis, FeatureVector, NormalizedWindow, FEATURE_COUNT};

/// Parameters of the spectral step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Nominal sampling rate of incoming windows (Hz). Timestamps are not
    /// used to estimate it.
    pub sample_rate_hz: f64,
    /// Lower edge of the energy band (Hz, inclusive).
    pub band_low_hz: f64,
    /// Upper edge of the energy band (Hz, inclusive).
    pub band_high_hz: f64,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 20.0,
            band_low_hz: 0.5,
            band_high_hz: 4.0,
        }
    }
}

/// Mean, population std, min and max of a series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SummaryStats {
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

impl SummaryStats {
    /// Statistics of a non-empty series.
    ///
    /// Uses the population denominator (n). A single value or a constant
    /// series yields std = 0.
    pub fn of(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self {
                mean: 0.0,
                std: 0.0,
                min: 0.0,
                max: 0.0,
            };
        }

        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let std = if values.len() < 2 {
            0.0
        } else {
            // Centered two-pass sum of squares; never negative.
            let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
            var.sqrt()
        };
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        Self {
            mean,
            std,
            min,
            max,
        }
    }

    fn as_array(&self) -> [f64; 4] {
        [self.mean, self.std, self.min, self.max]
    }
}

/// Spectral summary of the magnitude series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpectralFeatures {
    /// Σ|X_k|² over bins inside the band.
    pub band_energy: f64,
    /// Frequency (Hz) of the largest-magnitude bin.
    pub peak_frequency_hz: f64,
}

/// Computes feature vectors from normalized windows.
#[derive(Debug, Clone, Default)]
pub struct FeatureExtractor {
    config: FeatureConfig,
}

impl FeatureExtractor {
    pub fn new(config: FeatureConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    /// Extract the 18 features of one window.
    pub fn extract(&self, window: &NormalizedWindow) -> FeatureVector {
        let mut values = [0.0; FEATURE_COUNT];

        for (i, axis) in Axis::ALL.into_iter().enumerate() {
            let stats = SummaryStats::of(&window.axis(axis));
            values[i * 4..i * 4 + 4].copy_from_slice(&stats.as_array());
        }

        let magnitude = window.magnitudes();
        values[12..16].copy_from_slice(&SummaryStats::of(&magnitude).as_array());

        let spectral = self.spectral_features(&magnitude);
        values[16] = spectral.band_energy;
        values[17] = spectral.peak_frequency_hz;

        FeatureVector::from_values(values)
    }

    /// Band energy and peak frequency of a series.
    ///
    /// The series is mean-centered first. Only the one-sided spectrum
    /// (bins 0..=n/2) is considered. On ties the lowest bin wins. Series
    /// shorter than two samples have no spectrum and yield zeros.
    pub fn spectral_features(&self, series: &[f64]) -> SpectralFeatures {
        let n = series.len();
        if n < 2 {
            return SpectralFeatures {
                band_energy: 0.0,
                peak_frequency_hz: 0.0,
            };
        }

        let mean = series.iter().sum::<f64>() / n as f64;
        let mut buffer: Vec<Complex<f64>> = series
            .iter()
            .map(|&v| Complex::new(v - mean, 0.0))
            .collect();

        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(n);
        fft.process(&mut buffer);

        let fs = self.config.sample_rate_hz;
        let mut band_energy = 0.0;
        let mut peak_bin = 0usize;
        let mut peak_magnitude = f64::NEG_INFINITY;

        for (k, bin) in buffer.iter().take(n / 2 + 1).enumerate() {
            let magnitude = bin.norm();
            let frequency = bin_frequency(k, n, fs);

            if frequency >= self.config.band_low_hz && frequency <= self.config.band_high_hz {
                band_energy += magnitude * magnitude;
            }
            if magnitude > peak_magnitude {
                peak_magnitude = magnitude;
                peak_bin = k;
            }
        }

        SpectralFeatures {
            band_energy,
            peak_frequency_hz: bin_frequency(peak_bin, n, fs),
        }
    }
}

/// Center frequency of DFT bin `k` for an `n`-point transform at `fs` Hz.
fn bin_frequency(k: usize, n: usize, fs: f64) -> f64 {
    // Multiply before dividing so band edges like 4.0 Hz land exactly.
    k as f64 * fs / n as f64
}
