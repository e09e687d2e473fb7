//! # Pitch Detection Module
//!
//! Monophonic fundamental-frequency estimation using normalized
//! autocorrelation.
//!
//! ## Features
//! - Normalized cross-correlation, so the peak threshold means the same thing
//!   for quiet and loud signals
//! - Prefix sums of squared samples: each lag's energy terms are O(1)
//! - First-peak policy to prefer the fundamental over its sub-harmonics,
//!   with a global-maximum fallback
//! - Parabolic interpolation for sub-sample accuracy
//! - Amplitude gating to filter out silence

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::preprocess::{self, HannWindow};

/// Blocks shorter than this are never analysed.
pub const MIN_BLOCK_SIZE: usize = 512;

/// The result of a successful pitch estimate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PitchEstimate {
    /// Fundamental frequency in Hz.
    pub frequency: f64,
    /// Normalized correlation at the chosen lag, clamped to 0.0..=1.0.
    pub confidence: f64,
}

/// Tuning knobs of the [`PitchDetector`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Lowest frequency searched, in Hz.
    pub min_frequency: f64,
    /// Highest frequency searched, in Hz.
    pub max_frequency: f64,
    /// Blocks whose RMS level is below this are treated as silence.
    pub power_threshold: f32,
    /// Minimum normalized correlation for the first-peak policy.
    pub peak_threshold: f64,
    /// Accept the first local peak above `peak_threshold` instead of the
    /// global maximum.
    pub use_first_peak: bool,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            min_frequency: 70.0,
            max_frequency: 1000.0,
            power_threshold: 0.01,
            peak_threshold: 0.4,
            use_first_peak: true,
        }
    }
}

impl DetectorConfig {
    /// Lag search range `[min_lag, max_lag)` for the given sample rate.
    pub fn lag_bounds(&self, sample_rate: f64) -> (usize, usize) {
        let max_lag = (sample_rate / self.min_frequency).floor() as usize;
        let min_lag = ((sample_rate / self.max_frequency).floor() as usize).max(2);
        (min_lag, max_lag)
    }
}

/// Normalized autocorrelation pitch detector.
///
/// The detector keeps its scratch buffers between calls, so feeding it
/// blocks of a constant size does not allocate after the first block.
#[derive(Debug, Clone, Default)]
pub struct PitchDetector {
    config: DetectorConfig,
    window: HannWindow,
    frame: Vec<f32>,
    prefix_energy: Vec<f64>,
    correlation: Vec<f64>,
}

impl PitchDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Estimates the fundamental frequency of one block of audio.
    ///
    /// # Arguments
    /// * `samples` - Mono audio block, at least [`MIN_BLOCK_SIZE`] samples
    /// * `sample_rate` - Sample rate in Hz
    ///
    /// # Returns
    /// * `Some(estimate)` - Detected frequency and confidence
    /// * `None` - No pitch (short block, silence, degenerate range, or no peak)
    pub fn estimate(&mut self, samples: &[f32], sample_rate: f64) -> Option<PitchEstimate> {
        let n = samples.len();
        if n < MIN_BLOCK_SIZE || !(sample_rate > 0.0) {
            trace!(n, sample_rate, "rejecting block: too short or bad sample rate");
            return None;
        }

        // --- Noise Gate ---
        let level = preprocess::rms(samples);
        if level < self.config.power_threshold {
            trace!(level, "rejecting block: below power threshold");
            return None;
        }

        // --- Step 1: DC removal and windowing ---
        self.frame.clear();
        self.frame.extend_from_slice(samples);
        preprocess::remove_dc(&mut self.frame);
        preprocess::apply_window(&mut self.frame, self.window.get(n));

        // --- Step 2: Lag bounds ---
        let (min_lag, max_lag) = self.config.lag_bounds(sample_rate);
        if min_lag >= max_lag || max_lag >= n {
            trace!(min_lag, max_lag, n, "rejecting block: empty lag range");
            return None;
        }

        // --- Step 3: Prefix energy ---
        self.prefix_energy.clear();
        self.prefix_energy.reserve(n + 1);
        self.prefix_energy.push(0.0);
        let mut running = 0.0;
        for &x in &self.frame {
            running += x as f64 * x as f64;
            self.prefix_energy.push(running);
        }

        // Lags min_lag - 1 ..= max_lag are addressable; NaN marks "not computed".
        let first_lag = min_lag - 1;
        self.correlation.clear();
        self.correlation.resize(max_lag - first_lag + 1, f64::NAN);
        let mut corr = Correlator {
            frame: &self.frame,
            prefix_energy: &self.prefix_energy,
            cache: &mut self.correlation,
            first_lag,
        };

        // --- Step 4 & 5: Peak picking ---
        let mut best_lag = None;
        if self.config.use_first_peak {
            best_lag = (min_lag..max_lag - 1).find(|&tau| {
                let c = corr.at(tau);
                c > corr.at(tau - 1) && c >= corr.at(tau + 1) && c > self.config.peak_threshold
            });
        }
        if best_lag.is_none() {
            let mut max_value = f64::MIN;
            for tau in min_lag..max_lag {
                let c = corr.at(tau);
                if c > max_value {
                    max_value = c;
                    best_lag = Some(tau);
                }
            }
        }
        let Some(best_lag) = best_lag else {
            trace!("rejecting block: no correlation peak");
            return None;
        };

        // --- Step 6: Parabolic interpolation ---
        let c_prev = corr.at(best_lag - 1);
        let c_best = corr.at(best_lag);
        let c_next = corr.at(best_lag + 1);
        let denominator = c_prev - 2.0 * c_best + c_next;
        let delta = if denominator == 0.0 {
            0.0
        } else {
            0.5 * (c_prev - c_next) / denominator
        };
        let refined_lag = (best_lag as f64 + delta).clamp(min_lag as f64, (max_lag - 1) as f64);

        let frequency = sample_rate / refined_lag;
        let confidence = c_best.clamp(0.0, 1.0);

        // Final guard: only frequencies inside the configured range.
        if !frequency.is_finite()
            || frequency < self.config.min_frequency
            || frequency > self.config.max_frequency
        {
            trace!(frequency, "rejecting block: frequency out of range");
            return None;
        }

        Some(PitchEstimate {
            frequency,
            confidence,
        })
    }
}

/// Lazily evaluated normalized correlation over a fixed lag range.
struct Correlator<'a> {
    frame: &'a [f32],
    prefix_energy: &'a [f64],
    cache: &'a mut [f64],
    first_lag: usize,
}

impl Correlator<'_> {
    fn at(&mut self, tau: usize) -> f64 {
        let slot = &mut self.cache[tau - self.first_lag];
        if slot.is_nan() {
            *slot = normalized_correlation(self.frame, self.prefix_energy, tau);
        }
        *slot
    }
}

/// `Σ x[i]·x[i+τ] / sqrt(E_lead · E_trail)`, using prefix sums for the
/// energies. Returns 0 when either energy term vanishes.
fn normalized_correlation(frame: &[f32], prefix_energy: &[f64], tau: usize) -> f64 {
    let n = frame.len();
    if tau >= n {
        return -1.0;
    }
    let count = n - tau;
    let sum: f64 = frame[..count]
        .iter()
        .zip(&frame[tau..])
        .map(|(&a, &b)| a as f64 * b as f64)
        .sum();
    let leading = prefix_energy[count] - prefix_energy[0];
    let trailing = prefix_energy[n] - prefix_energy[tau];
    let denominator = leading * trailing;
    if denominator <= f64::MIN_POSITIVE {
        return 0.0;
    }
    sum / denominator.sqrt()
}
