//! # Settings Module
//!
//! Every knob of the tuner in one serde-backed bundle, so a host can load
//! and store its configuration as JSON. Missing fields take their defaults.

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

use crate::note::DEFAULT_A4;
use crate::pitch::{DetectorConfig, MIN_BLOCK_SIZE};
use crate::tuner::{TunerConfig, TunerSession};
use crate::tuning::Tuning;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TunerSettings {
    /// Reference pitch for A4 in Hz.
    pub a4: f64,
    pub tuning: Tuning,
    /// Manually selected string (clamped to the tuning).
    pub selected_string: usize,
    pub detector: DetectorConfig,
    pub tuner: TunerConfig,
}

impl Default for TunerSettings {
    fn default() -> Self {
        Self {
            a4: DEFAULT_A4,
            tuning: Tuning::default(),
            selected_string: 0,
            detector: DetectorConfig::default(),
            tuner: TunerConfig::default(),
        }
    }
}

impl TunerSettings {
    /// Parses and validates settings from a JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(json).context("failed to parse tuner settings")?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("failed to serialize tuner settings")
    }

    /// Rejects settings that cannot produce a working tuner.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.a4.is_finite() && self.a4 > 0.0,
            "a4 must be a positive frequency, got {}",
            self.a4
        );
        self.tuning.validate()?;

        let detector = &self.detector;
        ensure!(
            detector.min_frequency.is_finite() && detector.min_frequency > 0.0,
            "detector.min_frequency must be positive, got {}",
            detector.min_frequency
        );
        ensure!(
            detector.max_frequency.is_finite() && detector.max_frequency > detector.min_frequency,
            "detector.max_frequency ({}) must exceed min_frequency ({})",
            detector.max_frequency,
            detector.min_frequency
        );
        ensure!(
            detector.power_threshold >= 0.0,
            "detector.power_threshold must not be negative, got {}",
            detector.power_threshold
        );
        ensure!(
            detector.peak_threshold.is_finite(),
            "detector.peak_threshold must be a number, got {}",
            detector.peak_threshold
        );

        self.tuner.validate().context("invalid tuner config")
    }

    /// Shortest block that can hold the detector's longest lag at this rate.
    pub fn min_block_len(&self, sample_rate: f64) -> usize {
        let (_, max_lag) = self.detector.lag_bounds(sample_rate);
        max_lag.saturating_add(1).max(MIN_BLOCK_SIZE)
    }

    /// Builds a tuner session with the tuning, reference pitch and manual
    /// string applied.
    pub fn session(&self) -> Result<TunerSession> {
        self.validate()?;
        let mut session = TunerSession::new(self.tuning.clone(), self.tuner)?;
        session.set_a4(self.a4)?;
        session.select_string(self.selected_string);
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn defaults_are_valid() {
        let settings = TunerSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.a4, 440.0);
        assert_eq!(settings.tuning, Tuning::GuitarStandardE);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let settings = TunerSettings::from_json(
            r#"{
                "a4": 442.0,
                "tuning": "bass_standard_e",
                "selected_string": 9,
                "tuner": { "auto_string_detection": false, "stable_hold": 0.5 }
            }"#,
        )
        .unwrap();
        assert_eq!(settings.a4, 442.0);
        assert_eq!(settings.tuning, Tuning::BassStandardE);
        assert_eq!(settings.detector, DetectorConfig::default());
        assert!(!settings.tuner.auto_string_detection);
        assert_eq!(settings.tuner.stable_hold, Duration::from_millis(500));
        assert_eq!(settings.tuner.snap_threshold, 25.0);

        let session = settings.session().unwrap();
        assert_eq!(session.selected_string(), 3);
        assert_eq!(session.a4(), 442.0);
    }

    #[test]
    fn json_round_trip() {
        let settings = TunerSettings {
            tuning: Tuning::parse_custom("Open D", "D2 A2 D3 F#3 A3 D4").unwrap(),
            ..TunerSettings::default()
        };
        let back = TunerSettings::from_json(&settings.to_json().unwrap()).unwrap();
        assert_eq!(back, settings);
    }

    #[test]
    fn invalid_settings_are_rejected() {
        assert!(TunerSettings::from_json(r#"{"a4": -1.0}"#).is_err());
        assert!(TunerSettings::from_json(r#"{"a4": "loud"}"#).is_err());
        assert!(
            TunerSettings::from_json(r#"{"detector": {"min_frequency": 500, "max_frequency": 100}}"#)
                .is_err()
        );
        assert!(
            TunerSettings::from_json(r#"{"tuning": {"custom": {"name": "x", "strings": []}}}"#)
                .is_err()
        );
        assert!(TunerSettings::from_json(r#"{"tuner": {"display_range": 0}}"#).is_err());
    }

    #[test]
    fn custom_tuning_with_extreme_octave_is_rejected() {
        let json = r#"{"tuning": {"custom": {"name": "x", "strings": [{"name": "E", "octave": 200000000}]}}}"#;
        assert!(TunerSettings::from_json(json).is_err());

        let settings: TunerSettings = serde_json::from_str(json).unwrap();
        assert!(settings.session().is_err());
        assert!(crate::pipeline::Analyzer::new(&settings).is_err());
    }

    #[test]
    fn min_block_len_covers_lowest_frequency() {
        let settings = TunerSettings::default();
        // 44100 / 70 = 630, so the block must reach lag 630.
        assert_eq!(settings.min_block_len(44100.0), 631);
        assert_eq!(settings.min_block_len(8000.0), MIN_BLOCK_SIZE);
    }
}
