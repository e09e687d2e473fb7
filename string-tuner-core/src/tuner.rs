//! # Tuner Module
//!
//! The tuner session turns a stream of raw pitch estimates into stable,
//! display-ready deviations from a target string.
//!
//! ## Behaviour per update
//! 1. Gate on frequency, confidence and RMS; a failed gate means "no signal"
//! 2. Resolve the nearest note and the target string (automatic, manual, or
//!    manual with a soft switch to a clearly better string)
//! 3. Fold the frequency by octaves towards the target string
//! 4. Smooth the cents with an exponential moving average that snaps on jumps
//! 5. Declare the note stable once it stays inside the window long enough
//!
//! A session is a single-writer object: every update depends on the previous
//! one, so updates must be applied in block order.

use std::time::{Duration, Instant};

use anyhow::{Result, ensure};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::TunerReading;
use crate::note::{DEFAULT_A4, Note};
use crate::pitch_math::{self, StringDeviation};
use crate::tuning::Tuning;

/// Thresholds and switches of a [`TunerSession`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TunerConfig {
    /// Estimates below this confidence are treated as no signal.
    pub min_confidence: f64,
    /// Blocks below this RMS level are treated as no signal.
    pub min_rms: f32,
    /// Weight of the newest value in the moving average (0.0..=1.0).
    pub smooth_alpha: f64,
    /// A jump of at least this many cents bypasses smoothing.
    pub snap_threshold: f64,
    /// Half-width of the "in tune" window in cents.
    pub stable_cents: f64,
    /// How long the deviation must stay in the window to count as stable.
    #[serde(with = "duration_secs")]
    pub stable_hold: Duration,
    /// Displayed cents are clamped to ±this.
    pub display_range: f64,
    /// Pick the target string from the played pitch instead of the manual
    /// selection.
    pub auto_string_detection: bool,
    /// Allow a manual selection to be overridden when it is clearly wrong.
    pub soft_switch: bool,
    /// Manual string deviation (cents, unfolded) above which a soft switch
    /// is considered.
    pub soft_switch_manual_if_worse_than: f64,
    /// The best string must be within this many cents for a soft switch.
    pub soft_switch_best_if_better_than: f64,
    /// Fold the measured frequency by octaves towards the target string.
    pub octave_folding: bool,
    /// Octave shifts allowed when folding towards a manual string.
    /// 0 means unlimited.
    pub max_octave_shift_when_manual: u32,
}

impl Default for TunerConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.25,
            min_rms: 0.01,
            smooth_alpha: 0.25,
            snap_threshold: 25.0,
            stable_cents: 3.0,
            stable_hold: Duration::from_millis(200),
            display_range: 50.0,
            auto_string_detection: true,
            soft_switch: true,
            soft_switch_manual_if_worse_than: 200.0,
            soft_switch_best_if_better_than: 50.0,
            octave_folding: true,
            max_octave_shift_when_manual: 1,
        }
    }
}

impl TunerConfig {
    /// The plain fixed-string tuner: the manual string is always the target
    /// and the frequency is compared to it as measured.
    pub fn fixed_string() -> Self {
        Self {
            auto_string_detection: false,
            soft_switch: false,
            octave_folding: false,
            ..Self::default()
        }
    }

    /// Checks that every threshold is usable.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.min_confidence.is_finite() && self.min_confidence >= 0.0,
            "min_confidence must be a non-negative number, got {}",
            self.min_confidence
        );
        ensure!(
            self.min_rms.is_finite() && self.min_rms >= 0.0,
            "min_rms must be a non-negative number, got {}",
            self.min_rms
        );
        ensure!(
            (0.0..=1.0).contains(&self.smooth_alpha),
            "smooth_alpha must be within 0..=1, got {}",
            self.smooth_alpha
        );
        ensure!(
            self.snap_threshold >= 0.0,
            "snap_threshold must not be negative, got {}",
            self.snap_threshold
        );
        ensure!(
            self.stable_cents >= 0.0,
            "stable_cents must not be negative, got {}",
            self.stable_cents
        );
        ensure!(
            self.display_range > 0.0,
            "display_range must be positive, got {}",
            self.display_range
        );
        Ok(())
    }

    /// Shift limit for folding, or `None` for unlimited.
    fn fold_limit(&self) -> Option<u32> {
        if self.auto_string_detection || self.max_octave_shift_when_manual == 0 {
            None
        } else {
            Some(self.max_octave_shift_when_manual)
        }
    }
}

/// Where the session currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TunerState {
    /// Nothing usable is being played.
    NoSignal,
    /// A pitch is being followed but is not (yet) in tune.
    Tracking,
    /// The pitch has stayed within the stable window for the hold time.
    Stable,
}

/// Per-session smoothing and stability state.
#[derive(Debug, Clone)]
pub struct TunerSession {
    config: TunerConfig,
    a4: f64,
    tuning: Tuning,
    selected_string: usize,
    target_string: usize,

    frequency_hz: f64,
    confidence: f64,
    rms: f32,
    nearest_note: Option<Note>,
    cents_to_nearest: f64,
    cents_to_target: f64,

    smoothed_cents: Option<f64>,
    stable_since: Option<Instant>,
    is_stable: bool,
}

impl TunerSession {
    /// Creates a session tuned to A4 = 440 Hz.
    ///
    /// Fails if the tuning is empty or out of range, or the config is invalid.
    pub fn new(tuning: Tuning, config: TunerConfig) -> Result<Self> {
        tuning.validate()?;
        config.validate()?;
        Ok(Self {
            config,
            a4: DEFAULT_A4,
            tuning,
            selected_string: 0,
            target_string: 0,
            frequency_hz: 0.0,
            confidence: 0.0,
            rms: 0.0,
            nearest_note: None,
            cents_to_nearest: 0.0,
            cents_to_target: 0.0,
            smoothed_cents: None,
            stable_since: None,
            is_stable: false,
        })
    }

    pub fn config(&self) -> &TunerConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: TunerConfig) -> Result<()> {
        config.validate()?;
        self.config = config;
        Ok(())
    }

    pub fn a4(&self) -> f64 {
        self.a4
    }

    /// Changes the reference pitch. Takes effect on the next update.
    pub fn set_a4(&mut self, a4: f64) -> Result<()> {
        ensure!(a4.is_finite() && a4 > 0.0, "A4 must be a positive frequency, got {a4}");
        self.a4 = a4;
        Ok(())
    }

    pub fn tuning(&self) -> &Tuning {
        &self.tuning
    }

    /// Switches tuning and clamps the manual selection into the new range.
    pub fn set_tuning(&mut self, tuning: Tuning) -> Result<()> {
        tuning.validate()?;
        self.tuning = tuning;
        self.selected_string = self.tuning.clamp_index(self.selected_string);
        self.target_string = self.tuning.clamp_index(self.target_string);
        Ok(())
    }

    pub fn selected_string(&self) -> usize {
        self.selected_string
    }

    /// Selects the manual string; out-of-range indices are clamped.
    pub fn select_string(&mut self, index: usize) {
        self.selected_string = self.tuning.clamp_index(index);
    }

    pub fn target_string(&self) -> usize {
        self.target_string
    }

    pub fn is_stable(&self) -> bool {
        self.is_stable
    }

    pub fn state(&self) -> TunerState {
        match (self.smoothed_cents, self.is_stable) {
            (None, _) => TunerState::NoSignal,
            (Some(_), false) => TunerState::Tracking,
            (Some(_), true) => TunerState::Stable,
        }
    }

    /// Drops all history and returns to the no-signal state.
    pub fn reset(&mut self) {
        self.frequency_hz = 0.0;
        self.confidence = 0.0;
        self.rms = 0.0;
        self.handle_no_signal();
    }

    /// Applies one detector result.
    ///
    /// # Arguments
    /// * `frequency` - Detected frequency in Hz, or 0 when nothing was detected
    /// * `confidence` - Detector confidence (0.0 to 1.0)
    /// * `rms` - RMS level of the analysed block
    /// * `now` - Time of the block, used for the stability hold
    pub fn update(&mut self, frequency: f64, confidence: f64, rms: f32, now: Instant) -> TunerReading {
        self.frequency_hz = frequency;
        self.confidence = confidence;
        self.rms = rms;

        if !(frequency > 0.0)
            || !frequency.is_finite()
            || !(confidence >= self.config.min_confidence)
            || !(rms >= self.config.min_rms)
        {
            self.handle_no_signal();
            return self.reading();
        }

        let Some((note, cents)) = pitch_math::nearest_note(frequency, self.a4) else {
            self.handle_no_signal();
            return self.reading();
        };
        self.nearest_note = Some(note);
        self.cents_to_nearest = cents;

        // --- Target string ---
        let manual = self.tuning.clamp_index(self.selected_string);
        let best = pitch_math::deviation_to_strings(frequency, &self.tuning, self.a4);
        let target = self.choose_target(frequency, manual, &best);
        self.target_string = target;

        // --- Deviation from the target, folded by octaves ---
        let target_frequency = self.tuning.strings()[target].frequency(self.a4);
        let (folded, shifts) = if self.config.octave_folding {
            pitch_math::fold_to_octave(frequency, target_frequency, self.config.fold_limit())
        } else {
            (frequency, 0)
        };
        let raw = pitch_math::cents_between(folded, target_frequency);

        let smoothed = self.smooth(raw);
        self.update_stability(smoothed, now);
        self.cents_to_target = smoothed.clamp(-self.config.display_range, self.config.display_range);

        debug!(
            frequency,
            folded,
            target_frequency,
            raw,
            smoothed,
            display = self.cents_to_target,
            nearest = %note,
            confidence,
            rms,
            stable = self.is_stable,
            target,
            shifts,
            best_index = best.index,
            best_cents = best.cents,
            "tuner update"
        );

        self.reading()
    }

    /// Snapshot of everything a display needs.
    pub fn reading(&self) -> TunerReading {
        TunerReading {
            frequency_hz: self.frequency_hz,
            confidence: self.confidence,
            rms: self.rms,
            nearest_note: self.nearest_note,
            cents_to_nearest: self.cents_to_nearest,
            target_string: self.target_string,
            cents_to_target: self.cents_to_target,
            is_stable: self.is_stable,
            state: self.state(),
        }
    }

    fn choose_target(&self, frequency: f64, manual: usize, best: &StringDeviation) -> usize {
        if self.config.auto_string_detection {
            return best.index;
        }
        if self.config.soft_switch {
            let manual_frequency = self.tuning.strings()[manual].frequency(self.a4);
            let manual_raw = pitch_math::cents_between(frequency, manual_frequency);
            if manual_raw.abs() > self.config.soft_switch_manual_if_worse_than
                && best.cents.abs() < self.config.soft_switch_best_if_better_than
            {
                return best.index;
            }
        }
        manual
    }

    fn handle_no_signal(&mut self) {
        self.nearest_note = None;
        self.cents_to_nearest = 0.0;
        self.is_stable = false;
        self.stable_since = None;
        self.smoothed_cents = None;
        self.target_string = self.tuning.clamp_index(self.selected_string);
        self.cents_to_target = 0.0;
    }

    /// Exponential smoothing that snaps to the raw value on large jumps.
    fn smooth(&mut self, raw: f64) -> f64 {
        let next = match self.smoothed_cents {
            None => raw,
            Some(prev) if (raw - prev).abs() >= self.config.snap_threshold => raw,
            Some(prev) => {
                let alpha = self.config.smooth_alpha.clamp(0.0, 1.0);
                alpha * raw + (1.0 - alpha) * prev
            }
        };
        self.smoothed_cents = Some(next);
        next
    }

    /// "In tune" once |cents| <= stable_cents has held for stable_hold.
    fn update_stability(&mut self, smoothed: f64, now: Instant) {
        if smoothed.abs() <= self.config.stable_cents {
            let since = *self.stable_since.get_or_insert(now);
            self.is_stable = now.saturating_duration_since(since) >= self.config.stable_hold;
        } else {
            self.stable_since = None;
            self.is_stable = false;
        }
    }
}

/// Serializes a [`Duration`] as fractional seconds.
mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(duration.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(D::Error::custom)
    }
}
