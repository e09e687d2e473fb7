// string-tuner-core/src/lib.rs

//! The core logic for a string-instrument tuner.
//! This crate is responsible for signal conditioning, pitch detection,
//! note and string matching, and the smoothing/stability state machine.
//! It is completely headless: audio capture and display are left to the
//! host application, which feeds in sample blocks and reads back
//! [`TunerReading`]s.

pub mod config;
pub mod note;
pub mod pipeline;
pub mod pitch;
pub mod pitch_math;
pub mod preprocess;
pub mod tuner;
pub mod tuning;

use serde::{Deserialize, Serialize};

pub use config::TunerSettings;
pub use note::{DEFAULT_A4, Note, NoteName};
pub use pipeline::{AnalysisWorker, Analyzer, AudioBlock};
pub use pitch::{DetectorConfig, PitchDetector, PitchEstimate};
pub use tuner::{TunerConfig, TunerSession, TunerState};
pub use tuning::{Instrument, InstrumentSpec, Tuning};

/// Represents the display state after a single audio block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TunerReading {
    /// The detected frequency in Hz (0 when nothing was detected).
    pub frequency_hz: f64,
    /// The confidence of the detected frequency (0.0 to 1.0).
    pub confidence: f64,
    /// RMS level of the block.
    pub rms: f32,
    /// The nearest equal-temperament note, if a pitch is being tracked.
    pub nearest_note: Option<Note>,
    /// The deviation from the nearest note in cents.
    pub cents_to_nearest: f64,
    /// Index of the string being tuned.
    pub target_string: usize,
    /// Smoothed deviation from the target string, clamped to the display range.
    pub cents_to_target: f64,
    /// Whether the note has been held in tune long enough.
    pub is_stable: bool,
    /// No signal, tracking, or stable.
    pub state: TunerState,
}
