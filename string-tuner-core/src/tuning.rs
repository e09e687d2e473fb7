//! # Tuning Module
//!
//! Named string tunings and instrument presets.
//!
//! ## Features
//! - Guitar (Standard E, Drop D, Open G), bass and ukulele presets
//! - Custom tunings built from any ordered list of notes
//! - Instrument specs pairing a tuning with string gauges
//!
//! Strings are ordered from string 1 of the tuning (index 0) upwards, as they
//! are listed for the instrument, which is not always lowest to highest pitch
//! (the ukulele is re-entrant).

use anyhow::{Context, Result, bail};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::note::{Note, NoteName};

const fn n(name: NoteName, octave: i32) -> Note {
    Note::new(name, octave)
}

const GUITAR_STANDARD_E: [Note; 6] = [
    n(NoteName::E, 2),
    n(NoteName::A, 2),
    n(NoteName::D, 3),
    n(NoteName::G, 3),
    n(NoteName::B, 3),
    n(NoteName::E, 4),
];
const GUITAR_DROP_D: [Note; 6] = [
    n(NoteName::D, 2),
    n(NoteName::A, 2),
    n(NoteName::D, 3),
    n(NoteName::G, 3),
    n(NoteName::B, 3),
    n(NoteName::E, 4),
];
const GUITAR_OPEN_G: [Note; 6] = [
    n(NoteName::D, 2),
    n(NoteName::G, 2),
    n(NoteName::D, 3),
    n(NoteName::G, 3),
    n(NoteName::B, 3),
    n(NoteName::D, 4),
];
const BASS_STANDARD_E: [Note; 4] = [
    n(NoteName::E, 1),
    n(NoteName::A, 1),
    n(NoteName::D, 2),
    n(NoteName::G, 2),
];
const UKULELE_GCEA: [Note; 4] = [
    n(NoteName::G, 4),
    n(NoteName::C, 4),
    n(NoteName::E, 4),
    n(NoteName::A, 4),
];

/// A string tuning: one of the presets or a custom list of notes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tuning {
    /// E2 A2 D3 G3 B3 E4
    #[default]
    GuitarStandardE,
    /// D2 A2 D3 G3 B3 E4
    GuitarDropD,
    /// D2 G2 D3 G3 B3 D4
    GuitarOpenG,
    /// E1 A1 D2 G2
    BassStandardE,
    /// G4 C4 E4 A4 (re-entrant)
    UkuleleGcea,
    Custom { name: String, strings: Vec<Note> },
}

impl Tuning {
    /// Every named preset, in menu order.
    pub const PRESETS: [Tuning; 5] = [
        Tuning::GuitarStandardE,
        Tuning::GuitarDropD,
        Tuning::GuitarOpenG,
        Tuning::BassStandardE,
        Tuning::UkuleleGcea,
    ];

    /// Builds a custom tuning. Fails on an empty string list or a note
    /// outside the supported octaves.
    pub fn custom(name: impl Into<String>, strings: Vec<Note>) -> Result<Self> {
        let tuning = Tuning::Custom {
            name: name.into(),
            strings,
        };
        tuning.validate()?;
        Ok(tuning)
    }

    /// Checks that the tuning has strings and every note is in range.
    pub fn validate(&self) -> Result<()> {
        if self.is_empty() {
            bail!("tuning '{}' has no strings", self.display_name());
        }
        for (index, note) in self.strings().iter().enumerate() {
            note.check_range().with_context(|| {
                format!("string {index} of tuning '{}'", self.display_name())
            })?;
        }
        Ok(())
    }

    /// Builds a custom tuning from whitespace-separated note names,
    /// e.g. `"D2 A2 D3 F#3 A3 D4"`.
    pub fn parse_custom(name: impl Into<String>, notes: &str) -> Result<Self> {
        let strings = notes
            .split_whitespace()
            .map(str::parse)
            .collect::<Result<Vec<Note>>>()?;
        Self::custom(name, strings)
    }

    pub fn display_name(&self) -> &str {
        match self {
            Tuning::GuitarStandardE => "Standard E",
            Tuning::GuitarDropD => "Drop D",
            Tuning::GuitarOpenG => "Open G",
            Tuning::BassStandardE => "E A D G",
            Tuning::UkuleleGcea => "G C E A",
            Tuning::Custom { name, .. } => name,
        }
    }

    pub fn strings(&self) -> &[Note] {
        match self {
            Tuning::GuitarStandardE => &GUITAR_STANDARD_E,
            Tuning::GuitarDropD => &GUITAR_DROP_D,
            Tuning::GuitarOpenG => &GUITAR_OPEN_G,
            Tuning::BassStandardE => &BASS_STANDARD_E,
            Tuning::UkuleleGcea => &UKULELE_GCEA,
            Tuning::Custom { strings, .. } => strings,
        }
    }

    pub fn string_count(&self) -> usize {
        self.strings().len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings().is_empty()
    }

    /// Clamps a string index into `0..string_count()`; 0 for an empty tuning.
    pub fn clamp_index(&self, index: usize) -> usize {
        index.min(self.string_count().saturating_sub(1))
    }

    /// Target frequency of a string, if the index exists.
    pub fn string_frequency(&self, index: usize, a4: f64) -> Option<f64> {
        self.strings().get(index).map(|note| note.frequency(a4))
    }
}

/// Instrument families the presets are grouped by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Instrument {
    Guitar,
    Bass,
    Ukulele,
}

/// An instrument with its tuning and per-string gauges (inches).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentSpec {
    pub instrument: Instrument,
    pub tuning: Tuning,
    pub gauges: Vec<f64>,
}

impl InstrumentSpec {
    pub fn new(instrument: Instrument, tuning: Tuning, gauges: Vec<f64>) -> Self {
        Self {
            instrument,
            tuning,
            gauges,
        }
    }

    pub fn notes(&self) -> &[Note] {
        self.tuning.strings()
    }

    pub fn string_count(&self) -> usize {
        self.tuning.string_count()
    }

    /// Gauge of a string for thickness rendering.
    ///
    /// Falls back to a linear ramp from the thickest (string 1) to the
    /// thinnest string when the gauge list does not match the string count.
    pub fn gauge_or_ramp(&self, index: usize) -> f64 {
        const THICKEST: f64 = 1.0;
        const THINNEST: f64 = 0.25;

        let count = self.string_count();
        if self.gauges.len() == count {
            if let Some(&gauge) = self.gauges.get(index) {
                return gauge;
            }
        }
        if count <= 1 {
            return THICKEST;
        }
        let t = index.min(count - 1) as f64 / (count - 1) as f64;
        THICKEST + (THINNEST - THICKEST) * t
    }
}

/// Six-string guitar in standard tuning.
pub static GUITAR_6_STANDARD: Lazy<InstrumentSpec> = Lazy::new(|| {
    InstrumentSpec::new(
        Instrument::Guitar,
        Tuning::GuitarStandardE,
        vec![0.052, 0.042, 0.032, 0.024, 0.016, 0.012],
    )
});

/// Four-string bass in standard tuning.
pub static BASS_4_STANDARD: Lazy<InstrumentSpec> = Lazy::new(|| {
    InstrumentSpec::new(
        Instrument::Bass,
        Tuning::BassStandardE,
        vec![0.105, 0.085, 0.065, 0.045],
    )
});

/// Ukulele in re-entrant GCEA tuning.
pub static UKULELE_GCEA_SPEC: Lazy<InstrumentSpec> = Lazy::new(|| {
    InstrumentSpec::new(
        Instrument::Ukulele,
        Tuning::UkuleleGcea,
        vec![0.028, 0.036, 0.032, 0.024],
    )
});

/// The preset instrument for a family.
pub fn instrument_preset(instrument: Instrument) -> &'static InstrumentSpec {
    match instrument {
        Instrument::Guitar => &GUITAR_6_STANDARD,
        Instrument::Bass => &BASS_4_STANDARD,
        Instrument::Ukulele => &UKULELE_GCEA_SPEC,
    }
}
