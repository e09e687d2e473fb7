//! Pitch classes and notes in twelve-tone equal temperament.

use std::fmt;
use std::str::FromStr;

use anyhow::{Context, Result, anyhow, ensure};
use serde::{Deserialize, Serialize};

/// Reference pitch for A4 in Hz.
pub const DEFAULT_A4: f64 = 440.0;

/// Octaves a configured note may use (C-1 is MIDI 0).
pub const MIN_OCTAVE: i32 = -1;
pub const MAX_OCTAVE: i32 = 10;

/// The twelve pitch classes, numbered from C = 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NoteName {
    C = 0,
    #[serde(rename = "C#")]
    Cs,
    D,
    #[serde(rename = "D#")]
    Ds,
    E,
    F,
    #[serde(rename = "F#")]
    Fs,
    G,
    #[serde(rename = "G#")]
    Gs,
    A,
    #[serde(rename = "A#")]
    As,
    B,
}

impl NoteName {
    pub const ALL: [NoteName; 12] = [
        NoteName::C,
        NoteName::Cs,
        NoteName::D,
        NoteName::Ds,
        NoteName::E,
        NoteName::F,
        NoteName::Fs,
        NoteName::G,
        NoteName::Gs,
        NoteName::A,
        NoteName::As,
        NoteName::B,
    ];

    /// Semitones above C.
    pub fn index(self) -> i32 {
        self as i32
    }

    /// Pitch class for any semitone count, wrapping negatives.
    pub fn from_index(index: i32) -> Self {
        Self::ALL[index.rem_euclid(12) as usize]
    }

    pub fn display(self) -> &'static str {
        match self {
            NoteName::C => "C",
            NoteName::Cs => "C#",
            NoteName::D => "D",
            NoteName::Ds => "D#",
            NoteName::E => "E",
            NoteName::F => "F",
            NoteName::Fs => "F#",
            NoteName::G => "G",
            NoteName::Gs => "G#",
            NoteName::A => "A",
            NoteName::As => "A#",
            NoteName::B => "B",
        }
    }

    pub fn is_sharp(self) -> bool {
        matches!(
            self,
            NoteName::Cs | NoteName::Ds | NoteName::Fs | NoteName::Gs | NoteName::As
        )
    }

    /// The natural letter this pitch class is spelled from ("C" for C#).
    pub fn letter(self) -> &'static str {
        &self.display()[..1]
    }
}

impl fmt::Display for NoteName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display())
    }
}

impl FromStr for NoteName {
    type Err = anyhow::Error;

    /// Parses "E", "F#" or "Bb" (case-insensitive letter).
    fn from_str(s: &str) -> Result<Self> {
        Ok(Self::from_index(spelled_offset(s)?))
    }
}

/// Semitones above C of a spelled name, without wrapping: "Cb" is -1 and
/// "B#" is 12.
fn spelled_offset(s: &str) -> Result<i32> {
    let mut chars = s.chars();
    let letter = chars.next().ok_or_else(|| anyhow!("empty note name"))?;
    let natural = match letter.to_ascii_uppercase() {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        other => return Err(anyhow!("unknown note letter '{other}'")),
    };
    let accidental = match chars.as_str() {
        "" => 0,
        "#" | "♯" => 1,
        "b" | "♭" => -1,
        other => return Err(anyhow!("unknown accidental '{other}' in '{s}'")),
    };
    Ok(natural + accidental)
}

/// A pitch class in a specific octave, e.g. E2 or A4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Note {
    pub name: NoteName,
    pub octave: i32,
}

impl Note {
    pub const fn new(name: NoteName, octave: i32) -> Self {
        Self { name, octave }
    }

    /// Note for an integral MIDI number (69 = A4).
    pub fn from_midi(midi: i32) -> Self {
        Self {
            name: NoteName::from_index(midi),
            octave: midi.div_euclid(12) - 1,
        }
    }

    /// Fails unless the octave lies in `MIN_OCTAVE..=MAX_OCTAVE`.
    pub fn check_range(&self) -> Result<()> {
        ensure!(
            (MIN_OCTAVE..=MAX_OCTAVE).contains(&self.octave),
            "note {self} is outside octaves {MIN_OCTAVE}..={MAX_OCTAVE}"
        );
        Ok(())
    }

    pub fn midi(&self) -> i32 {
        (self.octave + 1) * 12 + self.name.index()
    }

    /// Equal-temperament frequency relative to the given A4.
    pub fn frequency(&self, a4: f64) -> f64 {
        a4 * 2f64.powf((self.midi() - 69) as f64 / 12.0)
    }
}

impl PartialOrd for Note {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Note {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.midi().cmp(&other.midi())
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name, self.octave)
    }
}

impl FromStr for Note {
    type Err = anyhow::Error;

    /// Parses names like "E2", "C#3", "Bb-1".
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let split = s
            .find(|c: char| c.is_ascii_digit() || c == '-')
            .ok_or_else(|| anyhow!("note '{s}' has no octave"))?;
        let (name, octave) = s.split_at(split);
        let octave = octave
            .parse::<i32>()
            .with_context(|| format!("invalid octave in note '{s}'"))?;
        let offset = spelled_offset(name)?;
        let midi = octave
            .checked_add(1)
            .and_then(|o| o.checked_mul(12))
            .and_then(|m| m.checked_add(offset))
            .ok_or_else(|| anyhow!("octave out of range in note '{s}'"))?;
        let note = Self::from_midi(midi);
        note.check_range().with_context(|| format!("invalid note '{s}'"))?;
        Ok(note)
    }
}
