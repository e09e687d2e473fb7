//! # Pitch Math Module
//!
//! Stateless conversions between frequency, MIDI number and cents, plus the
//! nearest-note and nearest-string searches the tuner is built on.
//!
//! ## Conventions
//! - MIDI 69 is A4; the A4 reference is a parameter everywhere
//! - 100 cents is one semitone, 1200 cents one octave
//! - String deviations are wrapped into (-600, 600] cents, so a string is
//!   matched by pitch class regardless of the octave played

use serde::{Deserialize, Serialize};

use crate::note::Note;
use crate::tuning::Tuning;

pub const CENTS_PER_OCTAVE: f64 = 1200.0;
const HALF_OCTAVE: f64 = CENTS_PER_OCTAVE / 2.0;

/// Real-valued MIDI number of a frequency.
pub fn midi_from_frequency(frequency: f64, a4: f64) -> f64 {
    69.0 + 12.0 * (frequency / a4).log2()
}

/// Frequency of a (possibly fractional) MIDI number.
pub fn frequency_from_midi(midi: f64, a4: f64) -> f64 {
    a4 * 2f64.powf((midi - 69.0) / 12.0)
}

/// Signed distance in cents from `target` to `frequency`. Positive is sharp.
pub fn cents_between(frequency: f64, target: f64) -> f64 {
    CENTS_PER_OCTAVE * (frequency / target).log2()
}

/// Finds the closest equal-temperament note to a given frequency.
///
/// # Returns
/// * `Some((note, cents))` - The nearest note and the signed cents offset from it
/// * `None` - If `frequency` or `a4` is not a positive finite number
pub fn nearest_note(frequency: f64, a4: f64) -> Option<(Note, f64)> {
    if !(frequency > 0.0 && frequency.is_finite() && a4 > 0.0 && a4.is_finite()) {
        return None;
    }
    // Finite positive inputs keep the MIDI number within a few tens of
    // thousands, far from i32 overflow.
    let midi = midi_from_frequency(frequency, a4).round() as i32;
    let note = Note::from_midi(midi);
    let cents = cents_between(frequency, note.frequency(a4));
    Some((note, cents))
}

/// Folds a cents value onto its octave-equivalent representative in
/// (-600, 600].
pub fn wrap_cents(cents: f64) -> f64 {
    let mut wrapped = cents % CENTS_PER_OCTAVE;
    if wrapped > HALF_OCTAVE {
        wrapped -= CENTS_PER_OCTAVE;
    }
    if wrapped <= -HALF_OCTAVE {
        wrapped += CENTS_PER_OCTAVE;
    }
    wrapped
}

/// The string closest to a frequency and the wrapped deviation from it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StringDeviation {
    /// Zero-based string index within the tuning.
    pub index: usize,
    /// Deviation in cents, wrapped into (-600, 600].
    pub cents: f64,
}

/// Finds the string of `tuning` whose pitch class is closest to `frequency`.
///
/// Every string is compared by wrapped cents, so the octave the note was
/// played in does not matter. On a tie the lowest string index wins.
/// An empty tuning yields index 0 with 0 cents.
pub fn deviation_to_strings(frequency: f64, tuning: &Tuning, a4: f64) -> StringDeviation {
    let mut best = StringDeviation {
        index: 0,
        cents: 0.0,
    };
    let mut best_abs = f64::MAX;

    for (index, note) in tuning.strings().iter().enumerate() {
        let cents = wrap_cents(cents_between(frequency, note.frequency(a4)));
        if cents.abs() < best_abs {
            best_abs = cents.abs();
            best = StringDeviation { index, cents };
        }
    }
    best
}

/// Moves `frequency` by whole octaves towards `target` until it lies within
/// ±600 cents of it.
///
/// `max_shift` bounds the number of doublings (or halvings); `None` folds
/// without limit.
///
/// # Returns
/// * `(folded, shifts)` - The folded frequency and the signed number of
///   octaves applied (positive when doubled)
pub fn fold_to_octave(frequency: f64, target: f64, max_shift: Option<u32>) -> (f64, i32) {
    if !(frequency > 0.0 && target > 0.0) || !frequency.is_finite() || !target.is_finite() {
        return (frequency, 0);
    }
    let limit = max_shift.map(|m| m as i32);
    let mut folded = frequency;
    let mut shifts = 0i32;

    while cents_between(folded, target) <= -HALF_OCTAVE {
        if limit.is_some_and(|m| shifts >= m) {
            break;
        }
        folded *= 2.0;
        shifts += 1;
    }
    while cents_between(folded, target) >= HALF_OCTAVE {
        if limit.is_some_and(|m| shifts <= -m) {
            break;
        }
        folded /= 2.0;
        shifts -= 1;
    }
    (folded, shifts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::note::{DEFAULT_A4, NoteName};
    use approx::assert_abs_diff_eq;

    #[test]
    fn midi_and_frequency() {
        assert_abs_diff_eq!(midi_from_frequency(440.0, DEFAULT_A4), 69.0);
        assert_abs_diff_eq!(midi_from_frequency(880.0, DEFAULT_A4), 81.0, epsilon = 1e-12);
        assert_abs_diff_eq!(frequency_from_midi(57.0, DEFAULT_A4), 220.0, epsilon = 1e-9);
        assert_abs_diff_eq!(frequency_from_midi(69.0, 432.0), 432.0);
    }

    #[test]
    fn cents() {
        assert_abs_diff_eq!(cents_between(880.0, 440.0), 1200.0, epsilon = 1e-9);
        assert_abs_diff_eq!(cents_between(440.0, 880.0), -1200.0, epsilon = 1e-9);
        assert_abs_diff_eq!(cents_between(440.0, 440.0), 0.0);
    }

    #[test]
    fn nearest_note_of_detuned_a() {
        let (note, cents) = nearest_note(443.0, DEFAULT_A4).unwrap();
        assert_eq!(note, Note::new(NoteName::A, 4));
        assert!(cents > 11.0 && cents < 12.0, "{cents}");

        let (note, cents) = nearest_note(82.0, DEFAULT_A4).unwrap();
        assert_eq!(note, Note::new(NoteName::E, 2));
        assert!(cents < 0.0);
    }

    #[test]
    fn nearest_note_honours_reference() {
        let (note, cents) = nearest_note(432.0, 432.0).unwrap();
        assert_eq!(note, Note::new(NoteName::A, 4));
        assert_abs_diff_eq!(cents, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn nearest_note_for_very_low_frequency() {
        // Below MIDI 0 the pitch class must still wrap correctly.
        let (note, _) = nearest_note(7.0, DEFAULT_A4).unwrap();
        assert_eq!(note.midi(), midi_from_frequency(7.0, DEFAULT_A4).round() as i32);
        assert!(note.midi() < 0);
    }

    #[test]
    fn nearest_note_outside_domain() {
        assert_eq!(nearest_note(0.0, DEFAULT_A4), None);
        assert_eq!(nearest_note(-440.0, DEFAULT_A4), None);
        assert_eq!(nearest_note(f64::NAN, DEFAULT_A4), None);
        assert_eq!(nearest_note(f64::INFINITY, DEFAULT_A4), None);
        assert_eq!(nearest_note(440.0, 0.0), None);
        assert!(nearest_note(f64::MIN_POSITIVE, DEFAULT_A4).is_some());
        assert!(nearest_note(f64::MAX, DEFAULT_A4).is_some());
    }

    #[test]
    fn wrap_cents_range() {
        assert_eq!(wrap_cents(0.0), 0.0);
        assert_eq!(wrap_cents(600.0), 600.0);
        assert_eq!(wrap_cents(-600.0), 600.0);
        assert_eq!(wrap_cents(700.0), -500.0);
        assert_eq!(wrap_cents(-700.0), 500.0);
        assert_eq!(wrap_cents(1250.0), 50.0);
        assert_eq!(wrap_cents(-2410.0), -10.0);
    }

    #[test]
    fn deviation_matches_string_by_pitch_class() {
        let tuning = Tuning::GuitarStandardE;
        let g3 = Note::new(NoteName::G, 3).frequency(DEFAULT_A4);

        let deviation = deviation_to_strings(g3, &tuning, DEFAULT_A4);
        assert_eq!(deviation.index, 3);
        assert_abs_diff_eq!(deviation.cents, 0.0, epsilon = 1e-9);

        // G one octave up still maps onto the G string.
        let deviation = deviation_to_strings(g3 * 2.0, &tuning, DEFAULT_A4);
        assert_eq!(deviation.index, 3);
        assert_abs_diff_eq!(deviation.cents, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn deviation_ties_go_to_lowest_index() {
        let d3 = Note::new(NoteName::D, 3);
        let tuning = Tuning::Custom {
            name: "doubled".into(),
            strings: vec![Note::new(NoteName::A, 2), d3, Note::new(NoteName::G, 3), d3],
        };
        let deviation = deviation_to_strings(d3.frequency(DEFAULT_A4) * 1.01, &tuning, DEFAULT_A4);
        assert_eq!(deviation.index, 1);
    }

    #[test]
    fn deviation_on_empty_tuning() {
        let tuning = Tuning::Custom {
            name: "empty".into(),
            strings: Vec::new(),
        };
        let deviation = deviation_to_strings(440.0, &tuning, DEFAULT_A4);
        assert_eq!(deviation, StringDeviation { index: 0, cents: 0.0 });
    }

    #[test]
    fn fold_unlimited() {
        let e2 = 82.406_889;
        let (folded, shifts) = fold_to_octave(e2 * 4.0, e2, None);
        assert_eq!(shifts, -2);
        assert_abs_diff_eq!(folded, e2, epsilon = 1e-9);

        let (folded, shifts) = fold_to_octave(e2 / 8.0, e2, None);
        assert_eq!(shifts, 3);
        assert_abs_diff_eq!(folded, e2, epsilon = 1e-9);
    }

    #[test]
    fn fold_limited() {
        let e2 = 82.406_889;
        let (folded, shifts) = fold_to_octave(e2 * 4.0, e2, Some(1));
        assert_eq!(shifts, -1);
        assert_abs_diff_eq!(folded, e2 * 2.0, epsilon = 1e-9);

        let (folded, shifts) = fold_to_octave(e2 * 4.0, e2, Some(0));
        assert_eq!(shifts, 0);
        assert_abs_diff_eq!(folded, e2 * 4.0);
    }

    #[test]
    fn fold_ignores_invalid_input() {
        assert_eq!(fold_to_octave(0.0, 440.0, None), (0.0, 0));
        assert_eq!(fold_to_octave(440.0, -1.0, None), (440.0, 0));
    }
}
