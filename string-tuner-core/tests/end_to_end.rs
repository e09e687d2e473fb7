//! Full pipeline runs on synthetic tones.

use std::time::{Duration, Instant};

use string_tuner_core::pitch_math::{self, deviation_to_strings};
use string_tuner_core::{
    Analyzer, DEFAULT_A4, DetectorConfig, Note, NoteName, PitchDetector, TunerConfig,
    TunerSettings, TunerState, Tuning,
};

const SAMPLE_RATE: f64 = 44100.0;

fn generate_sine(freq: f64, len: usize) -> Vec<f32> {
    (0..len)
        .map(|i| 0.5 * (2.0 * std::f64::consts::PI * freq * i as f64 / SAMPLE_RATE).sin() as f32)
        .collect()
}

#[test]
fn a440_through_every_stage() {
    let samples = generate_sine(440.0, 2048);

    let mut detector = PitchDetector::new(DetectorConfig::default());
    let estimate = detector.estimate(&samples, SAMPLE_RATE).expect("A4 should be detected");
    assert!(
        (437.0..=443.0).contains(&estimate.frequency),
        "frequency {}",
        estimate.frequency
    );
    assert!(estimate.confidence > 0.8, "confidence {}", estimate.confidence);

    let (note, cents) = pitch_math::nearest_note(estimate.frequency, DEFAULT_A4).unwrap();
    assert_eq!(note, Note::new(NoteName::A, 4));
    assert!(cents.abs() < 5.0);

    // Every string is compared by pitch class, so A4 lands on the A string
    // (two octaves below) rather than on the high E.
    let deviation = deviation_to_strings(estimate.frequency, &Tuning::GuitarStandardE, DEFAULT_A4);
    assert_eq!(deviation.index, 1);
    assert!(deviation.cents.abs() < 5.0, "cents {}", deviation.cents);
    for string in Tuning::GuitarStandardE.strings() {
        let wrapped = pitch_math::wrap_cents(pitch_math::cents_between(
            estimate.frequency,
            string.frequency(DEFAULT_A4),
        ));
        assert!(wrapped.abs() >= deviation.cents.abs());
    }
}

#[test]
fn sustained_tone_becomes_stable() {
    let mut analyzer = Analyzer::new(&TunerSettings::default()).unwrap();
    let samples = generate_sine(440.0, 2048);
    let t0 = Instant::now();
    let block_period = Duration::from_millis(46);

    for k in 0..8u32 {
        let now = t0 + block_period * k;
        let reading = analyzer.process_block(&samples, SAMPLE_RATE, now);
        assert_eq!(reading.target_string, 1);
        assert!(reading.cents_to_target.abs() < 3.0);
        if block_period * k >= Duration::from_millis(200) {
            assert!(reading.is_stable, "block {k} should be stable");
            assert_eq!(reading.state, TunerState::Stable);
        } else {
            assert!(!reading.is_stable, "block {k} should not be stable yet");
        }
    }

    // Silence drops straight back to no signal.
    let reading = analyzer.process_block(&[0.0; 2048], SAMPLE_RATE, t0 + block_period * 8);
    assert_eq!(reading.state, TunerState::NoSignal);
    assert!(!reading.is_stable);
    assert_eq!(reading.nearest_note, None);
}

#[test]
fn flat_d_string_reads_flat() {
    let mut analyzer = Analyzer::new(&TunerSettings::default()).unwrap();
    let d3 = Note::new(NoteName::D, 3).frequency(DEFAULT_A4);
    let samples = generate_sine(d3 * 2f64.powf(-20.0 / 1200.0), 8192);

    let reading = analyzer.process_block(&samples, SAMPLE_RATE, Instant::now());
    assert_eq!(reading.target_string, 2);
    assert!((reading.cents_to_target + 20.0).abs() < 3.0, "cents {}", reading.cents_to_target);
    assert_eq!(reading.state, TunerState::Tracking);
}

#[test]
fn manual_low_e_on_long_block() {
    let settings = TunerSettings {
        tuner: TunerConfig {
            auto_string_detection: false,
            ..TunerConfig::default()
        },
        ..TunerSettings::default()
    };
    let mut analyzer = Analyzer::new(&settings).unwrap();
    let e2 = Note::new(NoteName::E, 2).frequency(DEFAULT_A4);

    let reading = analyzer.process_block(&generate_sine(e2, 8192), SAMPLE_RATE, Instant::now());
    assert_eq!(reading.target_string, 0);
    assert!(reading.cents_to_target.abs() < 5.0, "cents {}", reading.cents_to_target);
    assert_eq!(reading.nearest_note, Some(Note::new(NoteName::E, 2)));
}

#[test]
fn short_blocks_are_dropped_whole() {
    let mut analyzer = Analyzer::new(&TunerSettings::default()).unwrap();
    let reading = analyzer.process_block(&generate_sine(440.0, 256), SAMPLE_RATE, Instant::now());
    assert_eq!(reading.state, TunerState::NoSignal);
    assert_eq!(reading.frequency_hz, 0.0);
    assert!(reading.rms > 0.0);
}
