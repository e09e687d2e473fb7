//! # Preprocessing Module
//!
//! Conditioning applied to every audio block before pitch estimation.
//!
//! ## Features
//! - DC offset removal so the correlation is not biased by a constant term
//! - RMS level measurement for silence gating
//! - Hann windowing, with a cache that survives across same-size blocks

/// Removes the DC offset from a signal by making its average value zero.
///
/// # Arguments
/// * `signal` - Audio signal to process (modified in-place)
pub fn remove_dc(signal: &mut [f32]) {
    let len = signal.len();
    if len == 0 {
        return;
    }
    let mean = signal.iter().sum::<f32>() / len as f32;
    if mean != 0.0 {
        for sample in signal.iter_mut() {
            *sample -= mean;
        }
    }
}

/// Root-mean-square level of a signal. Returns 0 for an empty slice.
pub fn rms(signal: &[f32]) -> f32 {
    if signal.is_empty() {
        return 0.0;
    }
    let sum_sq = signal.iter().map(|&s| s * s).sum::<f32>();
    (sum_sq / signal.len() as f32).sqrt()
}

/// Builds a Hann window of `n` coefficients.
///
/// The window tapers the block edges to zero, which keeps the correlation of
/// the truncated tails from producing spurious peaks.
///
/// # Returns
/// * An empty vector for `n == 0`, `[1.0]` for `n == 1`
pub fn hann_window(n: usize) -> Vec<f32> {
    match n {
        0 => Vec::new(),
        1 => vec![1.0],
        _ => {
            let n_minus_1 = (n - 1) as f32;
            (0..n)
                .map(|i| 0.5 - 0.5 * (2.0 * std::f32::consts::PI * i as f32 / n_minus_1).cos())
                .collect()
        }
    }
}

/// Multiplies `signal` by `window` element-wise.
///
/// Does nothing when the lengths differ.
pub fn apply_window(signal: &mut [f32], window: &[f32]) {
    if signal.len() != window.len() {
        return;
    }
    for (sample, w) in signal.iter_mut().zip(window) {
        *sample *= w;
    }
}

/// A Hann window that is rebuilt only when the block size changes.
#[derive(Debug, Clone, Default)]
pub struct HannWindow {
    coefficients: Vec<f32>,
}

impl HannWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the coefficients for a block of `n` samples.
    pub fn get(&mut self, n: usize) -> &[f32] {
        if self.coefficients.len() != n {
            self.coefficients = hann_window(n);
        }
        &self.coefficients
    }

    /// Size of the currently cached window.
    pub fn len(&self) -> usize {
        self.coefficients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coefficients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn remove_dc_centers_signal() {
        let mut signal = vec![1.0, 2.0, 3.0, 4.0];
        remove_dc(&mut signal);
        assert_abs_diff_eq!(signal.iter().sum::<f32>(), 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(signal[0], -1.5, epsilon = 1e-6);
    }

    #[test]
    fn remove_dc_on_empty_is_noop() {
        let mut signal: Vec<f32> = Vec::new();
        remove_dc(&mut signal);
        assert!(signal.is_empty());
    }

    #[test]
    fn rms_of_constant_and_empty() {
        assert_eq!(rms(&[]), 0.0);
        assert_abs_diff_eq!(rms(&[0.5; 64]), 0.5, epsilon = 1e-6);
        assert_abs_diff_eq!(rms(&[1.0, -1.0, 1.0, -1.0]), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn hann_window_shape() {
        assert!(hann_window(0).is_empty());
        assert_eq!(hann_window(1), vec![1.0]);

        let w = hann_window(5);
        assert_eq!(w.len(), 5);
        assert_abs_diff_eq!(w[0], 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(w[2], 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(w[4], 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(w[1], w[3], epsilon = 1e-6);
    }

    #[test]
    fn apply_window_skips_mismatched_lengths() {
        let mut signal = vec![2.0; 4];
        apply_window(&mut signal, &[0.5; 3]);
        assert_eq!(signal, vec![2.0; 4]);

        apply_window(&mut signal, &[0.5; 4]);
        assert_eq!(signal, vec![1.0; 4]);
    }

    #[test]
    fn window_cache_rebuilds_on_size_change() {
        let mut cache = HannWindow::new();
        assert!(cache.is_empty());
        assert_eq!(cache.get(1024).len(), 1024);
        assert_eq!(cache.get(1024).len(), 1024);
        assert_eq!(cache.get(512).len(), 512);
        assert_eq!(cache.len(), 512);
    }
}
