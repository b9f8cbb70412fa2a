//! Whole-signal FFT helpers built on `rustfft`.

use rustfft::{FftPlanner, num_complex::Complex};

#[must_use]
pub fn forward(samples: &[f32]) -> Vec<Complex<f32>> {
    let mut spectrum: Vec<Complex<f32>> = samples
        .iter()
        .map(|&sample| Complex::new(sample, 0.0))
        .collect();
    if spectrum.is_empty() {
        return spectrum;
    }
    let mut planner = FftPlanner::<f32>::new();
    planner
        .plan_fft_forward(spectrum.len())
        .process(&mut spectrum);
    spectrum
}

/// Inverse transform of a spectrum produced by [`forward`], returning the real part.
#[must_use]
pub fn inverse(mut spectrum: Vec<Complex<f32>>) -> Vec<f32> {
    let len = spectrum.len();
    if len == 0 {
        return Vec::new();
    }
    let mut planner = FftPlanner::<f32>::new();
    planner.plan_fft_inverse(len).process(&mut spectrum);
    let scale = 1.0 / len as f32;
    spectrum.into_iter().map(|bin| bin.re * scale).collect()
}

/// Magnitudes of the non-negative frequency bins (`len / 2 + 1` of them).
#[must_use]
pub fn magnitudes(spectrum: &[Complex<f32>]) -> Vec<f32> {
    let half = spectrum.len() / 2 + 1;
    spectrum.iter().take(half).map(|bin| bin.norm()).collect()
}

#[must_use]
pub fn bin_frequency(bin: usize, fft_len: usize, sample_rate: u32) -> f32 {
    if fft_len == 0 {
        return 0.0;
    }
    bin as f32 * sample_rate as f32 / fft_len as f32
}

/// Scales a positive-frequency bin together with its negative mirror so the signal stays real.
pub fn scale_bin(spectrum: &mut [Complex<f32>], bin: usize, gain: f32) {
    let len = spectrum.len();
    if bin >= len {
        return;
    }
    spectrum[bin] *= gain;
    let mirror = (len - bin) % len;
    if mirror != bin {
        spectrum[mirror] *= gain;
    }
}

/// Multiplies every bin by `gain_at(frequency_hz)` and transforms back.
#[must_use]
pub fn apply_gain_curve<F>(samples: &[f32], sample_rate: u32, gain_at: F) -> Vec<f32>
where
    F: Fn(f32) -> f32,
{
    let mut spectrum = forward(samples);
    let len = spectrum.len();
    for bin in 0..=len / 2 {
        let gain = gain_at(bin_frequency(bin, len, sample_rate));
        scale_bin(&mut spectrum, bin, gain);
    }
    inverse(spectrum)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unity_curve_reconstructs_signal() {
        let samples: Vec<f32> = (0..1_000).map(|index| ((index * 7) % 13) as f32 / 13.0 - 0.5).collect();
        let output = apply_gain_curve(&samples, 44_100, |_| 1.0);
        for (left, right) in samples.iter().zip(output.iter()) {
            assert!((left - right).abs() < 1e-4);
        }
    }

    #[test]
    fn zero_curve_silences_signal() {
        let samples = vec![0.3_f32; 512];
        let output = apply_gain_curve(&samples, 44_100, |_| 0.0);
        assert!(output.iter().all(|sample| sample.abs() < 1e-6));
    }

    #[test]
    fn sine_energy_lands_in_its_bin() {
        let len = 1_024;
        let samples: Vec<f32> = (0..len)
            .map(|index| (index as f32 * 32.0 / len as f32 * std::f32::consts::TAU).sin())
            .collect();
        let mags = magnitudes(&forward(&samples));
        let loudest = mags
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(bin, _)| bin);
        assert_eq!(loudest, Some(32));
    }
}
