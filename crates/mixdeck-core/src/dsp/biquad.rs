//! Second-order IIR filters from the RBJ Audio EQ Cookbook, run in direct form I.

use std::f64::consts::PI;

use tracing::debug;

use crate::model::{AudioBuffer, EqBand};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoeffs {
    pub b0: f32,
    pub b1: f32,
    pub b2: f32,
    pub a1: f32,
    pub a2: f32,
}

impl BiquadCoeffs {
    pub const IDENTITY: Self = Self {
        b0: 1.0,
        b1: 0.0,
        b2: 0.0,
        a1: 0.0,
        a2: 0.0,
    };

    #[must_use]
    pub fn peaking(sample_rate: u32, frequency: f32, gain_db: f32, q: f32) -> Self {
        let Some(w0) = angular_frequency(sample_rate, frequency) else {
            return Self::IDENTITY;
        };
        let a = 10.0_f64.powf(f64::from(gain_db) / 40.0);
        let alpha = w0.sin() / (2.0 * f64::from(q.max(0.01)));
        let cos_w0 = w0.cos();

        Self::normalized(
            1.0 + alpha * a,
            -2.0 * cos_w0,
            1.0 - alpha * a,
            1.0 + alpha / a,
            -2.0 * cos_w0,
            1.0 - alpha / a,
        )
    }

    #[must_use]
    pub fn high_shelf(sample_rate: u32, frequency: f32, gain_db: f32, slope: f32) -> Self {
        let Some(w0) = angular_frequency(sample_rate, frequency) else {
            return Self::IDENTITY;
        };
        let a = 10.0_f64.powf(f64::from(gain_db) / 40.0);
        let slope = f64::from(slope.clamp(0.01, 1.0));
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / 2.0 * ((a + 1.0 / a) * (1.0 / slope - 1.0) + 2.0).sqrt();
        let two_sqrt_a_alpha = 2.0 * a.sqrt() * alpha;

        Self::normalized(
            a * ((a + 1.0) + (a - 1.0) * cos_w0 + two_sqrt_a_alpha),
            -2.0 * a * ((a - 1.0) + (a + 1.0) * cos_w0),
            a * ((a + 1.0) + (a - 1.0) * cos_w0 - two_sqrt_a_alpha),
            (a + 1.0) - (a - 1.0) * cos_w0 + two_sqrt_a_alpha,
            2.0 * ((a - 1.0) - (a + 1.0) * cos_w0),
            (a + 1.0) - (a - 1.0) * cos_w0 - two_sqrt_a_alpha,
        )
    }

    /// Band-pass with 0 dB peak gain.
    #[must_use]
    pub fn band_pass(sample_rate: u32, frequency: f32, q: f32) -> Self {
        let Some(w0) = angular_frequency(sample_rate, frequency) else {
            return Self::IDENTITY;
        };
        let alpha = w0.sin() / (2.0 * f64::from(q.max(0.01)));
        let cos_w0 = w0.cos();

        Self::normalized(alpha, 0.0, -alpha, 1.0 + alpha, -2.0 * cos_w0, 1.0 - alpha)
    }

    fn normalized(b0: f64, b1: f64, b2: f64, a0: f64, a1: f64, a2: f64) -> Self {
        Self {
            b0: (b0 / a0) as f32,
            b1: (b1 / a0) as f32,
            b2: (b2 / a0) as f32,
            a1: (a1 / a0) as f32,
            a2: (a2 / a0) as f32,
        }
    }
}

fn angular_frequency(sample_rate: u32, frequency: f32) -> Option<f64> {
    let nyquist = f64::from(sample_rate) / 2.0;
    let frequency = f64::from(frequency);
    if sample_rate == 0 || frequency <= 0.0 || frequency >= nyquist {
        return None;
    }
    Some(2.0 * PI * frequency / f64::from(sample_rate))
}

#[derive(Debug, Clone, Copy, Default)]
struct BiquadState {
    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

impl BiquadState {
    #[inline]
    fn process(&mut self, input: f32, coeffs: &BiquadCoeffs) -> f32 {
        let output = coeffs.b0 * input + coeffs.b1 * self.x1 + coeffs.b2 * self.x2
            - coeffs.a1 * self.y1
            - coeffs.a2 * self.y2;

        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = output;

        output
    }
}

#[must_use]
pub fn filter_samples(samples: &[f32], coeffs: &BiquadCoeffs) -> Vec<f32> {
    let mut state = BiquadState::default();
    samples
        .iter()
        .map(|&sample| state.process(sample, coeffs))
        .collect()
}

pub fn filter_buffer(buffer: &mut AudioBuffer, coeffs: &BiquadCoeffs) {
    let mut left = BiquadState::default();
    let mut right = BiquadState::default();
    for frame in &mut buffer.frames {
        frame[0] = left.process(frame[0], coeffs);
        frame[1] = right.process(frame[1], coeffs);
    }
}

/// Applies each band as its own peaking filter, in order.
pub fn apply_eq(buffer: &mut AudioBuffer, bands: &[EqBand]) {
    for band in bands {
        if band.gain_db.abs() < f32::EPSILON {
            continue;
        }
        let coeffs =
            BiquadCoeffs::peaking(buffer.sample_rate, band.frequency, band.gain_db, band.q);
        if coeffs == BiquadCoeffs::IDENTITY {
            debug!(frequency = band.frequency, "skipping eq band outside audible range");
            continue;
        }
        filter_buffer(buffer, &coeffs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(frequency: f32, sample_rate: u32, frames: usize) -> Vec<f32> {
        (0..frames)
            .map(|index| {
                (index as f32 / sample_rate as f32 * frequency * std::f32::consts::TAU).sin() * 0.5
            })
            .collect()
    }

    fn steady_rms(samples: &[f32]) -> f32 {
        crate::dsp::rms(&samples[samples.len() / 2..])
    }

    #[test]
    fn peaking_boost_raises_centre_frequency() {
        let input = sine(1_000.0, 44_100, 8_192);
        let coeffs = BiquadCoeffs::peaking(44_100, 1_000.0, 6.0, 1.0);
        let output = filter_samples(&input, &coeffs);
        let gain = steady_rms(&output) / steady_rms(&input);
        assert!((gain - 2.0).abs() < 0.1, "expected ~+6 dB, got ratio {gain}");
    }

    #[test]
    fn peaking_leaves_distant_frequencies_alone() {
        let input = sine(100.0, 44_100, 16_384);
        let coeffs = BiquadCoeffs::peaking(44_100, 8_000.0, 9.0, 2.0);
        let output = filter_samples(&input, &coeffs);
        let gain = steady_rms(&output) / steady_rms(&input);
        assert!((gain - 1.0).abs() < 0.05);
    }

    #[test]
    fn out_of_range_band_is_identity() {
        assert_eq!(
            BiquadCoeffs::peaking(44_100, 30_000.0, 3.0, 1.0),
            BiquadCoeffs::IDENTITY
        );
        assert_eq!(
            BiquadCoeffs::peaking(44_100, 0.0, 3.0, 1.0),
            BiquadCoeffs::IDENTITY
        );
    }
}
