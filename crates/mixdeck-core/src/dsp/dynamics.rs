//! Envelope-following dynamics: compressor, micro-dynamics, de-esser, saturation, limiter.

use serde::{Deserialize, Serialize};

use crate::{
    dsp::{biquad, db_to_linear, linear_to_db, rms},
    model::{AudioBuffer, CompressorSettings, SaturationSettings, TrackRole},
    time::ms_to_coefficient,
};

/// Gain a compressor applies once its envelope sits at `envelope`.
#[inline]
fn compression_gain(envelope: f32, threshold: f32, ratio: f32) -> f32 {
    if envelope > threshold && envelope > 0.0 {
        (threshold + (envelope - threshold) / ratio) / envelope
    } else {
        1.0
    }
}

/// Stereo-linked feed-forward compressor.
///
/// Returns the gain reduction in dB for every frame (zero or negative), before makeup.
pub fn compress(buffer: &mut AudioBuffer, settings: &CompressorSettings) -> Vec<f32> {
    let attack = ms_to_coefficient(settings.attack_ms, buffer.sample_rate);
    let release = ms_to_coefficient(settings.release_ms, buffer.sample_rate);
    let threshold = db_to_linear(settings.threshold_db);
    let ratio = settings.ratio.max(1.0);
    let makeup = db_to_linear(settings.makeup_db);

    let mut envelope = 0.0_f32;
    let mut reduction = Vec::with_capacity(buffer.len());
    for frame in &mut buffer.frames {
        let level = frame[0].abs().max(frame[1].abs());
        let coeff = if level > envelope { attack } else { release };
        envelope = coeff * envelope + (1.0 - coeff) * level;

        let gain = compression_gain(envelope, threshold, ratio);
        reduction.push(linear_to_db(gain));
        frame[0] *= gain * makeup;
        frame[1] *= gain * makeup;
    }
    reduction
}

/// `tanh` soft clip blended with the dry signal.
pub fn saturate(buffer: &mut AudioBuffer, settings: &SaturationSettings) {
    if settings.drive <= 0.0 {
        return;
    }
    let norm = settings.drive.tanh();
    let mix = settings.mix.clamp(0.0, 1.0);
    for frame in &mut buffer.frames {
        for sample in frame.iter_mut() {
            let wet = (settings.drive * *sample).tanh() / norm;
            *sample = (1.0 - mix) * *sample + mix * wet;
        }
    }
}

pub fn apply_gain_db(buffer: &mut AudioBuffer, gain_db: f32) {
    if gain_db.abs() > f32::EPSILON {
        buffer.scale(db_to_linear(gain_db));
    }
}

/// Brick-wall limiter: scales the whole buffer when its peak exceeds the ceiling.
pub fn limit(buffer: &mut AudioBuffer, ceiling_db: f32) -> bool {
    let ceiling = db_to_linear(ceiling_db);
    let peak = buffer.peak();
    if peak <= ceiling || peak == 0.0 {
        return false;
    }
    let gain = ceiling / peak;
    for frame in &mut buffer.frames {
        frame[0] = (frame[0] * gain).clamp(-ceiling, ceiling);
        frame[1] = (frame[1] * gain).clamp(-ceiling, ceiling);
    }
    true
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct MicroDynamicsProfile {
    pub transient_threshold: f32,
    pub transient_softening: f32,
    pub threshold: f32,
    pub ratio: f32,
    pub ramp: f32,
    pub smoothing: Option<f32>,
}

impl MicroDynamicsProfile {
    #[must_use]
    pub const fn for_role(role: TrackRole) -> Self {
        match role {
            TrackRole::LeadVocal => Self {
                transient_threshold: 0.6,
                transient_softening: 0.5,
                threshold: 0.35,
                ratio: 2.5,
                ramp: 0.02,
                smoothing: Some(0.12),
            },
            TrackRole::Adlib => Self {
                transient_threshold: 0.7,
                transient_softening: 0.65,
                threshold: 0.45,
                ratio: 1.8,
                ramp: 0.015,
                smoothing: Some(0.08),
            },
            TrackRole::Double | TrackRole::Harmony | TrackRole::Unknown => Self {
                transient_threshold: 0.75,
                transient_softening: 0.7,
                threshold: 0.5,
                ratio: 1.5,
                ramp: 0.01,
                smoothing: None,
            },
            TrackRole::Instrumental | TrackRole::Bass => Self {
                transient_threshold: 0.9,
                transient_softening: 0.85,
                threshold: 0.7,
                ratio: 1.2,
                ramp: 0.005,
                smoothing: None,
            },
        }
    }
}

pub fn shape_micro_dynamics(buffer: &mut AudioBuffer, profile: &MicroDynamicsProfile) {
    soften_transients(
        buffer,
        profile.transient_threshold,
        profile.transient_softening,
    );
    ramp_compress(buffer, profile.threshold, profile.ratio, profile.ramp);
    if let Some(amount) = profile.smoothing {
        smooth_neighbors(buffer, amount);
    }
}

/// Squeezes the part of each sample above `threshold` by `softening`.
pub fn soften_transients(buffer: &mut AudioBuffer, threshold: f32, softening: f32) {
    for frame in &mut buffer.frames {
        for sample in frame.iter_mut() {
            let magnitude = sample.abs();
            if magnitude > threshold {
                *sample = sample.signum() * (threshold + (magnitude - threshold) * softening);
            }
        }
    }
}

/// Sample-by-sample compressor whose gain ramps toward its target instead of jumping.
pub fn ramp_compress(buffer: &mut AudioBuffer, threshold: f32, ratio: f32, ramp: f32) {
    let ratio = ratio.max(1.0);
    let ramp = ramp.clamp(0.0, 1.0);
    let mut gain = 1.0_f32;
    for frame in &mut buffer.frames {
        let level = frame[0].abs().max(frame[1].abs());
        let target = compression_gain(level, threshold, ratio);
        gain += (target - gain) * ramp;
        frame[0] *= gain;
        frame[1] *= gain;
    }
}

/// Blends each sample with its two neighbours: `a*x[n-1] + (1-2a)*x[n] + a*x[n+1]`.
pub fn smooth_neighbors(buffer: &mut AudioBuffer, amount: f32) {
    let amount = amount.clamp(0.0, 0.33);
    let len = buffer.frames.len();
    if len < 3 {
        return;
    }
    let source = buffer.frames.clone();
    for index in 0..len {
        let previous = source[index.saturating_sub(1)];
        let next = source[(index + 1).min(len - 1)];
        let current = source[index];
        for channel in 0..2 {
            buffer.frames[index][channel] = amount * previous[channel]
                + (1.0 - 2.0 * amount) * current[channel]
                + amount * next[channel];
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeEsserSettings {
    pub frequency: f32,
    pub q: f32,
    pub threshold: f32,
    pub ratio: f32,
}

/// Broadband de-esser keyed by a narrow band around the sibilance frequency.
///
/// Leaves the buffer alone when the band's RMS stays under the threshold.
pub fn de_ess(buffer: &mut AudioBuffer, settings: &DeEsserSettings) -> bool {
    let coeffs = biquad::BiquadCoeffs::band_pass(buffer.sample_rate, settings.frequency, settings.q);
    let band = biquad::filter_samples(&buffer.mono(), &coeffs);
    if rms(&band) <= settings.threshold {
        return false;
    }

    let attack = ms_to_coefficient(1.0, buffer.sample_rate);
    let release = ms_to_coefficient(40.0, buffer.sample_rate);
    let ratio = settings.ratio.max(1.0);
    let mut envelope = 0.0_f32;
    for (frame, band_sample) in buffer.frames.iter_mut().zip(band) {
        let level = band_sample.abs();
        let coeff = if level > envelope { attack } else { release };
        envelope = coeff * envelope + (1.0 - coeff) * level;
        let gain = compression_gain(envelope, settings.threshold, ratio);
        frame[0] *= gain;
        frame[1] *= gain;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compressor_reduces_loud_passages() {
        let mut buffer = AudioBuffer::from_mono(44_100, &vec![0.9; 4_410]);
        let settings = CompressorSettings {
            threshold_db: -12.0,
            ratio: 4.0,
            attack_ms: 1.0,
            release_ms: 50.0,
            makeup_db: 0.0,
        };
        let reduction = compress(&mut buffer, &settings);
        assert_eq!(reduction.len(), 4_410);
        assert!(reduction.iter().all(|db| *db <= 0.0));
        assert!(buffer.frames[4_409][0] < 0.9);
    }

    #[test]
    fn saturation_is_unity_at_full_scale() {
        let mut buffer = AudioBuffer::from_mono(44_100, &[1.0, -1.0, 0.0]);
        saturate(
            &mut buffer,
            &SaturationSettings {
                drive: 3.0,
                mix: 1.0,
            },
        );
        assert!((buffer.frames[0][0] - 1.0).abs() < 1e-6);
        assert!((buffer.frames[1][0] + 1.0).abs() < 1e-6);
        assert_eq!(buffer.frames[2][0], 0.0);
    }

    #[test]
    fn transient_softening_keeps_quiet_samples() {
        let mut buffer = AudioBuffer::from_mono(44_100, &[0.2, 1.0, -1.0]);
        soften_transients(&mut buffer, 0.6, 0.5);
        assert_eq!(buffer.frames[0][0], 0.2);
        assert!((buffer.frames[1][0] - 0.8).abs() < 1e-6);
        assert!((buffer.frames[2][0] + 0.8).abs() < 1e-6);
    }

    #[test]
    fn neighbor_smoothing_preserves_constant_signal() {
        let mut buffer = AudioBuffer::from_mono(44_100, &[0.5; 8]);
        smooth_neighbors(&mut buffer, 0.12);
        assert!(buffer.frames.iter().all(|frame| (frame[0] - 0.5).abs() < 1e-6));
    }

    #[test]
    fn de_esser_ignores_signals_without_sibilance() {
        let samples: Vec<f32> = (0..44_100)
            .map(|index| (index as f32 / 44_100.0 * 200.0 * std::f32::consts::TAU).sin() * 0.5)
            .collect();
        let mut buffer = AudioBuffer::from_mono(44_100, &samples);
        let applied = de_ess(
            &mut buffer,
            &DeEsserSettings {
                frequency: 6_000.0,
                q: 2.0,
                threshold: 0.02,
                ratio: 4.0,
            },
        );
        assert!(!applied);
    }
}
