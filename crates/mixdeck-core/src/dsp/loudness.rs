//! Simplified loudness measurement and gain matching.
//!
//! `approx_lufs` is mean-square energy in dB with the BS.1770 offset, without K-weighting
//! or gating. Good enough to steer gain, not to certify a master.

use crate::{
    config::AutoGainTuning,
    dsp::db_to_linear,
    model::AudioBuffer,
    roles::LevelTargets,
    stage::StageError,
};

pub const LUFS_FLOOR: f32 = -70.0;
const SILENCE_RMS: f32 = 1e-6;

#[must_use]
pub fn approx_lufs(buffer: &AudioBuffer) -> f32 {
    let rms = buffer.rms();
    if rms <= SILENCE_RMS {
        return LUFS_FLOOR;
    }
    (-0.691 + 10.0 * (rms * rms).log10()).max(LUFS_FLOOR)
}

/// Blended gain factor pulling both approximate loudness and RMS toward the role targets.
pub fn auto_gain_factor(
    buffer: &AudioBuffer,
    targets: LevelTargets,
    tuning: &AutoGainTuning,
) -> Result<f32, StageError> {
    if buffer.is_empty() {
        return Err(StageError::EmptyBuffer);
    }
    let rms = buffer.rms();
    if !rms.is_finite() {
        return Err(StageError::NonFinite);
    }
    if rms <= SILENCE_RMS {
        return Err(StageError::Silent);
    }

    let loudness_gain = db_to_linear(targets.lufs - approx_lufs(buffer));
    let rms_gain = targets.rms / rms;
    let blended = tuning.loudness_weight * loudness_gain + tuning.rms_weight * rms_gain;

    let limit = db_to_linear(tuning.max_gain_db.abs());
    Ok(blended.clamp(1.0 / limit, limit))
}

pub fn auto_gain(
    buffer: &AudioBuffer,
    targets: LevelTargets,
    tuning: &AutoGainTuning,
) -> Result<AudioBuffer, StageError> {
    let factor = auto_gain_factor(buffer, targets, tuning)?;
    let mut output = buffer.clone();
    output.scale(factor);
    output.normalize_peak();
    Ok(output)
}

/// Applies the gain that moves the buffer toward `target_lufs`, bounded by `max_gain_db`.
/// Returns the applied gain in dB.
pub fn normalize_loudness(buffer: &mut AudioBuffer, target_lufs: f32, max_gain_db: f32) -> f32 {
    if buffer.rms() <= SILENCE_RMS {
        return 0.0;
    }
    let limit = max_gain_db.abs();
    let gain_db = (target_lufs - approx_lufs(buffer)).clamp(-limit, limit);
    buffer.scale(db_to_linear(gain_db));
    gain_db
}
