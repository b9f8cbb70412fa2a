//! Mid/side placement and widening.

use crate::{
    config::SpatialTuning,
    dsp::spectral,
    model::{AudioBuffer, TrackRole},
    stage::StageError,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Placement {
    Neutral,
    /// Uniform side scaling; below 1.0 narrows, above widens.
    ScaleSide(f32),
    /// Side scaled only above `cutoff_hz`, keeping the low end mono-compatible.
    WidenAbove { cutoff_hz: f32, factor: f32 },
}

impl Placement {
    #[must_use]
    pub fn for_role(role: TrackRole, tuning: &SpatialTuning) -> Self {
        match role {
            TrackRole::LeadVocal | TrackRole::Adlib => Self::ScaleSide(tuning.vocal_side_scale),
            TrackRole::Double | TrackRole::Harmony => Self::ScaleSide(tuning.backing_side_scale),
            TrackRole::Instrumental => Self::WidenAbove {
                cutoff_hz: tuning.beat_widen_cutoff_hz,
                factor: tuning.beat_side_scale,
            },
            TrackRole::Bass => Self::ScaleSide(tuning.bass_side_scale),
            TrackRole::Unknown => Self::Neutral,
        }
    }
}

#[must_use]
pub fn encode_mid_side(buffer: &AudioBuffer) -> (Vec<f32>, Vec<f32>) {
    buffer
        .frames
        .iter()
        .map(|frame| ((frame[0] + frame[1]) * 0.5, (frame[0] - frame[1]) * 0.5))
        .unzip()
}

/// Decodes back to left/right, clipped to full scale.
#[must_use]
pub fn decode_mid_side(sample_rate: u32, mid: &[f32], side: &[f32]) -> AudioBuffer {
    let frames = mid
        .iter()
        .zip(side.iter())
        .map(|(&m, &s)| [(m + s).clamp(-1.0, 1.0), (m - s).clamp(-1.0, 1.0)])
        .collect();
    AudioBuffer::new(sample_rate, frames)
}

#[must_use]
pub fn scale_side(buffer: &AudioBuffer, factor: f32) -> AudioBuffer {
    let (mid, side) = encode_mid_side(buffer);
    let side: Vec<f32> = side.into_iter().map(|sample| sample * factor).collect();
    decode_mid_side(buffer.sample_rate, &mid, &side)
}

#[must_use]
pub fn widen_above(buffer: &AudioBuffer, cutoff_hz: f32, factor: f32) -> AudioBuffer {
    let (mid, side) = encode_mid_side(buffer);
    let side = spectral::apply_gain_curve(&side, buffer.sample_rate, |frequency| {
        if frequency >= cutoff_hz { factor } else { 1.0 }
    });
    decode_mid_side(buffer.sample_rate, &mid, &side)
}

pub fn place(buffer: &AudioBuffer, placement: Placement) -> Result<AudioBuffer, StageError> {
    if buffer.is_empty() {
        return Err(StageError::EmptyBuffer);
    }
    Ok(match placement {
        Placement::Neutral => {
            let (mid, side) = encode_mid_side(buffer);
            decode_mid_side(buffer.sample_rate, &mid, &side)
        }
        Placement::ScaleSide(factor) => scale_side(buffer, factor),
        Placement::WidenAbove { cutoff_hz, factor } => widen_above(buffer, cutoff_hz, factor),
    })
}
