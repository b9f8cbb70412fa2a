//! Role-weighted tonal balance: spectral tilt, low-mid cleanup and presence.

use serde::{Deserialize, Serialize};

use crate::{
    dsp::spectral,
    model::{AudioBuffer, TrackRole},
    stage::StageError,
};

pub const LOW_MID_BAND_HZ: (f32, f32) = (180.0, 450.0);
pub const PRESENCE_BAND_HZ: (f32, f32) = (2_500.0, 5_000.0);

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TonalProfile {
    /// Positive brightens, negative darkens. Applied as a linear ramp from DC to Nyquist.
    pub tilt: f32,
    pub low_mid_cut: f32,
    pub presence_boost: f32,
}

impl TonalProfile {
    #[must_use]
    pub const fn for_role(role: TrackRole) -> Self {
        match role {
            TrackRole::LeadVocal => Self {
                tilt: 0.12,
                low_mid_cut: 0.18,
                presence_boost: 0.15,
            },
            TrackRole::Adlib => Self {
                tilt: 0.10,
                low_mid_cut: 0.15,
                presence_boost: 0.12,
            },
            TrackRole::Double | TrackRole::Harmony => Self {
                tilt: 0.08,
                low_mid_cut: 0.15,
                presence_boost: 0.08,
            },
            TrackRole::Instrumental => Self {
                tilt: 0.04,
                low_mid_cut: 0.10,
                presence_boost: 0.0,
            },
            TrackRole::Bass => Self {
                tilt: -0.05,
                low_mid_cut: 0.08,
                presence_boost: 0.0,
            },
            TrackRole::Unknown => Self {
                tilt: 0.05,
                low_mid_cut: 0.10,
                presence_boost: 0.05,
            },
        }
    }

    #[must_use]
    pub fn gain_at(&self, frequency: f32, nyquist: f32) -> f32 {
        let position = if nyquist > 0.0 {
            (frequency / nyquist).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let mut gain = 1.0 + self.tilt * (position - 0.5);
        if (LOW_MID_BAND_HZ.0..=LOW_MID_BAND_HZ.1).contains(&frequency) {
            gain *= 1.0 - self.low_mid_cut.clamp(0.0, 1.0);
        }
        if (PRESENCE_BAND_HZ.0..=PRESENCE_BAND_HZ.1).contains(&frequency) {
            gain *= 1.0 + self.presence_boost.max(0.0);
        }
        gain.max(0.0)
    }
}

pub fn balance(buffer: &AudioBuffer, profile: &TonalProfile) -> Result<AudioBuffer, StageError> {
    if buffer.is_empty() {
        return Err(StageError::EmptyBuffer);
    }
    let nyquist = buffer.sample_rate as f32 / 2.0;
    let curve = |frequency: f32| profile.gain_at(frequency, nyquist);
    let left = spectral::apply_gain_curve(&buffer.channel(0), buffer.sample_rate, curve);
    let right = spectral::apply_gain_curve(&buffer.channel(1), buffer.sample_rate, curve);

    let mut output = AudioBuffer::from_channels(buffer.sample_rate, &left, &right);
    output.normalize_peak();
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vocal_curve_cuts_mud_and_lifts_presence() {
        let profile = TonalProfile::for_role(TrackRole::LeadVocal);
        let nyquist = 22_050.0;
        assert!(profile.gain_at(300.0, nyquist) < profile.gain_at(150.0, nyquist));
        assert!(profile.gain_at(3_000.0, nyquist) > profile.gain_at(2_000.0, nyquist));
    }

    #[test]
    fn empty_buffer_degrades() {
        let profile = TonalProfile::for_role(TrackRole::Instrumental);
        assert_eq!(
            balance(&AudioBuffer::default(), &profile),
            Err(StageError::EmptyBuffer)
        );
    }
}
