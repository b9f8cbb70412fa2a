//! Role detection and the per-role default presets.

use std::path::Path;

use crate::model::{CompressorSettings, EqBand, SaturationSettings, TrackConfig, TrackRole};

/// Classifies a stem by name. Substring checks run in priority order; the first hit wins.
#[must_use]
pub fn detect_role(file_name: &str) -> TrackRole {
    let name = file_name.to_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|needle| name.contains(needle));

    if has(&["lead", "main"]) {
        TrackRole::LeadVocal
    } else if has(&["double"]) {
        TrackRole::Double
    } else if has(&["harmony"]) {
        TrackRole::Harmony
    } else if has(&["adlib"]) {
        TrackRole::Adlib
    } else if has(&["beat", "instrumental"]) {
        TrackRole::Instrumental
    } else if has(&["bass"]) {
        TrackRole::Bass
    } else {
        TrackRole::Unknown
    }
}

/// Detects from the source file name, falling back to the stem name.
#[must_use]
pub fn detect_stem_role(stem_name: &str, source: &Path) -> TrackRole {
    let from_file = source
        .file_name()
        .and_then(|value| value.to_str())
        .map_or(TrackRole::Unknown, detect_role);
    match from_file {
        TrackRole::Unknown => detect_role(stem_name),
        role => role,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelTargets {
    pub lufs: f32,
    pub rms: f32,
}

impl TrackRole {
    #[must_use]
    pub const fn level_targets(self) -> LevelTargets {
        match self {
            Self::LeadVocal => LevelTargets {
                lufs: -16.0,
                rms: 0.14,
            },
            Self::Adlib => LevelTargets {
                lufs: -18.0,
                rms: 0.10,
            },
            Self::Instrumental => LevelTargets {
                lufs: -18.0,
                rms: 0.13,
            },
            Self::Bass => LevelTargets {
                lufs: -20.0,
                rms: 0.12,
            },
            Self::Double | Self::Harmony | Self::Unknown => LevelTargets {
                lufs: -17.0,
                rms: 0.13,
            },
        }
    }

    #[must_use]
    pub fn preset(self) -> TrackConfig {
        match self {
            Self::LeadVocal => TrackConfig {
                role: self,
                eq: vec![
                    EqBand::new(120.0, -2.0, 0.7),
                    EqBand::new(3_000.0, 2.5, 1.0),
                    EqBand::new(10_000.0, 1.5, 0.8),
                ],
                compressor: Some(compressor(-18.0, 3.0, 5.0, 80.0, 3.0)),
                saturation: Some(SaturationSettings {
                    drive: 1.5,
                    mix: 0.2,
                }),
                gain_db: 0.0,
                width: None,
            },
            Self::Double => TrackConfig {
                role: self,
                eq: vec![
                    EqBand::new(200.0, -3.0, 1.0),
                    EqBand::new(4_000.0, 1.5, 1.0),
                ],
                compressor: Some(compressor(-20.0, 4.0, 3.0, 60.0, 2.0)),
                saturation: None,
                gain_db: -4.0,
                width: Some(1.3),
            },
            Self::Harmony => TrackConfig {
                role: self,
                eq: vec![
                    EqBand::new(220.0, -3.0, 1.0),
                    EqBand::new(5_000.0, 1.0, 1.0),
                ],
                compressor: Some(compressor(-20.0, 3.5, 4.0, 70.0, 2.0)),
                saturation: None,
                gain_db: -5.0,
                width: Some(1.4),
            },
            Self::Adlib => TrackConfig {
                role: self,
                eq: vec![
                    EqBand::new(250.0, -3.0, 1.0),
                    EqBand::new(5_000.0, 2.0, 1.0),
                ],
                compressor: Some(compressor(-20.0, 4.0, 3.0, 60.0, 2.0)),
                saturation: Some(SaturationSettings {
                    drive: 2.0,
                    mix: 0.15,
                }),
                gain_db: -3.0,
                width: None,
            },
            Self::Instrumental => TrackConfig {
                role: self,
                eq: vec![
                    EqBand::new(60.0, 1.5, 0.7),
                    EqBand::new(400.0, -1.5, 1.0),
                ],
                compressor: Some(compressor(-14.0, 2.0, 10.0, 120.0, 1.0)),
                saturation: None,
                gain_db: -1.0,
                width: Some(1.1),
            },
            Self::Bass => TrackConfig {
                role: self,
                eq: vec![
                    EqBand::new(80.0, 2.0, 0.8),
                    EqBand::new(250.0, -2.0, 1.0),
                ],
                compressor: Some(compressor(-16.0, 3.0, 15.0, 150.0, 1.0)),
                saturation: Some(SaturationSettings {
                    drive: 1.2,
                    mix: 0.1,
                }),
                gain_db: -2.0,
                width: None,
            },
            Self::Unknown => TrackConfig {
                role: self,
                eq: Vec::new(),
                compressor: Some(compressor(-18.0, 2.0, 10.0, 100.0, 0.0)),
                saturation: None,
                gain_db: 0.0,
                width: None,
            },
        }
    }
}

impl Default for TrackConfig {
    fn default() -> Self {
        TrackRole::Unknown.preset()
    }
}

const fn compressor(
    threshold_db: f32,
    ratio: f32,
    attack_ms: f32,
    release_ms: f32,
    makeup_db: f32,
) -> CompressorSettings {
    CompressorSettings {
        threshold_db,
        ratio,
        attack_ms,
        release_ms,
        makeup_db,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_order_is_respected() {
        assert_eq!(detect_role("Main_Double.wav"), TrackRole::LeadVocal);
        assert_eq!(detect_role("double_harmony.wav"), TrackRole::Double);
        assert_eq!(detect_role("harmony_adlib.wav"), TrackRole::Harmony);
        assert_eq!(detect_role("bass_beat.wav"), TrackRole::Instrumental);
        assert_eq!(detect_role("SubBass.flac"), TrackRole::Bass);
    }

    #[test]
    fn source_file_name_wins_over_stem_name() {
        let role = detect_stem_role("stem-1", Path::new("/uploads/lead_take3.wav"));
        assert_eq!(role, TrackRole::LeadVocal);
        let role = detect_stem_role("beat", Path::new("/uploads/lead_vocal.wav"));
        assert_eq!(role, TrackRole::LeadVocal);
        let role = detect_stem_role("adlibs", Path::new("/uploads/take_02.wav"));
        assert_eq!(role, TrackRole::Adlib);
    }

    #[test]
    fn every_role_has_a_preset_with_its_own_tag() {
        for role in TrackRole::ALL {
            assert_eq!(role.preset().role, role);
        }
    }
}
