//! Per-track processing, split around the masking resolver.
//!
//! `prepare_track` runs the optional enhancement stages (auto-gain, micro-dynamics,
//! tonal balance, spatial placement). `finish_track` runs the core chain and the vocal
//! extras once every track has been prepared and masking has been resolved.

use std::path::Path;

use tracing::{debug, instrument};

use crate::{
    config::{EngineConfig, VocalTuning},
    dsp::{
        biquad::{self, BiquadCoeffs},
        dynamics::{self, DeEsserSettings, MicroDynamicsProfile},
        loudness,
        spatial::{self, Placement},
        tonal::{self, TonalProfile},
    },
    model::{AudioBuffer, TrackConfig, TrackOverride, TrackRole},
    roles::detect_stem_role,
    stage::{StageError, StageKind, StageReport, run_optional},
    telemetry::{self, TrackMeter},
};

const AIR_SHELF_SLOPE: f32 = 0.7;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PreparedTrack {
    pub name: String,
    pub config: TrackConfig,
    pub buffer: AudioBuffer,
    pub reports: Vec<StageReport>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedTrack {
    pub name: String,
    pub role: TrackRole,
    pub buffer: AudioBuffer,
    pub meter: TrackMeter,
}

/// Role preset for the detected role, then the caller's override field by field.
///
/// An override that names a role switches the preset too, so `role` alone is enough to
/// re-route a stem that was misdetected.
#[must_use]
pub fn resolve_track_config(
    stem_name: &str,
    source: &Path,
    patch: Option<&TrackOverride>,
) -> TrackConfig {
    let detected = detect_stem_role(stem_name, source);
    let role = patch.and_then(|patch| patch.role).unwrap_or(detected);
    let preset = role.preset();
    match patch {
        Some(patch) => preset.with_override(patch),
        None => preset,
    }
}

#[instrument(skip(buffer, config, engine), fields(role = config.role.as_str(), frames = buffer.len()))]
pub fn prepare_track(
    name: &str,
    config: TrackConfig,
    buffer: AudioBuffer,
    engine: &EngineConfig,
) -> PreparedTrack {
    let role = config.role;
    let mut reports = Vec::with_capacity(4);

    let (buffer, report) = run_optional(StageKind::AutoGain, name, buffer, |input| {
        loudness::auto_gain(input, role.level_targets(), &engine.tuning.auto_gain)
    });
    reports.push(report);

    let (buffer, report) = run_optional(StageKind::MicroDynamics, name, buffer, |input| {
        if input.is_empty() {
            return Err(StageError::EmptyBuffer);
        }
        let mut output = input.clone();
        dynamics::shape_micro_dynamics(&mut output, &MicroDynamicsProfile::for_role(role));
        output.normalize_peak();
        Ok(output)
    });
    reports.push(report);

    let (buffer, report) = run_optional(StageKind::TonalBalance, name, buffer, |input| {
        tonal::balance(input, &TonalProfile::for_role(role))
    });
    reports.push(report);

    let (buffer, report) = run_optional(StageKind::SpatialPlacement, name, buffer, |input| {
        spatial::place(input, Placement::for_role(role, &engine.tuning.spatial))
    });
    reports.push(report);

    PreparedTrack {
        name: name.to_string(),
        config,
        buffer,
        reports,
    }
}

/// Core chain (EQ, compressor, saturation, gain) followed by the vocal extras.
#[instrument(skip_all, fields(track = %track.name, role = track.config.role.as_str()))]
pub fn finish_track(track: PreparedTrack, engine: &EngineConfig) -> ProcessedTrack {
    let PreparedTrack {
        name,
        config,
        mut buffer,
        ..
    } = track;

    biquad::apply_eq(&mut buffer, &config.eq);
    let gain_reduction = config
        .compressor
        .map(|settings| dynamics::compress(&mut buffer, &settings))
        .unwrap_or_default();
    if let Some(saturation) = &config.saturation {
        dynamics::saturate(&mut buffer, saturation);
    }
    dynamics::apply_gain_db(&mut buffer, config.gain_db);

    if config.role.is_vocal() {
        apply_vocal_extras(&mut buffer, &config, &engine.tuning.vocal);
    }
    if buffer.normalize_peak() {
        debug!("track renormalized after core chain");
    }

    let meter = telemetry::meter(&buffer, &gain_reduction, &engine.telemetry);
    ProcessedTrack {
        name,
        role: config.role,
        buffer,
        meter,
    }
}

fn apply_vocal_extras(buffer: &mut AudioBuffer, config: &TrackConfig, tuning: &VocalTuning) {
    let de_essed = dynamics::de_ess(
        buffer,
        &DeEsserSettings {
            frequency: tuning.de_ess_frequency_hz,
            q: tuning.de_ess_q,
            threshold: tuning.de_ess_threshold,
            ratio: tuning.de_ess_ratio,
        },
    );
    debug!(de_essed, "de-esser pass");

    let air = BiquadCoeffs::high_shelf(
        buffer.sample_rate,
        tuning.air_frequency_hz,
        tuning.air_gain_db,
        AIR_SHELF_SLOPE,
    );
    biquad::filter_buffer(buffer, &air);

    if config.role.is_backing_vocal() {
        let width = config.width.unwrap_or(tuning.backing_width);
        *buffer = spatial::scale_side(buffer, width);
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn noisy_buffer(frames: usize) -> AudioBuffer {
        let mut state = 0x1234_5678_u32;
        let samples: Vec<f32> = (0..frames)
            .map(|_| {
                state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                (state >> 8) as f32 / (1_u32 << 24) as f32 * 0.4 - 0.2
            })
            .collect();
        AudioBuffer::from_mono(44_100, &samples)
    }

    #[test]
    fn override_beats_role_preset() {
        let patch = TrackOverride {
            gain_db: Some(-3.0),
            ..TrackOverride::default()
        };
        let config = resolve_track_config("lead", &PathBuf::from("x.wav"), Some(&patch));
        assert_eq!(config.role, TrackRole::LeadVocal);
        assert!((config.gain_db + 3.0).abs() < f32::EPSILON);
        assert_eq!(config.eq, TrackRole::LeadVocal.preset().eq);
    }

    #[test]
    fn override_role_switches_preset() {
        let patch = TrackOverride {
            role: Some(TrackRole::Bass),
            ..TrackOverride::default()
        };
        let config = resolve_track_config("stem1", &PathBuf::from("stem1.wav"), Some(&patch));
        assert_eq!(config, TrackRole::Bass.preset());
    }

    #[test]
    fn source_file_decides_role_before_stem_key() {
        let config = resolve_track_config("beat", &PathBuf::from("/uploads/lead_vocal.wav"), None);
        assert_eq!(config.role, TrackRole::LeadVocal);
    }

    #[test]
    fn silent_track_bypasses_auto_gain_but_completes() {
        let engine = EngineConfig::default();
        let buffer = AudioBuffer::silent(44_100, 2_048);
        let prepared = prepare_track("quiet", TrackRole::Adlib.preset(), buffer, &engine);
        assert_eq!(prepared.reports.len(), 4);
        assert!(prepared.reports[0].is_bypassed());
        let processed = finish_track(prepared, &engine);
        assert_eq!(processed.buffer.len(), 2_048);
        assert!(processed.buffer.is_finite());
    }

    #[test]
    fn finished_track_stays_in_range_and_meters() {
        let engine = EngineConfig::default();
        let prepared = prepare_track(
            "lead",
            TrackRole::LeadVocal.preset(),
            noisy_buffer(8_192),
            &engine,
        );
        let processed = finish_track(prepared, &engine);
        assert!(processed.buffer.peak() <= 1.0);
        assert_eq!(processed.meter.spectrum.len(), 64);
        assert_eq!(processed.meter.scope.len(), 8);
        assert!(processed.meter.gain_reduction_db.len() <= 256);
    }
}
