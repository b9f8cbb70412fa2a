use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

use crate::model::DEFAULT_SAMPLE_RATE;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub max_concurrent_jobs: usize,
    pub job_timeout_secs: f64,
    pub output_dir: PathBuf,
    pub public_base_url: String,
    pub sample_rate: u32,
    pub registry_capacity: usize,
    pub terminal_job_ttl_secs: u64,
    pub transport_idle_secs: u64,
    pub telemetry: TelemetrySettings,
    pub tuning: Tuning,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 2,
            job_timeout_secs: 1_200.0,
            output_dir: PathBuf::from("data/mixes"),
            public_base_url: "/media/mixes".to_string(),
            sample_rate: DEFAULT_SAMPLE_RATE,
            registry_capacity: 256,
            terminal_job_ttl_secs: 3_600,
            transport_idle_secs: 3_600,
            telemetry: TelemetrySettings::default(),
            tuning: Tuning::default(),
        }
    }
}

impl EngineConfig {
    #[must_use]
    pub fn job_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.job_timeout_secs.max(0.0)).unwrap_or(Duration::MAX)
    }

    #[must_use]
    pub fn with_job_timeout(mut self, timeout: Duration) -> Self {
        self.job_timeout_secs = timeout.as_secs_f64();
        self
    }

    #[must_use]
    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    #[must_use]
    pub fn with_max_concurrent_jobs(mut self, slots: usize) -> Self {
        self.max_concurrent_jobs = slots;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TelemetrySettings {
    pub waveform_points: usize,
    pub spectrum_bins: usize,
    pub track_spectrum_bins: usize,
    pub energy_segments: usize,
    pub scope_samples: usize,
    pub scope_frames: usize,
    pub track_scope_frames: usize,
    pub gain_reduction_points: usize,
    pub chunk_frames: usize,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            waveform_points: 2_000,
            spectrum_bins: 256,
            track_spectrum_bins: 64,
            energy_segments: 128,
            scope_samples: 256,
            scope_frames: 32,
            track_scope_frames: 8,
            gain_reduction_points: 256,
            chunk_frames: 2_048,
        }
    }
}

/// Hand-tuned constants. Defaults reproduce the reference mixes; none of them is load-bearing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Tuning {
    pub auto_gain: AutoGainTuning,
    pub masking: MaskingTuning,
    pub spatial: SpatialTuning,
    pub vocal: VocalTuning,
    pub master: MasterTuning,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AutoGainTuning {
    pub loudness_weight: f32,
    pub rms_weight: f32,
    pub max_gain_db: f32,
}

impl Default for AutoGainTuning {
    fn default() -> Self {
        Self {
            loudness_weight: 0.7,
            rms_weight: 0.3,
            max_gain_db: 18.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MaskingTuning {
    pub low_hz: f32,
    pub high_hz: f32,
    pub ratio: f32,
    pub attenuation: f32,
}

impl Default for MaskingTuning {
    fn default() -> Self {
        Self {
            low_hz: 150.0,
            high_hz: 7_000.0,
            ratio: 1.8,
            attenuation: 0.18,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SpatialTuning {
    pub vocal_side_scale: f32,
    pub bass_side_scale: f32,
    pub backing_side_scale: f32,
    pub beat_widen_cutoff_hz: f32,
    pub beat_side_scale: f32,
}

impl Default for SpatialTuning {
    fn default() -> Self {
        Self {
            vocal_side_scale: 0.7,
            bass_side_scale: 0.5,
            backing_side_scale: 1.25,
            beat_widen_cutoff_hz: 200.0,
            beat_side_scale: 1.2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VocalTuning {
    pub de_ess_frequency_hz: f32,
    pub de_ess_q: f32,
    pub de_ess_threshold: f32,
    pub de_ess_ratio: f32,
    pub air_frequency_hz: f32,
    pub air_gain_db: f32,
    pub backing_width: f32,
}

impl Default for VocalTuning {
    fn default() -> Self {
        Self {
            de_ess_frequency_hz: 6_000.0,
            de_ess_q: 2.0,
            de_ess_threshold: 0.02,
            de_ess_ratio: 4.0,
            air_frequency_hz: 12_000.0,
            air_gain_db: 2.0,
            backing_width: 1.3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MasterTuning {
    pub target_lufs: f32,
    pub max_loudness_gain_db: f32,
    pub side_boost: f32,
}

impl Default for MasterTuning {
    fn default() -> Self {
        Self {
            target_lufs: -9.5,
            max_loudness_gain_db: 12.0,
            side_boost: 0.15,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"max_concurrent_jobs": 4, "tuning": {"masking": {"ratio": 2.0}}}"#)
                .expect("partial config should parse");
        assert_eq!(config.max_concurrent_jobs, 4);
        assert_eq!(config.tuning.masking.ratio, 2.0);
        assert_eq!(config.tuning.masking.attenuation, 0.18);
        assert_eq!(config.job_timeout(), Duration::from_secs(1_200));
    }

    #[test]
    fn unrepresentable_timeouts_saturate() {
        let mut config = EngineConfig {
            job_timeout_secs: f64::INFINITY,
            ..EngineConfig::default()
        };
        assert_eq!(config.job_timeout(), Duration::MAX);
        config.job_timeout_secs = 1e30;
        assert_eq!(config.job_timeout(), Duration::MAX);
        config.job_timeout_secs = -5.0;
        assert_eq!(config.job_timeout(), Duration::ZERO);
    }
}
