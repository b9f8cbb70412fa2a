use std::{collections::BTreeMap, path::PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    stage::StageReport,
    telemetry::{TrackMeter, Visualization},
};

pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;
pub const OUTPUT_CHANNELS: u16 = 2;
pub const PROGRESS_COMPLETE: u8 = 100;

/// Interleaved stereo audio. Every stem is widened to two channels on load.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AudioBuffer {
    pub sample_rate: u32,
    pub frames: Vec<[f32; 2]>,
}

impl AudioBuffer {
    #[must_use]
    pub fn new(sample_rate: u32, frames: Vec<[f32; 2]>) -> Self {
        Self {
            sample_rate,
            frames,
        }
    }

    #[must_use]
    pub fn silent(sample_rate: u32, len: usize) -> Self {
        Self::new(sample_rate, vec![[0.0, 0.0]; len])
    }

    #[must_use]
    pub fn from_mono(sample_rate: u32, samples: &[f32]) -> Self {
        Self::new(
            sample_rate,
            samples.iter().map(|&sample| [sample, sample]).collect(),
        )
    }

    /// Builds a buffer from split channels, truncating to the shorter one.
    #[must_use]
    pub fn from_channels(sample_rate: u32, left: &[f32], right: &[f32]) -> Self {
        Self::new(
            sample_rate,
            left.iter()
                .zip(right.iter())
                .map(|(&l, &r)| [l, r])
                .collect(),
        )
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    #[must_use]
    pub fn duration_seconds(&self) -> f64 {
        crate::time::frames_to_seconds(self.frames.len(), self.sample_rate)
    }

    #[must_use]
    pub fn channel(&self, index: usize) -> Vec<f32> {
        self.frames.iter().map(|frame| frame[index.min(1)]).collect()
    }

    #[must_use]
    pub fn mono(&self) -> Vec<f32> {
        self.frames
            .iter()
            .map(|frame| (frame[0] + frame[1]) * 0.5)
            .collect()
    }

    #[must_use]
    pub fn peak(&self) -> f32 {
        self.frames
            .iter()
            .flat_map(|frame| frame.iter())
            .map(|sample| sample.abs())
            .fold(0.0_f32, f32::max)
    }

    #[must_use]
    pub fn rms(&self) -> f32 {
        if self.frames.is_empty() {
            return 0.0;
        }
        let sum: f64 = self
            .frames
            .iter()
            .flat_map(|frame| frame.iter())
            .map(|&sample| f64::from(sample) * f64::from(sample))
            .sum();
        (sum / (self.frames.len() * 2) as f64).sqrt() as f32
    }

    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.frames
            .iter()
            .all(|frame| frame[0].is_finite() && frame[1].is_finite())
    }

    pub fn scale(&mut self, gain: f32) {
        for frame in &mut self.frames {
            frame[0] *= gain;
            frame[1] *= gain;
        }
    }

    pub fn clip(&mut self) {
        for frame in &mut self.frames {
            frame[0] = frame[0].clamp(-1.0, 1.0);
            frame[1] = frame[1].clamp(-1.0, 1.0);
        }
    }

    /// Scales the buffer down so its peak is exactly 1.0 when it exceeds full scale.
    pub fn normalize_peak(&mut self) -> bool {
        let peak = self.peak();
        if peak > 1.0 {
            self.scale(1.0 / peak);
            true
        } else {
            false
        }
    }

    /// Zero-pads the tail up to `len` frames. Never truncates.
    pub fn pad_to(&mut self, len: usize) {
        if self.frames.len() < len {
            self.frames.resize(len, [0.0, 0.0]);
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TrackRole {
    LeadVocal,
    Double,
    Harmony,
    Adlib,
    #[serde(alias = "beat")]
    Instrumental,
    Bass,
    Unknown,
}

impl TrackRole {
    pub const ALL: [Self; 7] = [
        Self::LeadVocal,
        Self::Double,
        Self::Harmony,
        Self::Adlib,
        Self::Instrumental,
        Self::Bass,
        Self::Unknown,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LeadVocal => "lead_vocal",
            Self::Double => "double",
            Self::Harmony => "harmony",
            Self::Adlib => "adlib",
            Self::Instrumental => "instrumental",
            Self::Bass => "bass",
            Self::Unknown => "unknown",
        }
    }

    #[must_use]
    pub const fn is_vocal(self) -> bool {
        matches!(
            self,
            Self::LeadVocal | Self::Double | Self::Harmony | Self::Adlib
        )
    }

    #[must_use]
    pub const fn is_backing_vocal(self) -> bool {
        matches!(self, Self::Double | Self::Harmony)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct EqBand {
    pub frequency: f32,
    pub gain_db: f32,
    pub q: f32,
}

impl EqBand {
    #[must_use]
    pub const fn new(frequency: f32, gain_db: f32, q: f32) -> Self {
        Self {
            frequency,
            gain_db,
            q,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CompressorSettings {
    pub threshold_db: f32,
    pub ratio: f32,
    pub attack_ms: f32,
    pub release_ms: f32,
    #[serde(default)]
    pub makeup_db: f32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SaturationSettings {
    pub drive: f32,
    pub mix: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrackConfig {
    pub role: TrackRole,
    pub eq: Vec<EqBand>,
    pub compressor: Option<CompressorSettings>,
    pub saturation: Option<SaturationSettings>,
    pub gain_db: f32,
    pub width: Option<f32>,
}

/// Caller-supplied per-track settings. Every field that is present wins over the preset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct TrackOverride {
    pub role: Option<TrackRole>,
    pub eq: Option<Vec<EqBand>>,
    pub compressor: Option<CompressorSettings>,
    pub saturation: Option<SaturationSettings>,
    pub gain_db: Option<f32>,
    pub width: Option<f32>,
}

impl TrackConfig {
    #[must_use]
    pub fn with_override(mut self, patch: &TrackOverride) -> Self {
        if let Some(role) = patch.role {
            self.role = role;
        }
        if let Some(eq) = &patch.eq {
            self.eq.clone_from(eq);
        }
        if let Some(compressor) = patch.compressor {
            self.compressor = Some(compressor);
        }
        if let Some(saturation) = patch.saturation {
            self.saturation = Some(saturation);
        }
        if let Some(gain_db) = patch.gain_db {
            self.gain_db = gain_db;
        }
        if let Some(width) = patch.width {
            self.width = Some(width);
        }
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MasterConfig {
    pub eq: Vec<EqBand>,
    pub compressor: CompressorSettings,
    pub limiter_ceiling_db: f32,
    pub output_gain_db: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct MasterOverride {
    pub eq: Option<Vec<EqBand>>,
    pub compressor: Option<CompressorSettings>,
    pub limiter_ceiling_db: Option<f32>,
    pub output_gain_db: Option<f32>,
}

impl MasterConfig {
    #[must_use]
    pub fn with_override(mut self, patch: &MasterOverride) -> Self {
        if let Some(eq) = &patch.eq {
            self.eq.clone_from(eq);
        }
        if let Some(compressor) = patch.compressor {
            self.compressor = compressor;
        }
        if let Some(ceiling) = patch.limiter_ceiling_db {
            self.limiter_ceiling_db = ceiling;
        }
        if let Some(gain) = patch.output_gain_db {
            self.output_gain_db = gain;
        }
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct MixConfig {
    pub recipe: Option<String>,
    pub tracks: BTreeMap<String, TrackOverride>,
    pub master: Option<MasterOverride>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MixRequest {
    pub session_id: String,
    pub stems: BTreeMap<String, PathBuf>,
    #[serde(default)]
    pub config: MixConfig,
}

impl MixRequest {
    #[must_use]
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            stems: BTreeMap::new(),
            config: MixConfig::default(),
        }
    }

    #[must_use]
    pub fn with_stem(mut self, name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.stems.insert(name.into(), path.into());
        self
    }

    #[must_use]
    pub fn with_recipe(mut self, recipe: impl Into<String>) -> Self {
        self.config.recipe = Some(recipe.into());
        self
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Queued,
    LoadingStems,
    AligningStems,
    ProcessingTracks,
    Mixing,
    Mastering,
    Exporting,
    Complete,
    Error,
}

impl JobState {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Error)
    }

    /// Progress reached once the stage has finished.
    #[must_use]
    pub const fn milestone(self) -> u8 {
        match self {
            Self::Queued => 0,
            Self::LoadingStems => 10,
            Self::AligningStems => 25,
            Self::ProcessingTracks => 50,
            Self::Mixing => 65,
            Self::Mastering => 80,
            Self::Exporting => 90,
            Self::Complete => PROGRESS_COMPLETE,
            Self::Error => 0,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::LoadingStems => "loading_stems",
            Self::AligningStems => "aligning_stems",
            Self::ProcessingTracks => "processing_tracks",
            Self::Mixing => "mixing",
            Self::Mastering => "mastering",
            Self::Exporting => "exporting",
            Self::Complete => "complete",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MixJob {
    pub job_id: Uuid,
    pub session_id: String,
    pub state: JobState,
    pub progress: u8,
    pub message: String,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub telemetry: MixTelemetry,
}

impl MixJob {
    #[must_use]
    pub fn new(session_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            job_id: Uuid::new_v4(),
            session_id: session_id.into(),
            state: JobState::Queued,
            progress: 0,
            message: "queued".to_string(),
            error: None,
            created_at: now,
            updated_at: now,
            telemetry: MixTelemetry::default(),
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    #[must_use]
    pub fn status(&self) -> JobStatus {
        JobStatus {
            job_id: self.job_id,
            session_id: self.session_id.clone(),
            state: self.state,
            progress: self.progress,
            message: self.message.clone(),
            error: self.error.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobStatus {
    pub job_id: Uuid,
    pub session_id: String,
    pub state: JobState,
    pub progress: u8,
    pub message: String,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Status, telemetry and timeline read together; the live status push sends this.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobSnapshot {
    #[serde(flatten)]
    pub status: JobStatus,
    pub telemetry: MixTelemetry,
    pub timeline: Vec<TimelineEvent>,
}

/// Everything a job learns about its mix, filled in stage by stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct MixTelemetry {
    pub recipe: Option<String>,
    pub tracks: BTreeMap<String, TrackConfig>,
    pub master: Option<MasterConfig>,
    pub stage_reports: Vec<StageReport>,
    pub track_meters: BTreeMap<String, TrackMeter>,
    pub master_meter: Option<TrackMeter>,
    pub pre_master: Option<Visualization>,
    pub visualization: Option<Visualization>,
    pub duration_seconds: Option<f64>,
    pub output_path: Option<PathBuf>,
    pub output_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimelineEvent {
    pub step: String,
    pub message: String,
    pub progress: u8,
    pub timestamp: DateTime<Utc>,
}

impl TimelineEvent {
    #[must_use]
    pub fn new(step: impl Into<String>, message: impl Into<String>, progress: u8) -> Self {
        Self {
            step: step.into(),
            message: message.into(),
            progress,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pad_never_truncates() {
        let mut buffer = AudioBuffer::silent(DEFAULT_SAMPLE_RATE, 10);
        buffer.pad_to(4);
        assert_eq!(buffer.len(), 10);
        buffer.pad_to(16);
        assert_eq!(buffer.len(), 16);
    }

    #[test]
    fn normalize_peak_only_scales_hot_signals() {
        let mut quiet = AudioBuffer::from_mono(DEFAULT_SAMPLE_RATE, &[0.5, -0.25]);
        assert!(!quiet.normalize_peak());
        assert_eq!(quiet.frames[0], [0.5, 0.5]);

        let mut hot = AudioBuffer::from_mono(DEFAULT_SAMPLE_RATE, &[2.0, -1.0]);
        assert!(hot.normalize_peak());
        assert!((hot.peak() - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn override_wins_field_by_field() {
        let base = TrackConfig {
            role: TrackRole::Unknown,
            eq: vec![EqBand::new(100.0, 1.0, 0.7)],
            compressor: None,
            saturation: None,
            gain_db: 0.0,
            width: None,
        };
        let merged = base.with_override(&TrackOverride {
            gain_db: Some(-3.0),
            width: Some(1.2),
            ..TrackOverride::default()
        });
        assert_eq!(merged.gain_db, -3.0);
        assert_eq!(merged.width, Some(1.2));
        assert_eq!(merged.eq.len(), 1);
    }
}
