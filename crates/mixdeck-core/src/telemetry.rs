//! Visualization data and chunked streams derived from rendered audio.

use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::{
    config::TelemetrySettings,
    dsp::{self, linear_to_db, spectral},
    model::AudioBuffer,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Levels {
    pub rms: f32,
    pub peak: f32,
    pub rms_db: f32,
    pub peak_db: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScopeFrame {
    pub offset: usize,
    pub left: Vec<f32>,
    pub right: Vec<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Visualization {
    pub waveform: Vec<f32>,
    pub spectrum: Vec<f32>,
    pub levels: Levels,
    pub energy: Vec<f32>,
    pub scope: Vec<ScopeFrame>,
}

/// Per-track (or master) metering captured around the compressor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct TrackMeter {
    pub gain_reduction_db: Vec<f32>,
    pub scope: Vec<ScopeFrame>,
    pub spectrum: Vec<f32>,
    pub levels: Option<Levels>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AudioChunk {
    pub index: usize,
    pub frames: Vec<[f32; 2]>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChunkSource {
    PreMaster,
    PostMaster,
    Track(String),
}

impl ChunkSource {
    /// Parses `pre_master`, `post_master` or `tracks/<stem>`.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pre_master" => Some(Self::PreMaster),
            "post_master" => Some(Self::PostMaster),
            other => other
                .strip_prefix("tracks/")
                .filter(|stem| !stem.is_empty())
                .map(|stem| Self::Track(stem.to_string())),
        }
    }
}

impl fmt::Display for ChunkSource {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PreMaster => formatter.write_str("pre_master"),
            Self::PostMaster => formatter.write_str("post_master"),
            Self::Track(stem) => write!(formatter, "tracks/{stem}"),
        }
    }
}

pub type ChunkStream = Arc<[AudioChunk]>;

#[must_use]
pub fn levels(buffer: &AudioBuffer) -> Levels {
    let rms = buffer.rms();
    let peak = buffer.peak();
    Levels {
        rms,
        peak,
        rms_db: linear_to_db(rms),
        peak_db: linear_to_db(peak),
    }
}

/// Evenly spaced picks from the mono downmix, first and last sample included.
#[must_use]
pub fn waveform(buffer: &AudioBuffer, points: usize) -> Vec<f32> {
    let mono = buffer.mono();
    if mono.is_empty() || points == 0 {
        return Vec::new();
    }
    if points == 1 {
        return vec![mono[0]];
    }
    let last = (mono.len() - 1) as f64;
    (0..points)
        .map(|point| {
            let index = (point as f64 * last / (points - 1) as f64).round() as usize;
            mono[index.min(mono.len() - 1)]
        })
        .collect()
}

/// Magnitude spectrum of the mono downmix grouped into `bins` bands and scaled to `[0, 1]`.
#[must_use]
pub fn spectrum(buffer: &AudioBuffer, bins: usize) -> Vec<f32> {
    if buffer.is_empty() || bins == 0 {
        return Vec::new();
    }
    let mags = spectral::magnitudes(&spectral::forward(&buffer.mono()));
    let mut grouped = vec![0.0_f32; bins];
    for (band, value) in grouped.iter_mut().enumerate() {
        let start = band * mags.len() / bins;
        let end = ((band + 1) * mags.len() / bins).max(start + 1).min(mags.len());
        if start < end {
            *value = mags[start..end].iter().sum::<f32>() / (end - start) as f32;
        }
    }
    let max = grouped.iter().copied().fold(0.0_f32, f32::max);
    if max > 0.0 {
        for value in &mut grouped {
            *value /= max;
        }
    }
    grouped
}

/// RMS of the mono downmix over `segments` equal slices.
#[must_use]
pub fn energy_curve(buffer: &AudioBuffer, segments: usize) -> Vec<f32> {
    let mono = buffer.mono();
    if mono.is_empty() || segments == 0 {
        return Vec::new();
    }
    (0..segments)
        .map(|segment| {
            let start = segment * mono.len() / segments;
            let end = ((segment + 1) * mono.len() / segments).min(mono.len());
            if start < end {
                dsp::rms(&mono[start..end])
            } else {
                0.0
            }
        })
        .collect()
}

/// Fixed-length L/R snippets at regular hops, each normalized to its own peak.
#[must_use]
pub fn scope_frames(buffer: &AudioBuffer, frame_len: usize, count: usize) -> Vec<ScopeFrame> {
    if buffer.is_empty() || frame_len == 0 || count == 0 {
        return Vec::new();
    }
    let span = buffer.len().saturating_sub(frame_len);
    (0..count)
        .map(|frame_index| {
            let offset = if count == 1 {
                span / 2
            } else {
                frame_index * span / (count - 1)
            };
            let mut left = vec![0.0_f32; frame_len];
            let mut right = vec![0.0_f32; frame_len];
            for (slot, frame) in buffer.frames[offset..].iter().take(frame_len).enumerate() {
                left[slot] = frame[0];
                right[slot] = frame[1];
            }
            let peak = dsp::peak(&left).max(dsp::peak(&right));
            if peak > 0.0 {
                for sample in left.iter_mut().chain(right.iter_mut()) {
                    *sample /= peak;
                }
            }
            ScopeFrame {
                offset,
                left,
                right,
            }
        })
        .collect()
}

/// Picks `points` evenly spaced values, or returns the input when it is already short enough.
#[must_use]
pub fn downsample(values: &[f32], points: usize) -> Vec<f32> {
    if values.len() <= points || points == 0 {
        return values.to_vec();
    }
    (0..points)
        .map(|point| values[point * values.len() / points])
        .collect()
}

/// Splits into fixed-size blocks; the last one is zero-padded.
#[must_use]
pub fn chunk_stream(buffer: &AudioBuffer, chunk_frames: usize) -> ChunkStream {
    let chunk_frames = chunk_frames.max(1);
    buffer
        .frames
        .chunks(chunk_frames)
        .enumerate()
        .map(|(index, block)| {
            let mut frames = block.to_vec();
            frames.resize(chunk_frames, [0.0, 0.0]);
            AudioChunk { index, frames }
        })
        .collect()
}

#[must_use]
pub fn visualize(buffer: &AudioBuffer, settings: &TelemetrySettings) -> Visualization {
    Visualization {
        waveform: waveform(buffer, settings.waveform_points),
        spectrum: spectrum(buffer, settings.spectrum_bins),
        levels: levels(buffer),
        energy: energy_curve(buffer, settings.energy_segments),
        scope: scope_frames(buffer, settings.scope_samples, settings.scope_frames),
    }
}

#[must_use]
pub fn meter(
    buffer: &AudioBuffer,
    gain_reduction_db: &[f32],
    settings: &TelemetrySettings,
) -> TrackMeter {
    TrackMeter {
        gain_reduction_db: downsample(gain_reduction_db, settings.gain_reduction_points),
        scope: scope_frames(buffer, settings.scope_samples, settings.track_scope_frames),
        spectrum: spectrum(buffer, settings.track_spectrum_bins),
        levels: Some(levels(buffer)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_source_parses_known_tags() {
        assert_eq!(ChunkSource::parse("pre_master"), Some(ChunkSource::PreMaster));
        assert_eq!(
            ChunkSource::parse("tracks/lead.wav"),
            Some(ChunkSource::Track("lead.wav".to_string()))
        );
        assert_eq!(ChunkSource::parse("tracks/"), None);
        assert_eq!(ChunkSource::parse("everything"), None);
        assert_eq!(ChunkSource::Track("beat".to_string()).to_string(), "tracks/beat");
    }

    #[test]
    fn downsample_keeps_short_input() {
        assert_eq!(downsample(&[1.0, 2.0], 4), vec![1.0, 2.0]);
        assert_eq!(downsample(&[0.0, 1.0, 2.0, 3.0], 2), vec![0.0, 2.0]);
    }
}
