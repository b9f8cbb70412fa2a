use std::{fs::File, io::ErrorKind, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use symphonia::core::{
    audio::{AudioBufferRef, SampleBuffer},
    codecs::DecoderOptions,
    errors::Error as SymphoniaError,
    formats::{FormatOptions, FormatReader},
    io::MediaSourceStream,
    meta::MetadataOptions,
    probe::Hint,
};
use tracing::{debug, instrument};

use crate::{
    model::AudioBuffer,
    time::{frames_to_seconds, resampled_len, source_index},
};

/// Header information read without decoding any packets.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AudioProbe {
    pub sample_rate: Option<u32>,
    pub channels: Option<u16>,
    pub total_frames: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    pub sample_rate: u32,
    pub channels: u16,
    pub frames: Vec<[f32; 2]>,
}

fn open_format(path: &Path) -> Result<Box<dyn FormatReader>> {
    let file = File::open(path)
        .with_context(|| format!("failed to open audio file: {}", path.display()))?;
    let source = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|value| value.to_str()) {
        hint.with_extension(extension);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            source,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .with_context(|| format!("unrecognized audio format: {}", path.display()))?;
    Ok(probed.format)
}

/// Confirms the file is a readable audio container with a default track.
#[instrument(fields(path = %path.display()))]
pub fn probe_audio_file(path: &Path) -> Result<AudioProbe> {
    let format = open_format(path)?;
    let track = format
        .default_track()
        .ok_or_else(|| anyhow::anyhow!("no default audio track found in {}", path.display()))?;
    symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .with_context(|| format!("unsupported codec in {}", path.display()))?;

    Ok(AudioProbe {
        sample_rate: track.codec_params.sample_rate,
        channels: track
            .codec_params
            .channels
            .map(|value| value.count() as u16),
        total_frames: track.codec_params.n_frames,
    })
}

/// Decodes to stereo frames. Mono is duplicated; channels beyond the first two are dropped.
#[instrument(fields(path = %path.display()))]
pub fn decode_audio_file_stereo(path: &Path) -> Result<DecodedAudio> {
    let mut format = open_format(path)?;
    let track = format
        .default_track()
        .ok_or_else(|| anyhow::anyhow!("no default audio track found in {}", path.display()))?;
    let track_id = track.id;
    let mut decoder =
        symphonia::default::get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(44_100);
    let mut channels = track
        .codec_params
        .channels
        .map(|value| value.count() as u16)
        .unwrap_or(2);
    let mut frames = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(error)) if error.kind() == ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => {
                return Err(anyhow::anyhow!(
                    "audio stream reset required for {}",
                    path.display()
                ));
            }
            Err(error) => return Err(error.into()),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(_)) => {
                continue;
            }
            Err(error) => return Err(error.into()),
        };

        sample_rate = decoded.spec().rate;
        channels = decoded.spec().channels.count() as u16;
        push_stereo_frames(decoded, &mut frames);
    }

    if frames.is_empty() {
        return Err(anyhow::anyhow!(
            "decoded zero samples from {}",
            path.display()
        ));
    }

    debug!(
        sample_rate,
        channels,
        total_frames = frames.len(),
        "audio decode complete"
    );

    Ok(DecodedAudio {
        sample_rate,
        channels,
        frames,
    })
}

fn push_stereo_frames(decoded: AudioBufferRef<'_>, frames: &mut Vec<[f32; 2]>) {
    let spec = *decoded.spec();
    let channel_count = spec.channels.count().max(1);
    let mut sample_buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
    sample_buffer.copy_interleaved_ref(decoded);

    for frame in sample_buffer.samples().chunks(channel_count) {
        let left = frame[0];
        let right = frame.get(1).copied().unwrap_or(left);
        frames.push([left, right]);
    }
}

/// Nearest-lower index mapping. No interpolation, so aliasing is possible on downsampling.
#[must_use]
pub fn resample(frames: &[[f32; 2]], from_rate: u32, to_rate: u32) -> Vec<[f32; 2]> {
    if from_rate == to_rate || frames.is_empty() {
        return frames.to_vec();
    }
    let len = resampled_len(frames.len(), from_rate, to_rate);
    (0..len)
        .map(|index| frames[source_index(index, from_rate, to_rate, frames.len())])
        .collect()
}

/// Decodes a stem and brings it to the engine rate.
#[instrument(fields(path = %path.display(), target_rate))]
pub fn load_stem(path: &Path, target_rate: u32) -> Result<AudioBuffer> {
    let decoded = decode_audio_file_stereo(path)?;
    let frames = resample(&decoded.frames, decoded.sample_rate, target_rate);
    let buffer = AudioBuffer::new(target_rate, frames);
    debug!(
        source_rate = decoded.sample_rate,
        duration_seconds = frames_to_seconds(buffer.len(), target_rate),
        "stem loaded"
    );
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resample_doubles_and_halves_length() {
        let frames: Vec<[f32; 2]> = (0..100).map(|index| [index as f32, 0.0]).collect();
        let up = resample(&frames, 22_050, 44_100);
        assert_eq!(up.len(), 200);
        assert_eq!(up[3], [1.0, 0.0]);
        let down = resample(&frames, 88_200, 44_100);
        assert_eq!(down.len(), 50);
        assert_eq!(down[10], [20.0, 0.0]);
    }

    #[test]
    fn same_rate_is_untouched() {
        let frames = vec![[0.1, 0.2]; 8];
        assert_eq!(resample(&frames, 44_100, 44_100), frames);
    }
}
