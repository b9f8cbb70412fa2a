//! Deterministic synthetic stems for demos and tests.

use std::{
    collections::BTreeMap,
    f32::consts::TAU,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use tracing::{debug, instrument};

use crate::{export::export_wav, model::AudioBuffer, time::seconds_to_frames};

/// Linear congruential noise so fixtures are identical on every run.
#[derive(Debug, Clone)]
struct Noise(u32);

impl Noise {
    fn next(&mut self) -> f32 {
        self.0 = self.0.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        (self.0 >> 8) as f32 / (1_u32 << 24) as f32 * 2.0 - 1.0
    }
}

fn sine(index: usize, sample_rate: u32, frequency: f32) -> f32 {
    (index as f32 / sample_rate as f32 * frequency * TAU).sin()
}

/// Sung-vowel stand-in: a vibrato fundamental with two formant partials and a little breath.
#[must_use]
pub fn synth_vocal(sample_rate: u32, seconds: f32) -> AudioBuffer {
    let frames = seconds_to_frames(f64::from(seconds), sample_rate);
    let mut noise = Noise(0x5eed_0001);
    let samples: Vec<f32> = (0..frames)
        .map(|index| {
            let vibrato = 1.0 + 0.01 * sine(index, sample_rate, 5.0);
            let fundamental = sine(index, sample_rate, 220.0 * vibrato);
            let formant = 0.4 * sine(index, sample_rate, 880.0 * vibrato)
                + 0.2 * sine(index, sample_rate, 2_640.0 * vibrato);
            let phrase = 0.5 + 0.5 * sine(index, sample_rate, 0.5).abs();
            (fundamental * 0.3 + formant * 0.2 + noise.next() * 0.01) * phrase
        })
        .collect();
    AudioBuffer::from_mono(sample_rate, &samples)
}

/// Four-on-the-floor kick, offbeat hats and a sustained pad, slightly wide.
#[must_use]
pub fn synth_beat(sample_rate: u32, seconds: f32) -> AudioBuffer {
    let frames = seconds_to_frames(f64::from(seconds), sample_rate);
    let beat_len = (sample_rate as f32 * 0.5) as usize;
    let mut noise = Noise(0x5eed_0002);
    let mut buffer = AudioBuffer::silent(sample_rate, frames);
    for (index, frame) in buffer.frames.iter_mut().enumerate() {
        let position = index % beat_len.max(1);
        let decay = (-(position as f32) / (sample_rate as f32 * 0.08)).exp();
        let kick = sine(position, sample_rate, 55.0 + 60.0 * decay) * decay * 0.6;

        let hat_position = (index + beat_len / 2) % beat_len.max(1);
        let hat_decay = (-(hat_position as f32) / (sample_rate as f32 * 0.01)).exp();
        let hat = noise.next() * hat_decay * 0.15;

        let pad_left = sine(index, sample_rate, 330.0) * 0.08;
        let pad_right = sine(index, sample_rate, 331.5) * 0.08;
        *frame = [kick + hat + pad_left, kick - hat * 0.5 + pad_right];
    }
    buffer
}

/// Short bright stabs with silence between them.
#[must_use]
pub fn synth_adlib(sample_rate: u32, seconds: f32) -> AudioBuffer {
    let frames = seconds_to_frames(f64::from(seconds), sample_rate);
    let stab_len = sample_rate as usize / 4;
    let samples: Vec<f32> = (0..frames)
        .map(|index| {
            let cycle = index % (stab_len * 4).max(1);
            if cycle < stab_len {
                let envelope = 1.0 - cycle as f32 / stab_len as f32;
                sine(index, sample_rate, 660.0) * envelope * 0.25
            } else {
                0.0
            }
        })
        .collect();
    AudioBuffer::from_mono(sample_rate, &samples)
}

/// Writes `lead_vocal.wav`, `beat.wav` and `adlib.wav` into `directory`.
#[instrument(fields(directory = %directory.display(), seconds))]
pub fn write_demo_stems(
    directory: &Path,
    sample_rate: u32,
    seconds: f32,
) -> Result<BTreeMap<String, PathBuf>> {
    fs::create_dir_all(directory).with_context(|| {
        format!(
            "failed to create fixture directory: {}",
            directory.display()
        )
    })?;

    let stems = [
        ("lead_vocal", synth_vocal(sample_rate, seconds)),
        ("beat", synth_beat(sample_rate, seconds)),
        ("adlib", synth_adlib(sample_rate, seconds)),
    ];
    let mut paths = BTreeMap::new();
    for (name, buffer) in stems {
        let path = directory.join(format!("{name}.wav"));
        export_wav(&buffer, &path)?;
        paths.insert(name.to_string(), path);
    }
    debug!(count = paths.len(), "demo stems written");
    Ok(paths)
}
