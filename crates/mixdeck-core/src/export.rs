use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use tracing::{info, instrument};

use crate::model::{AudioBuffer, OUTPUT_CHANNELS};

const MIX_SUFFIX: &str = "_mix";

/// Keeps ASCII alphanumerics, `-` and `_`; everything else becomes `_`.
#[must_use]
pub fn sanitize_session_id(session_id: &str) -> String {
    let sanitized: String = session_id
        .trim()
        .chars()
        .map(|character| {
            if character.is_ascii_alphanumeric() || character == '-' || character == '_' {
                character
            } else {
                '_'
            }
        })
        .collect();
    if sanitized.is_empty() {
        "session".to_string()
    } else {
        sanitized
    }
}

#[must_use]
pub fn mix_output_path(output_dir: &Path, session_id: &str) -> PathBuf {
    output_dir.join(format!("{}{MIX_SUFFIX}.wav", sanitize_session_id(session_id)))
}

#[must_use]
pub fn mix_output_url(public_base_url: &str, output_path: &Path) -> String {
    let file_name = output_path
        .file_name()
        .and_then(|value| value.to_str())
        .unwrap_or_default();
    format!("{}/{file_name}", public_base_url.trim_end_matches('/'))
}

#[instrument(skip(buffer), fields(path = %path.display(), frames = buffer.len()))]
pub fn export_wav(buffer: &AudioBuffer, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| {
            format!(
                "failed to create wav output directory: {}",
                parent.display()
            )
        })?;
    }

    let spec = hound::WavSpec {
        channels: OUTPUT_CHANNELS,
        sample_rate: buffer.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)
        .with_context(|| format!("failed to create wav file: {}", path.display()))?;

    for frame in &buffer.frames {
        writer
            .write_sample(quantize(frame[0]))
            .context("failed to write left channel sample")?;
        writer
            .write_sample(quantize(frame[1]))
            .context("failed to write right channel sample")?;
    }

    writer.finalize().context("failed to finalize wav file")?;
    info!("wav export completed");
    Ok(())
}

fn quantize(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)).round() as i16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_ids_are_sanitized_into_file_names() {
        assert_eq!(sanitize_session_id("my song/../v2"), "my_song____v2");
        assert_eq!(sanitize_session_id("  "), "session");
        let path = mix_output_path(Path::new("out"), "abc-1");
        assert_eq!(path, PathBuf::from("out/abc-1_mix.wav"));
        assert_eq!(mix_output_url("/media/mixes/", &path), "/media/mixes/abc-1_mix.wav");
    }

    #[test]
    fn quantize_clamps_overs() {
        assert_eq!(quantize(2.0), i16::MAX);
        assert_eq!(quantize(-2.0), -i16::MAX);
        assert_eq!(quantize(0.0), 0);
    }
}
