use std::path::Path;

use mixdeck_core::{load_stem, probe_audio_file};

fn write_test_wav(path: &Path, channels: u16, sample_rate: u32, frames: usize) {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).expect("wav writer should be created");
    for index in 0..frames {
        let phase = index as f32 / sample_rate as f32 * 220.0 * std::f32::consts::TAU;
        for channel in 0..channels {
            let scale = if channel == 0 { 0.5 } else { 0.25 };
            let sample = (phase.sin() * scale * f32::from(i16::MAX)) as i16;
            writer.write_sample(sample).expect("sample should write");
        }
    }
    writer.finalize().expect("wav should finalize");
}

#[test]
fn probe_reports_format() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let path = temp.path().join("beat.wav");
    write_test_wav(&path, 2, 48_000, 4_800);

    let probe = probe_audio_file(&path).expect("probe should succeed");
    assert_eq!(probe.sample_rate, Some(48_000));
    assert_eq!(probe.channels, Some(2));
    assert_eq!(probe.total_frames, Some(4_800));
}

#[test]
fn probe_rejects_non_audio() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let path = temp.path().join("notes.wav");
    std::fs::write(&path, b"definitely not audio").expect("file should write");
    assert!(probe_audio_file(&path).is_err());
}

#[test]
fn mono_stems_are_duplicated_to_stereo() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let path = temp.path().join("vocal.wav");
    write_test_wav(&path, 1, 44_100, 2_000);

    let buffer = load_stem(&path, 44_100).expect("stem should load");
    assert_eq!(buffer.len(), 2_000);
    assert!(buffer.frames.iter().all(|frame| (frame[0] - frame[1]).abs() < 1e-6));
}

#[test]
fn stems_are_resampled_to_the_engine_rate() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let path = temp.path().join("adlib.wav");
    write_test_wav(&path, 2, 22_050, 11_025);

    let buffer = load_stem(&path, 44_100).expect("stem should load");
    assert_eq!(buffer.sample_rate, 44_100);
    assert!((buffer.len() as i64 - 22_050).abs() <= 1);
    let left_peak = buffer.frames.iter().fold(0.0_f32, |acc, f| acc.max(f[0].abs()));
    let right_peak = buffer.frames.iter().fold(0.0_f32, |acc, f| acc.max(f[1].abs()));
    assert!(left_peak > right_peak);
}
