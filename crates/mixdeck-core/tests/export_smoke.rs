use mixdeck_core::{
    AudioBuffer,
    export::{export_wav, mix_output_path, mix_output_url},
    fixtures::synth_vocal,
};

#[test]
fn wav_export_writes_stereo_16_bit() {
    let temp_dir = tempfile::tempdir().expect("tempdir should work");
    let path = mix_output_path(temp_dir.path(), "Smoke Test/01");
    assert!(path.ends_with("Smoke_Test_01_mix.wav"));

    let buffer = synth_vocal(44_100, 0.5);
    export_wav(&buffer, &path).expect("wav export should succeed");

    let reader = hound::WavReader::open(&path).expect("exported wav should open");
    let spec = reader.spec();
    assert_eq!(spec.channels, 2);
    assert_eq!(spec.sample_rate, 44_100);
    assert_eq!(spec.bits_per_sample, 16);
    assert_eq!(reader.duration() as usize, buffer.len());
    assert_eq!(
        mix_output_url("/media/mixes", &path),
        "/media/mixes/Smoke_Test_01_mix.wav"
    );
}

#[test]
fn out_of_range_samples_are_clamped_on_export() {
    let temp_dir = tempfile::tempdir().expect("tempdir should work");
    let path = temp_dir.path().join("hot.wav");
    let buffer = AudioBuffer::from_mono(44_100, &[2.0, -2.0, 0.0]);
    export_wav(&buffer, &path).expect("wav export should succeed");

    let mut reader = hound::WavReader::open(&path).expect("exported wav should open");
    let samples: Vec<i16> = reader
        .samples::<i16>()
        .collect::<Result<_, _>>()
        .expect("samples should decode");
    assert_eq!(samples[0], i16::MAX);
    assert!(samples[2] <= -i16::MAX);
    assert_eq!(samples[4], 0);
}
