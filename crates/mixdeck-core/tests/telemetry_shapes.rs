use mixdeck_core::{
    AudioBuffer, TelemetrySettings,
    fixtures::{synth_beat, synth_vocal},
    telemetry::{chunk_stream, meter, visualize},
};

#[test]
fn visualization_has_fixed_shapes() {
    let settings = TelemetrySettings::default();
    let buffer = synth_beat(44_100, 2.0);
    let view = visualize(&buffer, &settings);

    assert_eq!(view.waveform.len(), 2_000);
    assert_eq!(view.spectrum.len(), 256);
    assert_eq!(view.energy.len(), 128);
    assert_eq!(view.scope.len(), 32);
    assert!(view.scope.iter().all(|frame| frame.left.len() == 256 && frame.right.len() == 256));
    assert!(view.spectrum.iter().all(|value| (0.0..=1.0).contains(value)));
    assert!(view.levels.peak >= view.levels.rms);
}

#[test]
fn scope_frames_are_peak_normalized() {
    let settings = TelemetrySettings::default();
    let view = visualize(&synth_vocal(44_100, 1.0), &settings);
    for frame in &view.scope {
        let peak = frame
            .left
            .iter()
            .chain(&frame.right)
            .fold(0.0_f32, |acc, value| acc.max(value.abs()));
        assert!(peak == 0.0 || (peak - 1.0).abs() < 1e-5, "peak was {peak}");
    }
}

#[test]
fn short_buffers_still_produce_full_waveforms() {
    let settings = TelemetrySettings::default();
    let buffer = AudioBuffer::from_mono(44_100, &[0.1, -0.2, 0.3]);
    let view = visualize(&buffer, &settings);
    assert_eq!(view.waveform.len(), 2_000);
    assert!((view.waveform[0] - 0.1).abs() < 1e-6);
    assert!((view.waveform[1_999] - 0.3).abs() < 1e-6);
}

#[test]
fn chunk_stream_pads_last_block() {
    let buffer = AudioBuffer::silent(44_100, 5_000);
    let chunks = chunk_stream(&buffer, 2_048);
    assert_eq!(chunks.len(), 3);
    assert!(chunks.iter().all(|chunk| chunk.frames.len() == 2_048));
    assert_eq!(chunks[2].index, 2);
}

#[test]
fn track_meter_downsamples_gain_reduction() {
    let settings = TelemetrySettings::default();
    let buffer = synth_vocal(44_100, 1.0);
    let reduction = vec![-3.0_f32; buffer.len()];
    let meter = meter(&buffer, &reduction, &settings);
    assert_eq!(meter.gain_reduction_db.len(), settings.gain_reduction_points);
    assert_eq!(meter.spectrum.len(), settings.track_spectrum_bins);
    assert_eq!(meter.scope.len(), settings.track_scope_frames);
    assert!(meter.levels.is_some());
}
