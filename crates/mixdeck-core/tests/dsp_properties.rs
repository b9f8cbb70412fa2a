use mixdeck_core::{
    AudioBuffer, CompressorSettings, bus,
    dsp::{db_to_linear, dynamics},
};
use proptest::prelude::*;

fn buffer_from(samples: &[(f32, f32)]) -> AudioBuffer {
    AudioBuffer::new(
        44_100,
        samples.iter().map(|&(left, right)| [left, right]).collect(),
    )
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        .. ProptestConfig::default()
    })]

    #[test]
    fn compressor_without_makeup_never_raises_peak(
        samples in prop::collection::vec((-1.0_f32..1.0, -1.0_f32..1.0), 1..2_048),
        threshold_db in -48.0_f32..-0.5,
        ratio in 1.0_f32..20.0,
        attack_ms in 0.1_f32..50.0,
        release_ms in 1.0_f32..500.0,
    ) {
        let mut buffer = buffer_from(&samples);
        let before = buffer.peak();
        let reduction = dynamics::compress(&mut buffer, &CompressorSettings {
            threshold_db,
            ratio,
            attack_ms,
            release_ms,
            makeup_db: 0.0,
        });
        prop_assert!(buffer.peak() <= before + 1e-6);
        prop_assert_eq!(reduction.len(), samples.len());
        prop_assert!(reduction.iter().all(|db| *db <= 1e-4));
    }

    #[test]
    fn limiter_output_respects_ceiling(
        samples in prop::collection::vec((-4.0_f32..4.0, -4.0_f32..4.0), 1..2_048),
        ceiling_db in -24.0_f32..0.0,
    ) {
        let mut buffer = buffer_from(&samples);
        dynamics::limit(&mut buffer, ceiling_db);
        prop_assert!(buffer.peak() <= db_to_linear(ceiling_db) + 1e-6);
    }

    #[test]
    fn limiter_leaves_quiet_material_alone(
        samples in prop::collection::vec((-0.25_f32..0.25, -0.25_f32..0.25), 1..512),
    ) {
        let mut buffer = buffer_from(&samples);
        let original = buffer.clone();
        prop_assert!(!dynamics::limit(&mut buffer, -1.0));
        prop_assert_eq!(buffer, original);
    }

    #[test]
    fn blend_pads_to_longest_and_sums_exactly(
        short in prop::collection::vec((-0.4_f32..0.4, -0.4_f32..0.4), 1..300),
        long in prop::collection::vec((-0.4_f32..0.4, -0.4_f32..0.4), 1..300),
    ) {
        let buffers = vec![buffer_from(&short), buffer_from(&long)];
        let mix = bus::blend(&buffers).expect("blend should work");
        prop_assert_eq!(mix.len(), short.len().max(long.len()));
        for (index, frame) in mix.frames.iter().enumerate() {
            let expected_left = short.get(index).map_or(0.0, |s| s.0) + long.get(index).map_or(0.0, |s| s.0);
            prop_assert!((frame[0] - expected_left).abs() < 1e-6);
        }
    }
}

#[test]
fn blending_100_and_140_frames_yields_140() {
    let buffers = vec![
        AudioBuffer::from_mono(44_100, &[0.25; 100]),
        AudioBuffer::from_mono(44_100, &[0.5; 140]),
    ];
    let mix = bus::blend(&buffers).expect("blend should work");
    assert_eq!(mix.len(), 140);
    assert!((mix.frames[0][0] - 0.75).abs() < 1e-6);
    assert!((mix.frames[139][1] - 0.5).abs() < 1e-6);
}

#[test]
fn compressor_with_threshold_below_peak_reduces_sustained_signal() {
    let mut buffer = AudioBuffer::from_mono(44_100, &[0.8; 4_410]);
    dynamics::compress(
        &mut buffer,
        &CompressorSettings {
            threshold_db: -12.0,
            ratio: 4.0,
            attack_ms: 5.0,
            release_ms: 80.0,
            makeup_db: 0.0,
        },
    );
    assert!(buffer.peak() <= 0.8);
    assert!(buffer.frames[4_409][0] < 0.5);
}
