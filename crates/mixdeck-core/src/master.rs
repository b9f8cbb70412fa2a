//! Master bus: EQ, glue compression, loudness, output gain, ceiling, final widening.

use tracing::{debug, instrument};

use crate::{
    config::MasterTuning,
    dsp::{biquad, dynamics, loudness, spatial},
    error::MixError,
    model::{AudioBuffer, MasterConfig},
};

#[derive(Debug, Clone, PartialEq)]
pub struct MasterOutcome {
    pub buffer: AudioBuffer,
    pub gain_reduction_db: Vec<f32>,
    pub loudness_gain_db: f32,
    pub limited: bool,
    pub lufs: f32,
}

#[instrument(skip_all, fields(frames = input.len(), ceiling_db = config.limiter_ceiling_db))]
pub fn master_bus(
    input: &AudioBuffer,
    config: &MasterConfig,
    tuning: &MasterTuning,
) -> Result<MasterOutcome, MixError> {
    if input.is_empty() {
        return Err(MixError::Mastering("bus is empty".to_string()));
    }
    if !config.limiter_ceiling_db.is_finite() || config.limiter_ceiling_db > 0.0 {
        return Err(MixError::Mastering(format!(
            "limiter ceiling must be a finite value at or below 0 dBFS, got {}",
            config.limiter_ceiling_db
        )));
    }

    let mut buffer = input.clone();
    biquad::apply_eq(&mut buffer, &config.eq);
    let gain_reduction_db = dynamics::compress(&mut buffer, &config.compressor);
    let loudness_gain_db =
        loudness::normalize_loudness(&mut buffer, tuning.target_lufs, tuning.max_loudness_gain_db);
    dynamics::apply_gain_db(&mut buffer, config.output_gain_db);
    let limited = dynamics::limit(&mut buffer, config.limiter_ceiling_db);
    let mut buffer = spatial::scale_side(&buffer, 1.0 + tuning.side_boost);

    if !buffer.is_finite() {
        return Err(MixError::Mastering("master output is not finite".to_string()));
    }
    buffer.clip();
    let lufs = loudness::approx_lufs(&buffer);
    debug!(loudness_gain_db, limited, lufs, "master chain finished");

    Ok(MasterOutcome {
        buffer,
        gain_reduction_db,
        loudness_gain_db,
        limited,
        lufs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipes::RecipeName;

    #[test]
    fn master_output_stays_in_range() {
        let samples: Vec<f32> = (0..8_192)
            .map(|index| (index as f32 / 44_100.0 * 220.0 * std::f32::consts::TAU).sin() * 0.3)
            .collect();
        let input = AudioBuffer::from_mono(44_100, &samples);
        let outcome = master_bus(&input, &RecipeName::Default.master(), &MasterTuning::default())
            .expect("master should work");
        assert_eq!(outcome.buffer.len(), input.len());
        assert!(outcome.buffer.peak() <= 1.0);
        assert_eq!(outcome.gain_reduction_db.len(), input.len());
    }

    #[test]
    fn rejects_positive_ceiling() {
        let mut config = RecipeName::Default.master();
        config.limiter_ceiling_db = 3.0;
        let input = AudioBuffer::from_mono(44_100, &[0.1; 64]);
        assert!(matches!(
            master_bus(&input, &config, &MasterTuning::default()),
            Err(MixError::Mastering(_))
        ));
    }
}
