//! Offline signal processing used by the track and master chains.

pub mod biquad;
pub mod dynamics;
pub mod loudness;
pub mod spatial;
pub mod spectral;
pub mod tonal;

/// Floor used wherever a level has to be expressed in decibels.
pub const SILENCE_DB: f32 = -120.0;

#[must_use]
pub fn db_to_linear(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

#[must_use]
pub fn linear_to_db(value: f32) -> f32 {
    if value <= 0.0 {
        SILENCE_DB
    } else {
        (20.0 * value.log10()).max(SILENCE_DB)
    }
}

#[must_use]
pub fn peak(samples: &[f32]) -> f32 {
    samples
        .iter()
        .map(|sample| sample.abs())
        .fold(0.0_f32, f32::max)
}

#[must_use]
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples
        .iter()
        .map(|&sample| f64::from(sample) * f64::from(sample))
        .sum();
    (sum / samples.len() as f64).sqrt() as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decibel_conversions_invert() {
        for db in [-24.0_f32, -6.0, 0.0, 3.0] {
            assert!((linear_to_db(db_to_linear(db)) - db).abs() < 1e-4);
        }
        assert_eq!(linear_to_db(0.0), SILENCE_DB);
    }
}
