#[must_use]
pub fn frames_to_seconds(frames: usize, sample_rate: u32) -> f64 {
    if sample_rate == 0 {
        return 0.0;
    }

    frames as f64 / f64::from(sample_rate)
}

#[must_use]
pub fn seconds_to_frames(seconds: f64, sample_rate: u32) -> usize {
    if seconds <= 0.0 || sample_rate == 0 {
        return 0;
    }

    (seconds * f64::from(sample_rate)).round() as usize
}

/// One-pole smoothing coefficient for a time constant in milliseconds.
#[must_use]
pub fn ms_to_coefficient(ms: f32, sample_rate: u32) -> f32 {
    if ms <= 0.0 || sample_rate == 0 {
        return 0.0;
    }

    let samples = f64::from(ms) * 0.001 * f64::from(sample_rate);
    (-1.0 / samples).exp() as f32
}

#[must_use]
pub fn resampled_len(frames: usize, from_rate: u32, to_rate: u32) -> usize {
    if from_rate == 0 || from_rate == to_rate {
        return frames;
    }

    (frames as f64 * f64::from(to_rate) / f64::from(from_rate)).round() as usize
}

/// Source frame index that feeds output frame `index` under nearest-lower index mapping.
#[must_use]
pub fn source_index(index: usize, from_rate: u32, to_rate: u32, source_len: usize) -> usize {
    if to_rate == 0 || source_len == 0 {
        return 0;
    }

    let mapped = (index as f64 * f64::from(from_rate) / f64::from(to_rate)).floor() as usize;
    mapped.min(source_len - 1)
}
