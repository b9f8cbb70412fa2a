//! Mix bus: align processed tracks and sum them.

use tracing::{debug, instrument};

use crate::{error::MixError, model::AudioBuffer};

/// Zero-pads every buffer to the longest one. Nothing is ever truncated.
pub fn align(buffers: &mut [AudioBuffer]) -> usize {
    let longest = buffers.iter().map(AudioBuffer::len).max().unwrap_or(0);
    for buffer in buffers.iter_mut() {
        buffer.pad_to(longest);
    }
    longest
}

/// Sums aligned tracks. The result is scaled to a peak of exactly 1.0 only when the raw
/// sum exceeds full scale; otherwise it is the exact sample-wise sum.
#[instrument(skip_all, fields(tracks = buffers.len()))]
pub fn blend(buffers: &[AudioBuffer]) -> Result<AudioBuffer, MixError> {
    let Some(first) = buffers.first() else {
        return Err(MixError::Mixing("no tracks to blend".to_string()));
    };
    let sample_rate = first.sample_rate;
    if let Some(other) = buffers.iter().find(|buffer| buffer.sample_rate != sample_rate) {
        return Err(MixError::Mixing(format!(
            "sample rate mismatch: {} vs {}",
            sample_rate, other.sample_rate
        )));
    }

    let len = buffers.iter().map(AudioBuffer::len).max().unwrap_or(0);
    let mut mix = AudioBuffer::silent(sample_rate, len);
    for buffer in buffers {
        for (out, frame) in mix.frames.iter_mut().zip(&buffer.frames) {
            out[0] += frame[0];
            out[1] += frame[1];
        }
    }

    if !mix.is_finite() {
        return Err(MixError::Mixing("bus sum is not finite".to_string()));
    }
    if mix.normalize_peak() {
        debug!("bus renormalized to full scale");
    }
    Ok(mix)
}
