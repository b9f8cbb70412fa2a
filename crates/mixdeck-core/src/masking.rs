//! Frequency-masking resolution between the lead vocal and the instrumental.
//!
//! Bins inside the sensitive band where the beat outweighs the vocal by more than the
//! configured ratio are pulled down in the beat only. The vocal is never touched.

use tracing::{debug, instrument};

use crate::{
    config::MaskingTuning,
    dsp::spectral,
    model::{AudioBuffer, TrackRole},
    stage::{StageError, StageKind, StageReport, run_optional},
    track_chain::PreparedTrack,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaskingSummary {
    pub bins_examined: usize,
    pub bins_attenuated: usize,
}

/// Returns the corrected beat. The vocal is zero-padded or truncated to the beat's length
/// so both spectra share one bin grid.
pub fn resolve(
    vocal: &AudioBuffer,
    beat: &AudioBuffer,
    tuning: &MaskingTuning,
) -> Result<(AudioBuffer, MaskingSummary), StageError> {
    if vocal.is_empty() || beat.is_empty() {
        return Err(StageError::EmptyBuffer);
    }

    let len = beat.len();
    let mut vocal_mono = vocal.mono();
    vocal_mono.resize(len, 0.0);
    let vocal_mags = spectral::magnitudes(&spectral::forward(&vocal_mono));
    let beat_mags = spectral::magnitudes(&spectral::forward(&beat.mono()));

    let mut masked_bins = Vec::new();
    let mut examined = 0;
    for (bin, (&beat_mag, &vocal_mag)) in beat_mags.iter().zip(vocal_mags.iter()).enumerate() {
        let frequency = spectral::bin_frequency(bin, len, beat.sample_rate);
        if frequency < tuning.low_hz || frequency > tuning.high_hz {
            continue;
        }
        examined += 1;
        if beat_mag > vocal_mag * tuning.ratio {
            masked_bins.push(bin);
        }
    }

    let gain = 1.0 - tuning.attenuation.clamp(0.0, 1.0);
    let mut channels = [beat.channel(0), beat.channel(1)];
    for channel in &mut channels {
        let mut spectrum = spectral::forward(channel);
        for &bin in &masked_bins {
            spectral::scale_bin(&mut spectrum, bin, gain);
        }
        *channel = spectral::inverse(spectrum);
    }

    let mut corrected = AudioBuffer::from_channels(beat.sample_rate, &channels[0], &channels[1]);
    corrected.clip();
    Ok((
        corrected,
        MaskingSummary {
            bins_examined: examined,
            bins_attenuated: masked_bins.len(),
        },
    ))
}

/// Corrects the instrumental against each lead vocal in turn, replacing it in place.
#[instrument(skip_all, fields(tracks = tracks.len()))]
pub fn resolve_tracks(tracks: &mut [PreparedTrack], tuning: &MaskingTuning) -> Vec<StageReport> {
    let beat_index = tracks
        .iter()
        .position(|track| track.config.role == TrackRole::Instrumental);
    let vocal_indices: Vec<usize> = tracks
        .iter()
        .enumerate()
        .filter(|(_, track)| track.config.role == TrackRole::LeadVocal)
        .map(|(index, _)| index)
        .collect();

    let mut reports = Vec::with_capacity(vocal_indices.len());
    for vocal_index in vocal_indices {
        let vocal_name = tracks[vocal_index].name.clone();
        let Some(beat_index) = beat_index else {
            reports.push(StageReport::bypassed(
                StageKind::MaskingResolution,
                &vocal_name,
                &StageError::MissingReference("instrumental"),
            ));
            continue;
        };

        let vocal = tracks[vocal_index].buffer.clone();
        let beat = std::mem::take(&mut tracks[beat_index].buffer);
        let (corrected, report) =
            run_optional(StageKind::MaskingResolution, &vocal_name, beat, |beat| {
                resolve(&vocal, beat, tuning).map(|(corrected, summary)| {
                    debug!(
                        bins_examined = summary.bins_examined,
                        bins_attenuated = summary.bins_attenuated,
                        "masking bins attenuated"
                    );
                    corrected
                })
            });
        tracks[beat_index].buffer = corrected;
        reports.push(report);
    }
    reports
}
