//! Optional enhancement stages.
//!
//! A stage that fails never fails the job: the input passes through unchanged and
//! the outcome is recorded so callers can see which enhancements were skipped.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::model::AudioBuffer;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum StageError {
    #[error("buffer is empty")]
    EmptyBuffer,
    #[error("signal is silent")]
    Silent,
    #[error("stage produced non-finite samples")]
    NonFinite,
    #[error("stage changed length from {expected} to {actual} frames")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("no {0} track to compare against")]
    MissingReference(&'static str),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    AutoGain,
    MicroDynamics,
    TonalBalance,
    SpatialPlacement,
    MaskingResolution,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StageOutcome {
    Applied,
    Bypassed { reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StageReport {
    pub track: String,
    pub stage: StageKind,
    pub outcome: StageOutcome,
}

impl StageReport {
    #[must_use]
    pub fn applied(kind: StageKind, track: &str) -> Self {
        debug!(track, stage = ?kind, "stage applied");
        Self {
            track: track.to_string(),
            stage: kind,
            outcome: StageOutcome::Applied,
        }
    }

    #[must_use]
    pub fn bypassed(kind: StageKind, track: &str, error: &StageError) -> Self {
        warn!(track, stage = ?kind, %error, "stage bypassed");
        Self {
            track: track.to_string(),
            stage: kind,
            outcome: StageOutcome::Bypassed {
                reason: error.to_string(),
            },
        }
    }

    #[must_use]
    pub fn is_bypassed(&self) -> bool {
        matches!(self.outcome, StageOutcome::Bypassed { .. })
    }
}

/// Runs `stage` over `input`; on error the untouched input is returned with a bypass report.
pub fn run_optional<F>(
    kind: StageKind,
    track: &str,
    input: AudioBuffer,
    stage: F,
) -> (AudioBuffer, StageReport)
where
    F: FnOnce(&AudioBuffer) -> Result<AudioBuffer, StageError>,
{
    let result = stage(&input).and_then(|output| validate(&input, output));
    match result {
        Ok(output) => (output, StageReport::applied(kind, track)),
        Err(error) => (input, StageReport::bypassed(kind, track, &error)),
    }
}

fn validate(input: &AudioBuffer, output: AudioBuffer) -> Result<AudioBuffer, StageError> {
    if output.len() != input.len() {
        return Err(StageError::LengthMismatch {
            expected: input.len(),
            actual: output.len(),
        });
    }
    if !output.is_finite() {
        return Err(StageError::NonFinite);
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failing_stage_passes_input_through() {
        let input = AudioBuffer::from_mono(44_100, &[0.1, 0.2, 0.3]);
        let (output, report) = run_optional(StageKind::AutoGain, "vox", input.clone(), |_| {
            Err(StageError::Silent)
        });
        assert_eq!(output, input);
        assert!(report.is_bypassed());
    }

    #[test]
    fn non_finite_output_is_rejected() {
        let input = AudioBuffer::from_mono(44_100, &[0.1, 0.2]);
        let (output, report) = run_optional(StageKind::TonalBalance, "beat", input.clone(), |_| {
            Ok(AudioBuffer::from_mono(44_100, &[f32::NAN, 0.0]))
        });
        assert_eq!(output, input);
        assert_eq!(
            report.outcome,
            StageOutcome::Bypassed {
                reason: StageError::NonFinite.to_string()
            }
        );
    }
}
