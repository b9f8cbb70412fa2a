use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::model::{JobStatus, MixTelemetry, TimelineEvent};

/// Everything a finished job leaves behind next to its WAV.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobReport {
    pub status: JobStatus,
    pub telemetry: MixTelemetry,
    pub timeline: Vec<TimelineEvent>,
}

/// `<stem>_mix.wav` becomes `<stem>_mix.report.json`.
#[must_use]
pub fn report_path_for(output_path: &Path) -> PathBuf {
    output_path.with_extension("report.json")
}

#[instrument(skip(report), fields(job_id = %report.status.job_id, path = %path.display()))]
pub fn save_job_report(path: &Path, report: &JobReport) -> Result<()> {
    let parent = path
        .parent()
        .map_or_else(|| Path::new(".").to_path_buf(), Path::to_path_buf);
    fs::create_dir_all(&parent)
        .with_context(|| format!("failed to create directory: {}", parent.display()))?;

    let json = serde_json::to_vec_pretty(report).context("failed to serialize job report")?;
    let mut temp_file =
        tempfile::NamedTempFile::new_in(&parent).context("failed to create temp report file")?;
    temp_file
        .write_all(&json)
        .context("failed to write temp report file")?;
    temp_file
        .persist(path)
        .map_err(|error| anyhow::anyhow!(error.error))
        .with_context(|| format!("failed to persist job report: {}", path.display()))?;

    info!("job report saved");
    Ok(())
}

#[instrument(fields(path = %path.display()))]
pub fn load_job_report(path: &Path) -> Result<JobReport> {
    let content =
        fs::read(path).with_context(|| format!("failed to read job report: {}", path.display()))?;
    let report: JobReport = serde_json::from_slice(&content).context("invalid job report json")?;
    Ok(report)
}
