use std::{collections::BTreeMap, path::PathBuf};

use axum::{
    Json,
    extract::{Path, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use mixdeck_core::{
    ConfigSchema, JobStatus, MixConfig, MixRequest, MixTelemetry, TimelineEvent, TransportStatus,
    config_schema,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{AppState, error::ServerError};

#[derive(Debug, Deserialize)]
pub struct SubmitJobInput {
    pub session_id: String,
    pub stems: BTreeMap<String, PathBuf>,
    #[serde(default)]
    pub config: Option<MixConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitJobOutput {
    pub job_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct SeekInput {
    pub position: f64,
}

#[derive(Debug, Deserialize)]
pub struct RateInput {
    pub rate: f64,
}

#[instrument(skip(state, input), fields(session_id = %input.session_id))]
pub async fn submit_job(
    State(state): State<AppState>,
    Json(input): Json<SubmitJobInput>,
) -> Result<impl IntoResponse, ServerError> {
    let request = MixRequest {
        session_id: input.session_id,
        stems: input.stems,
        config: input.config.unwrap_or_default(),
    };
    let job_id = state.service.submit(request)?;
    info!(%job_id, "job accepted");
    Ok((StatusCode::ACCEPTED, Json(SubmitJobOutput { job_id })))
}

pub async fn job_status(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<JobStatus>, ServerError> {
    state
        .service
        .status(job_id)
        .map(Json)
        .ok_or(ServerError::NotFound("job"))
}

pub async fn job_telemetry(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<MixTelemetry>, ServerError> {
    state
        .service
        .telemetry(job_id)
        .map(Json)
        .ok_or(ServerError::NotFound("job"))
}

pub async fn job_timeline(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<Vec<TimelineEvent>>, ServerError> {
    state
        .service
        .timeline(job_id)
        .map(Json)
        .ok_or(ServerError::NotFound("job"))
}

pub async fn transport_play(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Json<TransportStatus> {
    Json(state.service.transport_for(job_id).play(job_id))
}

pub async fn transport_pause(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Json<TransportStatus> {
    Json(state.service.transport_for(job_id).pause(job_id))
}

pub async fn transport_stop(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Json<TransportStatus> {
    Json(state.service.transport_for(job_id).stop(job_id))
}

pub async fn transport_seek(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    Json(input): Json<SeekInput>,
) -> Json<TransportStatus> {
    Json(state.service.transport_for(job_id).seek(job_id, input.position))
}

pub async fn transport_rate(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    Json(input): Json<RateInput>,
) -> Json<TransportStatus> {
    Json(state.service.transport_for(job_id).set_rate(job_id, input.rate))
}

pub async fn schema() -> Json<ConfigSchema> {
    Json(config_schema())
}

/// Serves exported mixes by bare file name only.
pub async fn media_file(
    State(state): State<AppState>,
    Path(file): Path<String>,
) -> Result<impl IntoResponse, ServerError> {
    let is_plain_name = !file.is_empty()
        && !file.starts_with('.')
        && file
            .chars()
            .all(|character| character.is_ascii_alphanumeric() || "-_.".contains(character));
    if !is_plain_name {
        return Err(ServerError::NotFound("file"));
    }

    let path = state.service.config().output_dir.join(&file);
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|_| ServerError::NotFound("file"))?;
    let content_type = if file.ends_with(".wav") {
        "audio/wav"
    } else {
        "application/json"
    };
    Ok(([(header::CONTENT_TYPE, content_type)], bytes))
}
