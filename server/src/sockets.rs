//! WebSocket pushes: chunk streams, job status and transport position.

use std::time::Duration;

use axum::{
    extract::{
        Path, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::{IntoResponse, Response},
};
use mixdeck_core::{ChunkSource, MixService, telemetry::ChunkStream};
use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{AppState, error::ServerError};

async fn send_json<T: Serialize>(socket: &mut WebSocket, value: &T) -> bool {
    match serde_json::to_string(value) {
        Ok(text) => socket.send(Message::Text(text)).await.is_ok(),
        Err(error) => {
            warn!(%error, "failed to encode websocket payload");
            false
        }
    }
}

/// `source` is `pre_master`, `post_master` or `tracks/<stem>`.
pub async fn chunk_stream(
    State(state): State<AppState>,
    Path((job_id, source)): Path<(Uuid, String)>,
    upgrade: WebSocketUpgrade,
) -> Response {
    let Some(source) = ChunkSource::parse(&source) else {
        return ServerError::BadRequest(format!("unknown stream source: {source}")).into_response();
    };
    if state.service.status(job_id).is_none() {
        return ServerError::NotFound("job").into_response();
    }
    let Some(stream) = state.service.stream(job_id, &source) else {
        return ServerError::NotFound("stream").into_response();
    };
    let delay = state.server.chunk_delay();
    upgrade.on_upgrade(move |socket| push_chunks(socket, stream, delay, job_id, source))
}

async fn push_chunks(
    mut socket: WebSocket,
    stream: ChunkStream,
    delay: Duration,
    job_id: Uuid,
    source: ChunkSource,
) {
    for chunk in stream.iter() {
        if !send_json(&mut socket, chunk).await {
            debug!(%job_id, %source, index = chunk.index, "chunk stream client went away");
            return;
        }
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
    debug!(%job_id, %source, chunks = stream.len(), "chunk stream finished");
    let _ = socket.send(Message::Close(None)).await;
}

pub async fn job_status(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    upgrade: WebSocketUpgrade,
) -> Response {
    if state.service.status(job_id).is_none() {
        return ServerError::NotFound("job").into_response();
    }
    let service = state.service.clone();
    let period = state.server.status_push_interval();
    upgrade.on_upgrade(move |socket| push_status(socket, service, job_id, period))
}

/// Sends status, telemetry and timeline each period and closes after the terminal one.
async fn push_status(
    mut socket: WebSocket,
    service: MixService,
    job_id: Uuid,
    period: Duration,
) {
    let mut interval = tokio::time::interval(period);
    loop {
        interval.tick().await;
        let Some(snapshot) = service.snapshot(job_id) else {
            break;
        };
        if !send_json(&mut socket, &snapshot).await || snapshot.status.state.is_terminal() {
            break;
        }
    }
    let _ = socket.send(Message::Close(None)).await;
}

pub async fn transport(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    upgrade: WebSocketUpgrade,
) -> impl IntoResponse {
    let service = state.service.clone();
    let period = state.server.transport_push_interval();
    upgrade.on_upgrade(move |socket| push_transport(socket, service, job_id, period))
}

/// Runs until the client disconnects.
async fn push_transport(
    mut socket: WebSocket,
    service: MixService,
    job_id: Uuid,
    period: Duration,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        interval.tick().await;
        let status = service.transport_for(job_id).status(job_id);
        if !send_json(&mut socket, &status).await {
            debug!(%job_id, "transport client went away");
            break;
        }
    }
}
