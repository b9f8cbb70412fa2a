pub mod config;
pub mod error;
pub mod routes;
pub mod sockets;

use std::{sync::Arc, time::Duration};

use anyhow::Context;
use axum::{
    Router,
    routing::{get, post},
};
use mixdeck_core::{MixService, init_tracing_with_options};
use tracing::info;

use crate::config::{AppConfig, ServerConfig};

const REGISTRY_PRUNE_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct AppState {
    pub service: MixService,
    pub server: Arc<ServerConfig>,
}

impl AppState {
    #[must_use]
    pub fn new(service: MixService, server: ServerConfig) -> Self {
        Self {
            service,
            server: Arc::new(server),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/jobs", post(routes::submit_job))
        .route("/api/jobs/:id", get(routes::job_status))
        .route("/api/jobs/:id/telemetry", get(routes::job_telemetry))
        .route("/api/jobs/:id/timeline", get(routes::job_timeline))
        .route("/api/transport/:id/play", post(routes::transport_play))
        .route("/api/transport/:id/pause", post(routes::transport_pause))
        .route("/api/transport/:id/stop", post(routes::transport_stop))
        .route("/api/transport/:id/seek", post(routes::transport_seek))
        .route("/api/transport/:id/rate", post(routes::transport_rate))
        .route("/api/config/schema", get(routes::schema))
        .route("/media/mixes/:file", get(routes::media_file))
        .route("/ws/jobs/:id/stream/*source", get(sockets::chunk_stream))
        .route("/ws/jobs/:id/status", get(sockets::job_status))
        .route("/ws/transport/:id", get(sockets::transport))
        .with_state(state)
}

/// Binds the listener and serves until the process is stopped.
pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    let telemetry =
        init_tracing_with_options(&config.paths.logs_dir, &config.diagnostics.tracing_options())?;
    info!(
        session_id = %telemetry.session_id,
        mode = ?config.mode,
        max_concurrent_jobs = config.engine.max_concurrent_jobs,
        "mixdeck server starting"
    );

    let addr = config.server.socket_addr()?;
    let service = MixService::new(config.engine);
    let _ticker = service.spawn_transport_ticker();
    let _pruner = service.spawn_registry_pruner(REGISTRY_PRUNE_INTERVAL);
    let app = router(AppState::new(service, config.server));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "mixdeck server listening");
    axum::serve(listener, app)
        .await
        .context("server terminated unexpectedly")?;
    drop(telemetry);
    Ok(())
}
