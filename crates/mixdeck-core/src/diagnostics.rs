use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

pub const DEFAULT_FILTER: &str = "info,mixdeck_core=debug,mixdeck_server=debug";

/// Keeps the non-blocking file writer alive; logs stop flushing once it is dropped.
pub struct TelemetryGuard {
    pub session_id: Uuid,
    pub log_file: PathBuf,
    _file_guard: WorkerGuard,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TracingOptions {
    pub file_prefix: String,
    /// Used when `RUST_LOG` is unset or invalid.
    pub default_filter: String,
    pub stdout_thread_ids: bool,
}

impl Default for TracingOptions {
    fn default() -> Self {
        Self {
            file_prefix: "mixdeck".to_string(),
            default_filter: DEFAULT_FILTER.to_string(),
            stdout_thread_ids: true,
        }
    }
}

pub fn init_tracing(log_dir: impl AsRef<Path>) -> anyhow::Result<TelemetryGuard> {
    init_tracing_with_options(log_dir, &TracingOptions::default())
}

/// Compact stdout plus a JSON log file per run. A second call keeps the first subscriber.
pub fn init_tracing_with_options(
    log_dir: impl AsRef<Path>,
    options: &TracingOptions,
) -> anyhow::Result<TelemetryGuard> {
    let log_dir = log_dir.as_ref();
    fs::create_dir_all(log_dir)
        .with_context(|| format!("failed to create log directory: {}", log_dir.display()))?;

    let session_id = Uuid::new_v4();
    let timestamp = Utc::now().format("%Y%m%d-%H%M%S");
    let file_name = format!("{}-{timestamp}.log", options.file_prefix);
    let log_file = log_dir.join(&file_name);
    let file_appender = tracing_appender::rolling::never(log_dir, file_name);
    let (file_writer, file_guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&options.default_filter));

    let stdout_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_thread_ids(options.stdout_thread_ids)
        .with_target(true);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(file_writer);

    if let Err(error) = tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
    {
        warn!(?error, "global tracing subscriber already initialized");
    } else {
        info!(%session_id, log_file = %log_file.display(), "tracing initialized");
    }

    Ok(TelemetryGuard {
        session_id,
        log_file,
        _file_guard: file_guard,
    })
}
