use std::{
    env, fs,
    net::SocketAddr,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use mixdeck_core::{EngineConfig, TracingOptions, diagnostics::DEFAULT_FILTER};
use serde::{Deserialize, Serialize};
use tracing::warn;

pub const CONFIG_FILE_NAME: &str = "mixdeck.config.toml";
pub const CONFIG_PATH_ENV: &str = "MIXDECK_CONFIG_PATH";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AppMode {
    Dev,
    Prod,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub mode: AppMode,
    pub server: ServerConfig,
    pub engine: EngineConfig,
    pub diagnostics: DiagnosticsConfig,
    pub paths: PathsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub status_push_ms: u64,
    pub transport_push_ms: u64,
    pub chunk_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DiagnosticsConfig {
    pub rust_log_filter: String,
    pub trace_file_prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    pub logs_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            mode: AppMode::Dev,
            server: ServerConfig::default(),
            engine: EngineConfig::default(),
            diagnostics: DiagnosticsConfig::default(),
            paths: PathsConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8787".to_string(),
            status_push_ms: 500,
            transport_push_ms: 50,
            chunk_delay_ms: 10,
        }
    }
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            rust_log_filter: DEFAULT_FILTER.to_string(),
            trace_file_prefix: "mixdeck-server".to_string(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            logs_dir: PathBuf::from("logs"),
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.listen_addr
            .parse()
            .with_context(|| format!("invalid listen_addr: {}", self.listen_addr))
    }

    #[must_use]
    pub fn status_push_interval(&self) -> Duration {
        Duration::from_millis(self.status_push_ms.max(1))
    }

    #[must_use]
    pub fn transport_push_interval(&self) -> Duration {
        Duration::from_millis(self.transport_push_ms.max(1))
    }

    #[must_use]
    pub fn chunk_delay(&self) -> Duration {
        Duration::from_millis(self.chunk_delay_ms)
    }
}

impl DiagnosticsConfig {
    #[must_use]
    pub fn tracing_options(&self) -> TracingOptions {
        TracingOptions {
            file_prefix: self.trace_file_prefix.clone(),
            default_filter: self.rust_log_filter.clone(),
            ..TracingOptions::default()
        }
    }
}

impl AppConfig {
    /// Reads the config file if one can be found; otherwise every section keeps its defaults.
    pub fn load() -> Result<Self> {
        let Some(config_path) = discover_config_path() else {
            warn!(
                "{CONFIG_FILE_NAME} not found in cwd or parent directory; using defaults"
            );
            return Ok(Self::default());
        };
        Self::load_from(&config_path)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        let content = fs::read_to_string(config_path)
            .with_context(|| format!("failed to read config file {}", config_path.display()))?;

        let config: AppConfig = toml::from_str(&content).with_context(|| {
            format!("failed to parse config TOML from {}", config_path.display())
        })?;

        Ok(config)
    }
}

fn discover_config_path() -> Option<PathBuf> {
    if let Some(path) = env::var_os(CONFIG_PATH_ENV) {
        let path = PathBuf::from(path);
        if path.is_file() {
            return Some(path);
        }
        warn!(path = %path.display(), "{CONFIG_PATH_ENV} does not point at a file");
    }

    let cwd = env::current_dir().ok()?;
    [cwd.join(CONFIG_FILE_NAME), cwd.join("..").join(CONFIG_FILE_NAME)]
        .into_iter()
        .find(|path| path.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            mode = "prod"

            [server]
            listen_addr = "0.0.0.0:9000"

            [engine]
            max_concurrent_jobs = 4
            "#,
        )
        .expect("config should parse");
        assert_eq!(config.mode, AppMode::Prod);
        assert_eq!(config.server.status_push_ms, 500);
        assert_eq!(config.engine.max_concurrent_jobs, 4);
        assert!((config.engine.job_timeout_secs - 1_200.0).abs() < f64::EPSILON);
        assert!(config.server.socket_addr().is_ok());
    }
}
