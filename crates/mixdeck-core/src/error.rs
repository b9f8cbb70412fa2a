use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum MixError {
    #[error("no stems supplied")]
    NoStems,
    #[error("stem not found: {stem} ({path})")]
    StemNotFound { stem: String, path: String },
    #[error("failed to decode stem {stem}: {message}")]
    Decode { stem: String, message: String },
    #[error("mixing failed: {0}")]
    Mixing(String),
    #[error("mastering failed: {0}")]
    Mastering(String),
    #[error("export failed: {0}")]
    Export(String),
    #[error("mix timed out after {seconds:.1}s")]
    Timeout { seconds: f64 },
    #[error("mix task failed: {0}")]
    Task(String),
    #[error("io error: {0}")]
    Io(String),
}

impl From<anyhow::Error> for MixError {
    fn from(value: anyhow::Error) -> Self {
        Self::Io(format!("{value:#}"))
    }
}

impl MixError {
    /// Pre-flight errors are returned to the caller and never create a job.
    #[must_use]
    pub const fn is_preflight(&self) -> bool {
        matches!(
            self,
            Self::NoStems | Self::StemNotFound { .. } | Self::Decode { .. }
        )
    }
}
