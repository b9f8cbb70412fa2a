pub mod assets;
pub mod bus;
pub mod config;
pub mod diagnostics;
pub mod dsp;
pub mod error;
pub mod export;
pub mod fixtures;
pub mod jobs;
pub mod masking;
pub mod master;
pub mod model;
pub mod persistence;
pub mod recipes;
pub mod registry;
pub mod roles;
pub mod stage;
pub mod telemetry;
pub mod time;
pub mod track_chain;
pub mod transport;

pub use assets::{AudioProbe, DecodedAudio, load_stem, probe_audio_file};
pub use config::{EngineConfig, TelemetrySettings, Tuning};
pub use diagnostics::{TelemetryGuard, TracingOptions, init_tracing, init_tracing_with_options};
pub use error::MixError;
pub use jobs::MixService;
pub use model::{
    AudioBuffer, CompressorSettings, DEFAULT_SAMPLE_RATE, EqBand, JobSnapshot, JobState, JobStatus,
    MasterConfig, MasterOverride, MixConfig, MixJob, MixRequest, MixTelemetry, SaturationSettings,
    TimelineEvent, TrackConfig, TrackOverride, TrackRole,
};
pub use recipes::{ConfigSchema, MixRecipe, RecipeName, config_schema, resolve_recipe};
pub use roles::detect_role;
pub use stage::{StageError, StageKind, StageOutcome, StageReport};
pub use telemetry::{AudioChunk, ChunkSource, Levels, ScopeFrame, TrackMeter, Visualization};
pub use transport::{TransportController, TransportStatus};
