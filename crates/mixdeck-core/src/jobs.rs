//! Job orchestration: pre-flight checks, slot limiting, timeout and the stage pipeline.

use std::{
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use chrono::Utc;
use tokio::{
    sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError},
    task::JoinHandle,
};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    assets::{load_stem, probe_audio_file},
    bus,
    config::EngineConfig,
    error::MixError,
    export::{export_wav, mix_output_path, mix_output_url},
    masking,
    master::master_bus,
    model::{
        AudioBuffer, JobSnapshot, JobState, JobStatus, MixJob, MixRequest, MixTelemetry,
        TimelineEvent,
    },
    persistence::{JobReport, report_path_for, save_job_report},
    recipes::resolve_recipe,
    registry::JobRegistry,
    stage::StageReport,
    telemetry::{self, ChunkSource, ChunkStream},
    track_chain::{ProcessedTrack, finish_track, prepare_track, resolve_track_config},
    transport::{TICK_INTERVAL, TransportController},
};

pub const WAITING_FOR_SLOT: &str = "waiting for mixer slot";

#[derive(Debug)]
struct ServiceInner {
    config: EngineConfig,
    registry: JobRegistry,
    slots: Arc<Semaphore>,
    transport: Arc<TransportController>,
}

/// Cheap to clone; every clone shares the same registry, slots and transport.
#[derive(Debug, Clone)]
pub struct MixService {
    inner: Arc<ServiceInner>,
}

struct LoadedStem {
    name: String,
    source: PathBuf,
    buffer: AudioBuffer,
}

/// A held mixer slot. The permit returns to the pool only when the last clone drops, so
/// blocking work still running after a timeout keeps its slot until it actually stops.
#[derive(Debug, Clone)]
struct SlotLease {
    _permit: Arc<OwnedSemaphorePermit>,
    cancelled: Arc<AtomicBool>,
}

impl SlotLease {
    fn new(permit: OwnedSemaphorePermit) -> Self {
        Self {
            _permit: Arc::new(permit),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// Checked between tracks so abandoned work stops early.
    fn ensure_active(&self) -> Result<(), MixError> {
        if self.cancelled.load(Ordering::Relaxed) {
            Err(MixError::Task("job abandoned after timeout".to_string()))
        } else {
            Ok(())
        }
    }
}

/// Spawns `task` on the blocking pool right away, holding a clone of `lease` until it ends.
fn blocking<T, F>(lease: &SlotLease, task: F) -> impl Future<Output = Result<T, MixError>> + use<T, F>
where
    T: Send + 'static,
    F: FnOnce(&SlotLease) -> Result<T, MixError> + Send + 'static,
{
    let lease = lease.clone();
    let handle = tokio::task::spawn_blocking(move || task(&lease));
    async move {
        match handle.await {
            Ok(result) => result,
            Err(error) => Err(MixError::Task(error.to_string())),
        }
    }
}

impl MixService {
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        let registry = JobRegistry::new(
            config.registry_capacity,
            Duration::from_secs(config.terminal_job_ttl_secs),
        );
        let transport = Arc::new(TransportController::new(Duration::from_secs(
            config.transport_idle_secs,
        )));
        let slots = Arc::new(Semaphore::new(config.max_concurrent_jobs.max(1)));
        Self {
            inner: Arc::new(ServiceInner {
                config,
                registry,
                slots,
                transport,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// The shared transport, with this job's cursor restored if it was pruned after the
    /// mix finished.
    #[must_use]
    pub fn transport_for(&self, job_id: Uuid) -> &TransportController {
        if let Some(duration) = self.inner.registry.duration_seconds(job_id) {
            self.inner.transport.restore(job_id, duration);
        }
        &self.inner.transport
    }

    #[must_use]
    pub fn available_slots(&self) -> usize {
        self.inner.slots.available_permits()
    }

    /// Starts the 20 Hz transport ticker. Requires a running tokio runtime.
    pub fn spawn_transport_ticker(&self) -> JoinHandle<()> {
        self.inner.transport.spawn_ticker(TICK_INTERVAL)
    }

    /// Periodically drops expired terminal jobs. Requires a running tokio runtime.
    pub fn spawn_registry_pruner(&self, period: Duration) -> JoinHandle<()> {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                let pruned = inner.registry.prune(Utc::now());
                if pruned > 0 {
                    debug!(pruned, "expired jobs pruned");
                }
            }
        })
    }

    /// Validates the request, registers a `queued` job and spawns its task.
    ///
    /// Pre-flight failures return an error and create no job. Must be called from within
    /// a tokio runtime.
    #[instrument(skip(self, request), fields(session_id = %request.session_id, stems = request.stems.len()))]
    pub fn submit(&self, request: MixRequest) -> Result<Uuid, MixError> {
        preflight(&request)?;
        let job_id = self.inner.registry.insert(MixJob::new(&request.session_id));
        info!(%job_id, "mix job queued");

        let service = self.clone();
        tokio::spawn(async move {
            service.drive(job_id, request).await;
        });
        Ok(job_id)
    }

    #[must_use]
    pub fn status(&self, job_id: Uuid) -> Option<JobStatus> {
        self.inner.registry.status(job_id)
    }

    #[must_use]
    pub fn job(&self, job_id: Uuid) -> Option<MixJob> {
        self.inner.registry.job(job_id)
    }

    #[must_use]
    pub fn telemetry(&self, job_id: Uuid) -> Option<MixTelemetry> {
        self.inner.registry.telemetry(job_id)
    }

    #[must_use]
    pub fn timeline(&self, job_id: Uuid) -> Option<Vec<TimelineEvent>> {
        self.inner.registry.timeline(job_id)
    }

    #[must_use]
    pub fn snapshot(&self, job_id: Uuid) -> Option<JobSnapshot> {
        self.inner.registry.snapshot(job_id)
    }

    #[must_use]
    pub fn stream(&self, job_id: Uuid, source: &ChunkSource) -> Option<ChunkStream> {
        self.inner.registry.stream(job_id, source)
    }

    /// Polls until the job is terminal. `None` if the job is unknown or gets evicted.
    pub async fn wait_for_terminal(&self, job_id: Uuid, poll: Duration) -> Option<JobStatus> {
        loop {
            let status = self.status(job_id)?;
            if status.state.is_terminal() {
                return Some(status);
            }
            tokio::time::sleep(poll).await;
        }
    }

    async fn acquire_slot(&self, job_id: Uuid) -> Result<OwnedSemaphorePermit, MixError> {
        let slots = Arc::clone(&self.inner.slots);
        match slots.clone().try_acquire_owned() {
            Ok(permit) => Ok(permit),
            Err(TryAcquireError::NoPermits) => {
                info!(%job_id, "all mixer slots busy");
                self.inner.registry.set_message(job_id, WAITING_FOR_SLOT);
                slots
                    .acquire_owned()
                    .await
                    .map_err(|error| MixError::Task(error.to_string()))
            }
            Err(TryAcquireError::Closed) => Err(MixError::Task("mixer slots closed".to_string())),
        }
    }

    #[instrument(skip(self, request), fields(%job_id))]
    async fn drive(self, job_id: Uuid, request: MixRequest) {
        let lease = match self.acquire_slot(job_id).await {
            Ok(permit) => SlotLease::new(permit),
            Err(error) => {
                error!(%error, "could not acquire mixer slot");
                self.inner.registry.fail(job_id, &error);
                return;
            }
        };

        let limit = self.inner.config.job_timeout();
        match tokio::time::timeout(limit, self.run_pipeline(job_id, request, &lease)).await {
            Ok(Ok(())) => {}
            Ok(Err(error)) => {
                error!(%error, "mix job failed");
                self.inner.registry.fail(job_id, &error);
            }
            Err(_) => {
                lease.cancel();
                let error = MixError::Timeout {
                    seconds: limit.as_secs_f64(),
                };
                error!(%error, "mix job timed out");
                self.inner.registry.fail(job_id, &error);
            }
        }
    }

    async fn run_pipeline(
        &self,
        job_id: Uuid,
        request: MixRequest,
        lease: &SlotLease,
    ) -> Result<(), MixError> {
        let registry = &self.inner.registry;
        let config = &self.inner.config;
        let MixRequest {
            session_id,
            stems,
            config: mix_config,
        } = request;

        let recipe = resolve_recipe(mix_config.recipe.as_deref());
        let master_config = match &mix_config.master {
            Some(patch) => recipe.master.clone().with_override(patch),
            None => recipe.master.clone(),
        };
        registry.update_telemetry(job_id, |telemetry| {
            telemetry.recipe = Some(recipe.name.as_str().to_string());
            telemetry.master = Some(master_config.clone());
        });

        registry.advance(job_id, JobState::LoadingStems, "loading stems");
        let sample_rate = config.sample_rate;
        let loaded = blocking(lease, move |lease| {
            let mut loaded = Vec::with_capacity(stems.len());
            for (name, source) in stems {
                lease.ensure_active()?;
                match load_stem(&source, sample_rate) {
                    Ok(buffer) => loaded.push(LoadedStem {
                        name,
                        source,
                        buffer,
                    }),
                    Err(error) => {
                        return Err(MixError::Decode {
                            stem: name,
                            message: format!("{error:#}"),
                        });
                    }
                }
            }
            Ok(loaded)
        })
        .await?;

        registry.advance(job_id, JobState::AligningStems, "aligning stems");
        let mut buffers: Vec<AudioBuffer> = Vec::with_capacity(loaded.len());
        let mut tracks = Vec::with_capacity(loaded.len());
        for stem in loaded {
            let track_config =
                resolve_track_config(&stem.name, &stem.source, mix_config.tracks.get(&stem.name));
            buffers.push(stem.buffer);
            tracks.push((stem.name, track_config));
        }
        let frames = bus::align(&mut buffers);
        registry.update_telemetry(job_id, |telemetry| {
            telemetry.tracks = tracks
                .iter()
                .map(|(name, track_config)| (name.clone(), track_config.clone()))
                .collect();
        });
        info!(%job_id, frames, tracks = tracks.len(), "stems aligned");

        registry.advance(job_id, JobState::ProcessingTracks, "processing tracks");
        let inner = Arc::clone(&self.inner);
        let (processed, reports) = blocking(lease, move |lease| {
            let engine = &inner.config;
            let mut prepared = Vec::with_capacity(tracks.len());
            for ((name, track_config), buffer) in tracks.into_iter().zip(buffers) {
                lease.ensure_active()?;
                prepared.push(prepare_track(&name, track_config, buffer, engine));
            }
            lease.ensure_active()?;
            let masking_reports = masking::resolve_tracks(&mut prepared, &engine.tuning.masking);
            let mut reports: Vec<StageReport> = prepared
                .iter()
                .flat_map(|track| track.reports.iter().cloned())
                .collect();
            reports.extend(masking_reports);
            let mut processed: Vec<ProcessedTrack> = Vec::with_capacity(prepared.len());
            for track in prepared {
                lease.ensure_active()?;
                processed.push(finish_track(track, engine));
            }
            Ok((processed, reports))
        })
        .await?;

        let bypassed = reports.iter().filter(|report| report.is_bypassed()).count();
        if bypassed > 0 {
            warn!(%job_id, bypassed, "some enhancement stages were bypassed");
        }
        for track in &processed {
            registry.set_stream(
                job_id,
                ChunkSource::Track(track.name.clone()),
                telemetry::chunk_stream(&track.buffer, config.telemetry.chunk_frames),
            );
        }
        registry.update_telemetry(job_id, |telemetry| {
            telemetry.stage_reports = reports;
            telemetry.track_meters = processed
                .iter()
                .map(|track| (track.name.clone(), track.meter.clone()))
                .collect();
        });

        registry.advance(job_id, JobState::Mixing, "blending tracks");
        let settings = config.telemetry.clone();
        let (pre_master, pre_visualization) = blocking(lease, move |_| {
            let buffers: Vec<AudioBuffer> =
                processed.into_iter().map(|track| track.buffer).collect();
            let mix = bus::blend(&buffers)?;
            let visualization = telemetry::visualize(&mix, &settings);
            Ok((mix, visualization))
        })
        .await?;
        registry.set_stream(
            job_id,
            ChunkSource::PreMaster,
            telemetry::chunk_stream(&pre_master, config.telemetry.chunk_frames),
        );
        registry.update_telemetry(job_id, |telemetry| {
            telemetry.pre_master = Some(pre_visualization);
        });

        registry.advance(job_id, JobState::Mastering, "mastering");
        let inner = Arc::clone(&self.inner);
        let (outcome, visualization, master_meter) = blocking(lease, move |lease| {
            lease.ensure_active()?;
            let engine = &inner.config;
            let outcome = master_bus(&pre_master, &master_config, &engine.tuning.master)?;
            let visualization = telemetry::visualize(&outcome.buffer, &engine.telemetry);
            let meter =
                telemetry::meter(&outcome.buffer, &outcome.gain_reduction_db, &engine.telemetry);
            Ok((outcome, visualization, meter))
        })
        .await?;
        info!(
            %job_id,
            lufs = outcome.lufs,
            limited = outcome.limited,
            "master chain complete"
        );
        registry.set_stream(
            job_id,
            ChunkSource::PostMaster,
            telemetry::chunk_stream(&outcome.buffer, config.telemetry.chunk_frames),
        );
        let duration_seconds = outcome.buffer.duration_seconds();
        registry.update_telemetry(job_id, |telemetry| {
            telemetry.visualization = Some(visualization);
            telemetry.master_meter = Some(master_meter);
            telemetry.duration_seconds = Some(duration_seconds);
        });

        registry.advance(job_id, JobState::Exporting, "exporting mix");
        let output_path = mix_output_path(&config.output_dir, &session_id);
        let export_path = output_path.clone();
        let master = outcome.buffer;
        blocking(lease, move |_| {
            export_wav(&master, &export_path).map_err(|error| MixError::Export(format!("{error:#}")))
        })
        .await?;
        let output_url = mix_output_url(&config.public_base_url, &output_path);
        registry.update_telemetry(job_id, |telemetry| {
            telemetry.output_path = Some(output_path.clone());
            telemetry.output_url = Some(output_url);
        });
        self.inner.transport.set_duration(job_id, duration_seconds);

        registry.complete(job_id, "mix complete");
        info!(%job_id, path = %output_path.display(), "mix job complete");
        self.write_report(job_id, &output_path, lease).await;
        Ok(())
    }

    /// Best effort: the job is already complete, so a failed report only warns.
    async fn write_report(&self, job_id: Uuid, output_path: &Path, lease: &SlotLease) {
        let Some(snapshot) = self.inner.registry.snapshot(job_id) else {
            return;
        };
        let report = JobReport {
            status: snapshot.status,
            telemetry: snapshot.telemetry,
            timeline: snapshot.timeline,
        };
        let path = report_path_for(output_path);
        let result = blocking(lease, move |_| {
            save_job_report(&path, &report).map_err(MixError::from)
        })
        .await;
        if let Err(error) = result {
            warn!(%job_id, %error, "failed to write job report");
        }
    }
}

/// Synchronous checks run before a job exists.
pub fn preflight(request: &MixRequest) -> Result<(), MixError> {
    if request.stems.is_empty() {
        return Err(MixError::NoStems);
    }
    for (stem, path) in &request.stems {
        if !path.is_file() {
            return Err(MixError::StemNotFound {
                stem: stem.clone(),
                path: path.display().to_string(),
            });
        }
    }
    for (stem, path) in &request.stems {
        probe_audio_file(path).map_err(|error| MixError::Decode {
            stem: stem.clone(),
            message: format!("{error:#}"),
        })?;
    }
    Ok(())
}
