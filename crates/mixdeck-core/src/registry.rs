//! In-memory job store: records, timelines and chunk streams behind one lock.
//!
//! Records become read-only once terminal. Capacity and TTL eviction only ever remove
//! terminal jobs, so an active job can never disappear from under its task.

use std::{
    collections::{BTreeMap, HashMap},
    time::Duration,
};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    error::MixError,
    model::{
        JobSnapshot, JobState, JobStatus, MixJob, MixTelemetry, PROGRESS_COMPLETE, TimelineEvent,
    },
    telemetry::{ChunkSource, ChunkStream},
};

#[derive(Debug, Clone)]
pub struct JobRecord {
    pub job: MixJob,
    pub timeline: Vec<TimelineEvent>,
    pub streams: BTreeMap<ChunkSource, ChunkStream>,
}

#[derive(Debug)]
pub struct JobRegistry {
    records: RwLock<HashMap<Uuid, JobRecord>>,
    capacity: usize,
    terminal_ttl: Duration,
}

impl JobRegistry {
    #[must_use]
    pub fn new(capacity: usize, terminal_ttl: Duration) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
            terminal_ttl,
        }
    }

    pub fn insert(&self, job: MixJob) -> Uuid {
        let job_id = job.job_id;
        let event = TimelineEvent::new(job.state.as_str(), &job.message, job.progress);
        let mut records = self.records.write();
        Self::evict(&mut records, Utc::now(), self.capacity, self.terminal_ttl, 1);
        if records.len() >= self.capacity {
            warn!(
                capacity = self.capacity,
                "job registry over capacity with only active jobs"
            );
        }
        records.insert(
            job_id,
            JobRecord {
                job,
                timeline: vec![event],
                streams: BTreeMap::new(),
            },
        );
        job_id
    }

    /// Drops expired terminal jobs, then the oldest terminal ones while over capacity.
    pub fn prune(&self, now: DateTime<Utc>) -> usize {
        let mut records = self.records.write();
        Self::evict(&mut records, now, self.capacity, self.terminal_ttl, 0)
    }

    fn evict(
        records: &mut HashMap<Uuid, JobRecord>,
        now: DateTime<Utc>,
        capacity: usize,
        ttl: Duration,
        reserve: usize,
    ) -> usize {
        let before = records.len();
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        records.retain(|_, record| {
            !record.job.state.is_terminal() || now - record.job.updated_at < ttl
        });

        if records.len() + reserve > capacity {
            let mut terminal: Vec<(DateTime<Utc>, Uuid)> = records
                .values()
                .filter(|record| record.job.state.is_terminal())
                .map(|record| (record.job.updated_at, record.job.job_id))
                .collect();
            terminal.sort();
            let excess = records.len() + reserve - capacity;
            for (_, job_id) in terminal.into_iter().take(excess) {
                records.remove(&job_id);
            }
        }

        let evicted = before - records.len();
        if evicted > 0 {
            debug!(evicted, remaining = records.len(), "evicted terminal jobs");
        }
        evicted
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    #[must_use]
    pub fn job(&self, job_id: Uuid) -> Option<MixJob> {
        self.records.read().get(&job_id).map(|record| record.job.clone())
    }

    #[must_use]
    pub fn status(&self, job_id: Uuid) -> Option<JobStatus> {
        self.records.read().get(&job_id).map(|record| record.job.status())
    }

    #[must_use]
    pub fn telemetry(&self, job_id: Uuid) -> Option<MixTelemetry> {
        self.records
            .read()
            .get(&job_id)
            .map(|record| record.job.telemetry.clone())
    }

    #[must_use]
    pub fn timeline(&self, job_id: Uuid) -> Option<Vec<TimelineEvent>> {
        self.records
            .read()
            .get(&job_id)
            .map(|record| record.timeline.clone())
    }

    #[must_use]
    pub fn snapshot(&self, job_id: Uuid) -> Option<JobSnapshot> {
        self.records.read().get(&job_id).map(|record| JobSnapshot {
            status: record.job.status(),
            telemetry: record.job.telemetry.clone(),
            timeline: record.timeline.clone(),
        })
    }

    /// Mix length once mastering has finished.
    #[must_use]
    pub fn duration_seconds(&self, job_id: Uuid) -> Option<f64> {
        self.records
            .read()
            .get(&job_id)
            .and_then(|record| record.job.telemetry.duration_seconds)
    }

    #[must_use]
    pub fn stream(&self, job_id: Uuid, source: &ChunkSource) -> Option<ChunkStream> {
        self.records
            .read()
            .get(&job_id)
            .and_then(|record| record.streams.get(source).cloned())
    }

    /// Applies `update` to a live record. Returns `false` for unknown or terminal jobs.
    fn mutate(&self, job_id: Uuid, update: impl FnOnce(&mut JobRecord)) -> bool {
        let mut records = self.records.write();
        let Some(record) = records.get_mut(&job_id) else {
            return false;
        };
        if record.job.state.is_terminal() {
            debug!(%job_id, state = record.job.state.as_str(), "ignoring update to terminal job");
            return false;
        }
        update(record);
        record.job.touch();
        true
    }

    /// Moves into `state`. Progress only ever rises to the state's milestone.
    pub fn advance(&self, job_id: Uuid, state: JobState, message: impl Into<String>) -> bool {
        let message = message.into();
        self.mutate(job_id, |record| {
            record.job.state = state;
            record.job.progress = record.job.progress.max(state.milestone());
            record.job.message.clone_from(&message);
            record.timeline.push(TimelineEvent::new(
                state.as_str(),
                message,
                record.job.progress,
            ));
        })
    }

    pub fn set_message(&self, job_id: Uuid, message: impl Into<String>) -> bool {
        let message = message.into();
        self.mutate(job_id, |record| record.job.message = message)
    }

    pub fn update_telemetry(&self, job_id: Uuid, update: impl FnOnce(&mut MixTelemetry)) -> bool {
        self.mutate(job_id, |record| update(&mut record.job.telemetry))
    }

    pub fn set_stream(&self, job_id: Uuid, source: ChunkSource, stream: ChunkStream) -> bool {
        self.mutate(job_id, |record| {
            record.streams.insert(source, stream);
        })
    }

    pub fn complete(&self, job_id: Uuid, message: impl Into<String>) -> bool {
        let message = message.into();
        self.mutate(job_id, |record| {
            record.job.state = JobState::Complete;
            record.job.progress = PROGRESS_COMPLETE;
            record.job.message.clone_from(&message);
            record.timeline.push(TimelineEvent::new(
                JobState::Complete.as_str(),
                message,
                PROGRESS_COMPLETE,
            ));
        })
    }

    /// Terminal failure. Progress stays where the job got to.
    pub fn fail(&self, job_id: Uuid, error: &MixError) -> bool {
        let message = error.to_string();
        self.mutate(job_id, |record| {
            record.job.state = JobState::Error;
            record.job.error = Some(message.clone());
            record.job.message.clone_from(&message);
            record.timeline.push(TimelineEvent::new(
                JobState::Error.as_str(),
                message,
                record.job.progress,
            ));
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> JobRegistry {
        JobRegistry::new(2, Duration::from_secs(3_600))
    }

    #[test]
    fn terminal_jobs_ignore_updates() {
        let registry = registry();
        let job_id = registry.insert(MixJob::new("s"));
        assert!(registry.advance(job_id, JobState::LoadingStems, "loading"));
        assert!(registry.complete(job_id, "done"));
        assert!(!registry.advance(job_id, JobState::Mixing, "late"));
        assert!(!registry.fail(job_id, &MixError::Mixing("late".to_string())));
        let status = registry.status(job_id).expect("job should exist");
        assert_eq!(status.state, JobState::Complete);
        assert_eq!(status.progress, 100);
    }

    #[test]
    fn snapshot_combines_status_telemetry_and_timeline() {
        let registry = registry();
        let job_id = registry.insert(MixJob::new("s"));
        registry.advance(job_id, JobState::Mastering, "mastering");
        registry.update_telemetry(job_id, |telemetry| telemetry.duration_seconds = Some(2.5));

        let snapshot = registry.snapshot(job_id).expect("snapshot should exist");
        assert_eq!(snapshot.status.state, JobState::Mastering);
        assert_eq!(snapshot.telemetry.duration_seconds, Some(2.5));
        assert_eq!(snapshot.timeline.len(), 2);
        assert_eq!(registry.duration_seconds(job_id), Some(2.5));

        let json = serde_json::to_value(&snapshot).expect("snapshot should serialize");
        assert_eq!(json["state"], "mastering");
        assert!(json["telemetry"].is_object());
        assert_eq!(json["timeline"].as_array().map(Vec::len), Some(2));
        assert!(registry.snapshot(Uuid::new_v4()).is_none());
    }

    #[test]
    fn failure_keeps_progress_and_logs_timeline() {
        let registry = registry();
        let job_id = registry.insert(MixJob::new("s"));
        registry.advance(job_id, JobState::AligningStems, "aligning");
        registry.fail(job_id, &MixError::Timeout { seconds: 1.0 });
        let status = registry.status(job_id).expect("job should exist");
        assert_eq!(status.state, JobState::Error);
        assert_eq!(status.progress, 25);
        let timeline = registry.timeline(job_id).expect("timeline should exist");
        assert_eq!(timeline.len(), 3);
        assert_eq!(timeline[2].step, "error");
    }

    #[test]
    fn capacity_evicts_only_terminal_jobs() {
        let registry = registry();
        let active = registry.insert(MixJob::new("a"));
        let done = registry.insert(MixJob::new("b"));
        registry.complete(done, "done");
        let third = registry.insert(MixJob::new("c"));
        assert!(registry.job(active).is_some());
        assert!(registry.job(done).is_none());
        assert!(registry.job(third).is_some());

        let fourth = registry.insert(MixJob::new("d"));
        assert_eq!(registry.len(), 3);
        assert!(registry.job(fourth).is_some());
    }

    #[test]
    fn ttl_prunes_old_terminal_jobs() {
        let registry = JobRegistry::new(16, Duration::from_secs(60));
        let job_id = registry.insert(MixJob::new("s"));
        registry.fail(job_id, &MixError::NoStems);
        assert_eq!(registry.prune(Utc::now()), 0);
        assert_eq!(registry.prune(Utc::now() + chrono::Duration::seconds(120)), 1);
        assert!(registry.is_empty());
    }
}
