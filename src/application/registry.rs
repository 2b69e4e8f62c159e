//! Process-wide job registry.
//!
//! The map itself is only locked to insert, remove or look up entries. Each
//! entry carries its own lock, written solely by that job's pipeline, so
//! progress updates of one job never wait on another job.

use crate::domain::error::JobError;
use crate::domain::jobs::{JobSpec, JobState, JobStatusView, JobSummary, RejectedTransition};
use crate::domain::report::AnalysisReport;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::warn;

#[derive(Debug)]
pub struct JobEntry {
    spec: JobSpec,
    state: RwLock<JobState>,
    cancel: CancellationToken,
}

impl JobEntry {
    pub fn new(spec: JobSpec) -> Self {
        Self {
            spec,
            state: RwLock::new(JobState::queued()),
            cancel: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.spec.id
    }

    pub fn filename(&self) -> &str {
        &self.spec.filename
    }

    pub fn video_path(&self) -> &Path {
        &self.spec.video_path
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.spec.created_at
    }

    /// A consistent copy of the mutable state.
    pub fn snapshot(&self) -> JobState {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn status_view(&self) -> JobStatusView {
        let state = self.snapshot();
        JobStatusView {
            job_id: self.spec.id.clone(),
            filename: self.spec.filename.clone(),
            status: state.status,
            progress: state.progress,
            current_step: state.current_step,
            message: state.message,
            created_at: self.spec.created_at,
            updated_at: state.updated_at,
            completed_at: state.completed_at,
            error: state.error,
        }
    }

    pub fn summary(&self) -> JobSummary {
        let state = self.snapshot();
        JobSummary {
            job_id: self.spec.id.clone(),
            filename: self.spec.filename.clone(),
            status: state.status,
            progress: state.progress,
            created_at: self.spec.created_at,
        }
    }

    pub fn start(&self) -> bool {
        self.update(|state| state.start())
    }

    pub fn advance(&self, progress: u8, step: &str, message: &str) -> bool {
        self.update(|state| state.advance(progress, step, message))
    }

    pub fn complete(&self, report: Arc<AnalysisReport>) -> bool {
        self.update(|state| state.complete(report))
    }

    pub fn fail(&self, error: String) -> bool {
        self.update(|state| state.fail(error))
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once the job has been cancelled.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    fn update(&self, apply: impl FnOnce(&mut JobState) -> Result<(), RejectedTransition>) -> bool {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        match apply(&mut state) {
            Ok(()) => true,
            Err(rejected) => {
                warn!(
                    job_id = %self.spec.id,
                    from = %rejected.from,
                    to = %rejected.to,
                    "Ignoring illegal job transition"
                );
                false
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: RwLock<HashMap<String, Arc<JobEntry>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, spec: JobSpec) -> Result<Arc<JobEntry>, JobError> {
        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
        if jobs.contains_key(&spec.id) {
            return Err(JobError::AlreadyExists(spec.id));
        }
        let entry = Arc::new(JobEntry::new(spec));
        jobs.insert(entry.id().to_string(), entry.clone());
        Ok(entry)
    }

    pub fn get(&self, job_id: &str) -> Option<Arc<JobEntry>> {
        self.jobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(job_id)
            .cloned()
    }

    pub fn remove(&self, job_id: &str) -> Option<Arc<JobEntry>> {
        self.jobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(job_id)
    }

    /// All jobs, oldest first.
    pub fn list(&self) -> Vec<Arc<JobEntry>> {
        let mut jobs: Vec<Arc<JobEntry>> = self
            .jobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        jobs.sort_by(|a, b| {
            a.created_at()
                .cmp(&b.created_at())
                .then_with(|| a.id().cmp(b.id()))
        });
        jobs
    }

    pub fn len(&self) -> usize {
        self.jobs.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::jobs::JobStatus;
    use chrono::Duration;
    use std::path::PathBuf;

    fn spec(id: &str, age_seconds: i64) -> JobSpec {
        JobSpec {
            id: id.to_string(),
            filename: format!("{}.mp4", id),
            video_path: PathBuf::from(format!("/tmp/{}.mp4", id)),
            created_at: Utc::now() - Duration::seconds(age_seconds),
        }
    }

    #[test]
    fn test_insert_get_remove() {
        let registry = JobRegistry::new();
        let entry = registry.insert(spec("a", 0)).unwrap();
        assert_eq!(entry.summary().status, JobStatus::Queued);
        assert!(registry.get("a").is_some());

        assert!(matches!(
            registry.insert(spec("a", 0)),
            Err(JobError::AlreadyExists(_))
        ));

        assert!(registry.remove("a").is_some());
        assert!(registry.get("a").is_none());
        assert!(registry.remove("a").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_list_is_oldest_first() {
        let registry = JobRegistry::new();
        registry.insert(spec("new", 1)).unwrap();
        registry.insert(spec("old", 60)).unwrap();
        registry.insert(spec("mid", 30)).unwrap();

        let ids: Vec<String> = registry.list().iter().map(|e| e.id().to_string()).collect();
        assert_eq!(ids, vec!["old", "mid", "new"]);
    }

    #[test]
    fn test_entry_rejects_illegal_transitions() {
        let entry = JobEntry::new(spec("a", 0));
        assert!(!entry.advance(10, "basic_info", "too early"));
        assert!(entry.start());
        assert!(!entry.start());
        assert!(entry.advance(10, "basic_info", "Extracting"));
        assert!(entry.fail("decode error".to_string()));
        assert!(!entry.advance(20, "frame_analysis", "after failure"));

        let view = entry.status_view();
        assert_eq!(view.status, JobStatus::Failed);
        assert_eq!(view.progress, 10);
        assert_eq!(view.error.as_deref(), Some("decode error"));
    }

    #[test]
    fn test_removed_entry_keeps_cancellation() {
        let registry = JobRegistry::new();
        let entry = registry.insert(spec("a", 0)).unwrap();
        let removed = registry.remove("a").unwrap();
        removed.cancel();
        assert!(entry.is_cancelled());
    }

    #[test]
    fn test_concurrent_readers_see_monotonic_progress() {
        let entry = Arc::new(JobEntry::new(spec("a", 0)));
        entry.start();

        let writer = {
            let entry = entry.clone();
            std::thread::spawn(move || {
                for p in 0..=100u8 {
                    entry.advance(p, "frame_analysis", "");
                }
            })
        };
        let reader = {
            let entry = entry.clone();
            std::thread::spawn(move || {
                let mut last = 0;
                for _ in 0..1000 {
                    let progress = entry.summary().progress;
                    assert!(progress >= last);
                    last = progress;
                }
            })
        };
        writer.join().unwrap();
        reader.join().unwrap();
        assert_eq!(entry.summary().progress, 100);
    }
}
