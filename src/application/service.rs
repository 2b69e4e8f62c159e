//! Job lifecycle operations exposed to the HTTP layer.

use crate::application::pipeline::{AnalysisOptions, Pipeline};
use crate::application::registry::JobRegistry;
use crate::domain::error::JobError;
use crate::domain::jobs::{JobSpec, JobStatus, JobStatusView, JobSummary};
use crate::domain::report::AnalysisReport;
use crate::ports::decoder::VideoDecoder;
use crate::ports::storage::StoragePort;
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info};

pub struct AnalysisService<S> {
    registry: Arc<JobRegistry>,
    pipeline: Arc<Pipeline<S>>,
    storage: Arc<S>,
    permits: Arc<Semaphore>,
}

impl<S> AnalysisService<S>
where
    S: StoragePort + 'static,
{
    pub fn new(
        decoder: Arc<dyn VideoDecoder>,
        storage: Arc<S>,
        options: AnalysisOptions,
        max_concurrent_jobs: usize,
    ) -> Self {
        Self {
            registry: Arc::new(JobRegistry::new()),
            pipeline: Arc::new(Pipeline::new(decoder, storage.clone(), options)),
            storage,
            permits: Arc::new(Semaphore::new(max_concurrent_jobs.max(1))),
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Register a job for an already stored upload and start analysing it in
    /// the background. Returns as soon as the job is queued.
    pub fn create_job(
        &self,
        job_id: String,
        filename: String,
        video_path: PathBuf,
    ) -> Result<JobSummary, JobError> {
        let entry = self.registry.insert(JobSpec {
            id: job_id,
            filename,
            video_path,
            created_at: Utc::now(),
        })?;
        info!(job_id = %entry.id(), filename = %entry.filename(), "Job queued");

        let summary = entry.summary();
        let pipeline = self.pipeline.clone();
        let permits = self.permits.clone();
        tokio::spawn(async move {
            let permit = tokio::select! {
                permit = permits.acquire_owned() => permit.ok(),
                () = entry.cancelled() => None,
            };
            debug!(job_id = %entry.id(), "Job left the queue");
            pipeline.execute(entry).await;
            drop(permit);
        });

        Ok(summary)
    }

    pub fn get_status(&self, job_id: &str) -> Result<JobStatusView, JobError> {
        self.registry
            .get(job_id)
            .map(|entry| entry.status_view())
            .ok_or_else(|| JobError::NotFound(job_id.to_string()))
    }

    pub fn get_result(&self, job_id: &str) -> Result<Arc<AnalysisReport>, JobError> {
        let entry = self
            .registry
            .get(job_id)
            .ok_or_else(|| JobError::NotFound(job_id.to_string()))?;
        let state = entry.snapshot();
        match (state.status, state.result) {
            (JobStatus::Completed, Some(report)) => Ok(report),
            (JobStatus::Failed, _) => Err(JobError::Failed(
                state.error.unwrap_or_else(|| "Unknown error".to_string()),
            )),
            (status, _) => Err(JobError::NotReady {
                status,
                progress: state.progress,
            }),
        }
    }

    /// Every known job, oldest first.
    pub fn list_jobs(&self) -> Vec<JobSummary> {
        self.registry.list().iter().map(|e| e.summary()).collect()
    }

    /// Forget a job, stop its pipeline and remove its upload and results.
    pub async fn delete_job(&self, job_id: &str) -> Result<(), JobError> {
        let entry = self
            .registry
            .remove(job_id)
            .ok_or_else(|| JobError::NotFound(job_id.to_string()))?;
        entry.cancel();

        self.storage.purge_artifacts(job_id).await?;
        self.storage.remove_upload(entry.video_path()).await?;
        info!(job_id = %job_id, "Job deleted");
        Ok(())
    }
}
