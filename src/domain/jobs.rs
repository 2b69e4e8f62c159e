use crate::domain::report::AnalysisReport;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

pub fn new_job_id() -> String {
    Uuid::new_v4().to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// A transition the job state machine refused to apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedTransition {
    pub from: JobStatus,
    pub to: JobStatus,
}

/// Mutable part of a job. Status only moves forward:
/// queued -> processing -> {completed, failed}, or queued -> failed.
#[derive(Debug, Clone)]
pub struct JobState {
    pub status: JobStatus,
    pub progress: u8,
    pub current_step: String,
    pub message: String,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub result: Option<Arc<AnalysisReport>>,
    pub error: Option<String>,
}

impl JobState {
    pub fn queued() -> Self {
        Self {
            status: JobStatus::Queued,
            progress: 0,
            current_step: "initialized".to_string(),
            message: "Waiting for an analysis worker".to_string(),
            updated_at: Utc::now(),
            completed_at: None,
            result: None,
            error: None,
        }
    }

    pub fn start(&mut self) -> Result<(), RejectedTransition> {
        self.transition(JobStatus::Processing)?;
        self.current_step = "starting".to_string();
        self.message = "Analysis started".to_string();
        Ok(())
    }

    /// Moves progress forward. Progress never decreases; a lower value only
    /// updates the step label.
    pub fn advance(
        &mut self,
        progress: u8,
        step: &str,
        message: &str,
    ) -> Result<(), RejectedTransition> {
        if self.status != JobStatus::Processing {
            return Err(RejectedTransition {
                from: self.status,
                to: JobStatus::Processing,
            });
        }
        self.progress = self.progress.max(progress.min(100));
        self.current_step = step.to_string();
        self.message = message.to_string();
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn complete(&mut self, report: Arc<AnalysisReport>) -> Result<(), RejectedTransition> {
        self.transition(JobStatus::Completed)?;
        self.progress = 100;
        self.current_step = "completed".to_string();
        self.message = "Analysis completed successfully".to_string();
        self.completed_at = Some(self.updated_at);
        self.result = Some(report);
        Ok(())
    }

    pub fn fail(&mut self, error: String) -> Result<(), RejectedTransition> {
        self.transition(JobStatus::Failed)?;
        self.message = format!("Analysis failed during {}", self.current_step);
        self.error = Some(error);
        self.result = None;
        Ok(())
    }

    fn transition(&mut self, to: JobStatus) -> Result<(), RejectedTransition> {
        let allowed = matches!(
            (self.status, to),
            (JobStatus::Queued, JobStatus::Processing)
                | (JobStatus::Queued, JobStatus::Failed)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Processing, JobStatus::Failed)
        );
        if !allowed {
            return Err(RejectedTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// What a status poll returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatusView {
    pub job_id: String,
    pub filename: String,
    pub status: JobStatus,
    pub progress: u8,
    pub current_step: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

/// One line of the job listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSummary {
    pub job_id: String,
    pub filename: String,
    pub status: JobStatus,
    pub progress: u8,
    pub created_at: DateTime<Utc>,
}

/// Immutable facts about a submitted job.
#[derive(Debug, Clone)]
pub struct JobSpec {
    pub id: String,
    pub filename: String,
    pub video_path: PathBuf,
    pub created_at: DateTime<Utc>,
}
