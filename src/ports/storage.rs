use crate::domain::error::StorageError;
use crate::domain::report::AnalysisReport;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Job-scoped persistence for uploads, thumbnails and result documents.
#[async_trait]
pub trait StoragePort: Send + Sync {
    /// Where an upload for `job_id` should be written.
    fn upload_path(&self, job_id: &str, extension: &str) -> PathBuf;

    /// Store a named artifact (thumbnail image) for a job.
    async fn write_artifact(&self, filename: &str, bytes: Vec<u8>) -> Result<(), StorageError>;

    /// Persist the final report, returning the file name it was stored under.
    async fn write_report(&self, report: &AnalysisReport) -> Result<String, StorageError>;

    /// Read back an artifact or report by file name.
    async fn read_artifact(&self, filename: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Remove every thumbnail and report belonging to `job_id`.
    async fn purge_artifacts(&self, job_id: &str) -> Result<(), StorageError>;

    /// Remove the uploaded source video.
    async fn remove_upload(&self, path: &Path) -> Result<(), StorageError>;
}
