use crate::domain::av::thumbnails::thumbnail_owner;
use crate::domain::error::StorageError;
use crate::domain::report::{report_filename, AnalysisReport};
use crate::ports::storage::StoragePort;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Uploads and result files on the local filesystem.
///
/// ```text
/// <upload_dir>/<job_id>.<ext>
/// <results_dir>/<job_id>_results.json
/// <results_dir>/<job_id>_thumb_<n>.jpg
/// ```
#[derive(Clone, Debug)]
pub struct FsAdapter {
    upload_dir: PathBuf,
    results_dir: PathBuf,
}

impl FsAdapter {
    pub fn new(upload_dir: impl Into<PathBuf>, results_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            results_dir: results_dir.into(),
        }
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    pub fn results_dir(&self) -> &Path {
        &self.results_dir
    }

    /// Create both directories if missing.
    pub async fn ensure_dirs(&self) -> Result<(), StorageError> {
        for dir in [&self.upload_dir, &self.results_dir] {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| StorageError::io(dir, e))?;
        }
        Ok(())
    }

    fn artifact_path(&self, filename: &str) -> PathBuf {
        self.results_dir.join(filename)
    }
}

/// Whether `filename` is one of the result files written for `job_id`.
fn belongs_to(filename: &str, job_id: &str) -> bool {
    if filename == report_filename(job_id) {
        return true;
    }
    thumbnail_owner(filename) == Some(job_id)
}

async fn remove_if_exists(path: &Path) -> Result<(), StorageError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StorageError::io(path, e)),
    }
}

#[async_trait]
impl StoragePort for FsAdapter {
    fn upload_path(&self, job_id: &str, extension: &str) -> PathBuf {
        self.upload_dir.join(format!("{}.{}", job_id, extension))
    }

    async fn write_artifact(&self, filename: &str, bytes: Vec<u8>) -> Result<(), StorageError> {
        let path = self.artifact_path(filename);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| StorageError::io(&path, e))
    }

    async fn write_report(&self, report: &AnalysisReport) -> Result<String, StorageError> {
        let filename = report_filename(&report.job_id);
        let json = serde_json::to_vec_pretty(report)?;
        self.write_artifact(&filename, json).await?;
        Ok(filename)
    }

    async fn read_artifact(&self, filename: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let path = self.artifact_path(filename);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::io(&path, e)),
        }
    }

    async fn purge_artifacts(&self, job_id: &str) -> Result<(), StorageError> {
        let mut entries = match tokio::fs::read_dir(&self.results_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(StorageError::io(&self.results_dir, e)),
        };

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StorageError::io(&self.results_dir, e))?
        {
            let name = entry.file_name();
            if name.to_str().map_or(false, |name| belongs_to(name, job_id)) {
                remove_if_exists(&entry.path()).await?;
            }
        }
        Ok(())
    }

    async fn remove_upload(&self, path: &Path) -> Result<(), StorageError> {
        remove_if_exists(path).await
    }
}
