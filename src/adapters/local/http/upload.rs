use super::error::ApiError;
use crate::application::service::AnalysisService;
use crate::domain::jobs::{new_job_id, JobSummary};
use crate::ports::storage::StoragePort;
use axum::body::Bytes;
use axum::extract::{Multipart, State};
use axum::{BoxError, Json};
use futures::{Stream, TryStreamExt};
use serde_json::{json, Value};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio_util::io::StreamReader;
use tracing::{info, warn};

const DEFAULT_EXTENSION: &str = "mp4";

/// Accepts a multipart form with a `file` field holding the video.
pub async fn upload_video<S>(
    State(service): State<Arc<AnalysisService<S>>>,
    mut multipart: Multipart,
) -> Result<Json<Value>, ApiError>
where
    S: StoragePort + 'static,
{
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let is_video = field
            .content_type()
            .map_or(false, |content_type| content_type.starts_with("video/"));
        if !is_video {
            return Err(ApiError::BadRequest("File must be a video".to_string()));
        }

        let filename = field.file_name().unwrap_or("upload").to_string();
        let job_id = new_job_id();
        let path = service
            .storage()
            .upload_path(&job_id, upload_extension(&filename));

        if let Err(e) = stream_to_file(&path, field).await {
            if let Err(cleanup) = service.storage().remove_upload(&path).await {
                warn!(job_id = %job_id, "Failed to remove partial upload: {}", cleanup);
            }
            return Err(ApiError::Internal(format!("Failed to store upload: {}", e)));
        }
        info!(job_id = %job_id, filename = %filename, "Stored upload");

        let summary = register_upload(&service, job_id, filename, path).await?;
        return Ok(Json(json!({
            "job_id": summary.job_id,
            "message": "Video uploaded successfully. Processing started.",
            "status": summary.status,
        })));
    }

    Err(ApiError::BadRequest("No file uploaded".to_string()))
}

/// Create the job for a stored upload. The upload is removed again when the
/// job cannot be registered.
pub(super) async fn register_upload<S>(
    service: &AnalysisService<S>,
    job_id: String,
    filename: String,
    path: PathBuf,
) -> Result<JobSummary, ApiError>
where
    S: StoragePort + 'static,
{
    match service.create_job(job_id.clone(), filename, path.clone()) {
        Ok(summary) => Ok(summary),
        Err(e) => {
            if let Err(cleanup) = service.storage().remove_upload(&path).await {
                warn!(job_id = %job_id, "Failed to remove rejected upload: {}", cleanup);
            }
            Err(e.into())
        }
    }
}

/// Extension of the client's filename when it looks sane, `mp4` otherwise.
pub fn upload_extension(filename: &str) -> &str {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.len() <= 8)
        .filter(|ext| ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or(DEFAULT_EXTENSION)
}

/// Save a `Stream` to a file.
pub async fn stream_to_file<S, E>(path: &Path, stream: S) -> io::Result<()>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Into<BoxError>,
{
    let body_with_io_error = stream.map_err(|err| io::Error::new(io::ErrorKind::Other, err));
    let body_reader = StreamReader::new(body_with_io_error);
    futures::pin_mut!(body_reader);

    let mut file = BufWriter::new(File::create(path).await?);
    tokio::io::copy(&mut body_reader, &mut file).await?;
    file.flush().await?;
    Ok(())
}
