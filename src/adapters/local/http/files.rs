use super::error::ApiError;
use crate::application::service::AnalysisService;
use crate::domain::av::thumbnails::thumbnail_owner;
use crate::domain::report::report_filename;
use crate::ports::storage::StoragePort;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use std::path::{Component, Path as FsPath};
use std::sync::Arc;
use tracing::debug;

/// The stored report as a JSON attachment, once the job has completed.
pub async fn download_results<S>(
    State(service): State<Arc<AnalysisService<S>>>,
    Path(job_id): Path<String>,
) -> Result<Response, ApiError>
where
    S: StoragePort + 'static,
{
    service.get_result(&job_id)?;

    let filename = report_filename(&job_id);
    let bytes = service
        .storage()
        .read_artifact(&filename)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .ok_or_else(|| ApiError::NotFound("Results file not found".to_string()))?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        bytes,
    )
        .into_response())
}

pub async fn thumbnail<S>(
    State(service): State<Arc<AnalysisService<S>>>,
    Path(filename): Path<String>,
) -> Result<Response, ApiError>
where
    S: StoragePort + 'static,
{
    if !path_is_valid(&filename) {
        return Err(ApiError::BadRequest("Invalid path".to_string()));
    }
    if thumbnail_owner(&filename).is_none() {
        return Err(ApiError::NotFound("Thumbnail not found".to_string()));
    }

    let bytes = service
        .storage()
        .read_artifact(&filename)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .ok_or_else(|| ApiError::NotFound("Thumbnail not found".to_string()))?;

    Ok(([(header::CONTENT_TYPE, "image/jpeg")], bytes).into_response())
}

/// A single plain file name, nothing that could leave the results directory.
pub fn path_is_valid(path: &str) -> bool {
    let mut components = FsPath::new(path).components();
    let valid = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );
    if !valid {
        debug!(path, "Rejected path");
    }
    valid
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_path() {
        assert!(path_is_valid("abc_thumb_0.jpg"));
    }

    #[test]
    fn test_invalid_path_with_parent() {
        assert!(!path_is_valid("../abc_thumb_0.jpg"));
        assert!(!path_is_valid(".."));
    }

    #[test]
    fn test_invalid_path_with_multiple_components() {
        assert!(!path_is_valid("dir1/dir2"));
    }

    #[test]
    fn test_invalid_path_with_root() {
        assert!(!path_is_valid("/etc"));
        assert!(!path_is_valid(""));
    }
}
