use super::error::ApiError;
use crate::application::service::AnalysisService;
use crate::domain::jobs::JobStatusView;
use crate::ports::storage::StoragePort;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use std::sync::Arc;

pub async fn job_status<S>(
    State(service): State<Arc<AnalysisService<S>>>,
    Path(job_id): Path<String>,
) -> Result<Json<JobStatusView>, ApiError>
where
    S: StoragePort + 'static,
{
    Ok(Json(service.get_status(&job_id)?))
}

pub async fn results<S>(
    State(service): State<Arc<AnalysisService<S>>>,
    Path(job_id): Path<String>,
) -> Result<Response, ApiError>
where
    S: StoragePort + 'static,
{
    let report = service.get_result(&job_id)?;
    Ok(Json(report.as_ref()).into_response())
}

pub async fn list_jobs<S>(State(service): State<Arc<AnalysisService<S>>>) -> Json<Value>
where
    S: StoragePort + 'static,
{
    Json(json!({ "jobs": service.list_jobs() }))
}

pub async fn delete_job<S>(
    State(service): State<Arc<AnalysisService<S>>>,
    Path(job_id): Path<String>,
) -> Result<Json<Value>, ApiError>
where
    S: StoragePort + 'static,
{
    service.delete_job(&job_id).await?;
    Ok(Json(json!({ "message": "Job deleted successfully" })))
}
