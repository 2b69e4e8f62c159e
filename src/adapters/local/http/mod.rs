//! HTTP inbound adapter.
//!
//! Thin axum routes over [`AnalysisService`]. Handlers only translate between
//! HTTP and the service API; all job semantics live in the application layer.

mod error;
mod files;
mod jobs;
mod upload;

pub use error::ApiError;
pub use files::path_is_valid;
pub use upload::stream_to_file;

use crate::application::service::AnalysisService;
use crate::ports::storage::StoragePort;
use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;

pub fn router<S>(service: Arc<AnalysisService<S>>) -> Router
where
    S: StoragePort + 'static,
{
    Router::new()
        .route("/", get(health))
        .route("/upload-video", post(upload::upload_video::<S>))
        .route("/job-status/:job_id", get(jobs::job_status::<S>))
        .route("/results/:job_id", get(jobs::results::<S>))
        .route("/download-results/:job_id", get(files::download_results::<S>))
        .route("/thumbnail/:filename", get(files::thumbnail::<S>))
        .route("/jobs", get(jobs::list_jobs::<S>))
        .route("/job/:job_id", delete(jobs::delete_job::<S>))
        .layer(DefaultBodyLimit::disable())
        .with_state(service)
}

/// `*` allows any origin, anything else is used as the single allowed origin.
pub fn cors_layer(origin: &str) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origin == "*" {
        return layer.allow_origin(Any);
    }
    match HeaderValue::from_str(origin) {
        Ok(origin) => layer.allow_origin(origin),
        Err(_) => {
            warn!(origin, "Invalid CORS origin, allowing any origin");
            layer.allow_origin(Any)
        }
    }
}

async fn health() -> Json<Value> {
    Json(json!({
        "message": "Video Analysis Pipeline API",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::local::fs::FsAdapter;
    use crate::application::pipeline::AnalysisOptions;
    use crate::domain::error::{AnalysisError, StorageError};
    use crate::domain::jobs::JobStatus;
    use crate::domain::report::AnalysisReport;
    use crate::ports::decoder::{MockVideoDecoder, VideoDecoder};
    use crate::testing::{SyntheticDecoder, SyntheticVideo};
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use axum::response::Response;
    use async_trait::async_trait;
    use std::path::{Path, PathBuf};
    use std::time::Duration;
    use tempfile::{tempdir, TempDir};
    use tokio::sync::Semaphore;
    use tower::ServiceExt;

    const BOUNDARY: &str = "framelens-boundary";

    struct TestApp {
        _dir: TempDir,
        service: Arc<AnalysisService<FsAdapter>>,
        router: Router,
    }

    async fn app(decoder: impl VideoDecoder + 'static) -> TestApp {
        let dir = tempdir().unwrap();
        let storage = FsAdapter::new(dir.path().join("uploads"), dir.path().join("results"));
        storage.ensure_dirs().await.unwrap();
        let service = Arc::new(AnalysisService::new(
            Arc::new(decoder),
            Arc::new(storage),
            AnalysisOptions::default(),
            2,
        ));
        TestApp {
            _dir: dir,
            router: router(service.clone()),
            service,
        }
    }

    fn multipart(content_type: &str, filename: &str, payload: &[u8]) -> Request<Body> {
        let mut body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{f}\"\r\nContent-Type: {c}\r\n\r\n",
            b = BOUNDARY,
            f = filename,
            c = content_type
        )
        .into_bytes();
        body.extend_from_slice(payload);
        body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

        Request::builder()
            .method("POST")
            .uri("/upload-video")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn send(app: &TestApp, request: Request<Body>) -> Response {
        app.router.clone().oneshot(request).await.unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn wait_until_terminal(app: &TestApp, job_id: &str) -> JobStatus {
        for _ in 0..500 {
            let status = app.service.get_status(job_id).unwrap().status;
            if status.is_terminal() {
                return status;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {} did not finish", job_id);
    }

    #[tokio::test]
    async fn test_health() {
        let app = app(SyntheticDecoder(SyntheticVideo::constant(10, 30.0, 0))).await;
        let response = send(&app, get("/")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "running");
    }

    #[tokio::test]
    async fn test_upload_rejects_non_video() {
        let app = app(SyntheticDecoder(SyntheticVideo::constant(10, 30.0, 0))).await;
        let response = send(&app, multipart("text/plain", "notes.txt", b"hello")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["detail"], "File must be a video");
        assert!(app.service.list_jobs().is_empty());
    }

    #[tokio::test]
    async fn test_full_job_lifecycle_over_http() {
        let app = app(SyntheticDecoder(SyntheticVideo::cut_at(300, 30.0, 150))).await;

        let response = send(&app, multipart("video/mp4", "clip.mp4", &[0u8; 2048])).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        let job_id = body["job_id"].as_str().unwrap().to_string();
        assert_eq!(body["status"], "queued");

        assert_eq!(wait_until_terminal(&app, &job_id).await, JobStatus::Completed);

        let response = send(&app, get(&format!("/job-status/{}", job_id))).await;
        assert_eq!(response.status(), StatusCode::OK);
        let status = json_body(response).await;
        assert_eq!(status["progress"], 100);
        assert_eq!(status["filename"], "clip.mp4");

        let response = send(&app, get(&format!("/results/{}", job_id))).await;
        assert_eq!(response.status(), StatusCode::OK);
        let report = json_body(response).await;
        assert_eq!(report["scene_detection"]["total_scenes"], 2);
        assert_eq!(report["thumbnails"].as_array().unwrap().len(), 5);

        let response = send(&app, get(&format!("/download-results/{}", job_id))).await;
        assert_eq!(response.status(), StatusCode::OK);
        let disposition = response.headers()[header::CONTENT_DISPOSITION].to_str().unwrap();
        assert!(disposition.contains(&format!("{}_results.json", job_id)));

        let response = send(&app, get(&format!("/thumbnail/{}_thumb_2.jpg", job_id))).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/jpeg");

        let response = send(&app, get(&format!("/thumbnail/{}_results.json", job_id))).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = send(&app, get("/jobs")).await;
        let jobs = json_body(response).await;
        assert_eq!(jobs["jobs"][0]["job_id"], job_id.as_str());

        let request = Request::builder()
            .method("DELETE")
            .uri(format!("/job/{}", job_id))
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(&app, request).await.status(), StatusCode::OK);

        let response = send(&app, get(&format!("/job-status/{}", job_id))).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let response = send(&app, get(&format!("/thumbnail/{}_thumb_2.jpg", job_id))).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_failed_job_results_are_bad_request() {
        let mut decoder = MockVideoDecoder::new();
        decoder
            .expect_open()
            .returning(|_| Err(AnalysisError::UnreadableVideo("corrupt header".to_string())));
        let app = app(decoder).await;

        let response = send(&app, multipart("video/quicktime", "clip.mov", b"junk")).await;
        let job_id = json_body(response).await["job_id"].as_str().unwrap().to_string();
        assert_eq!(wait_until_terminal(&app, &job_id).await, JobStatus::Failed);

        let response = send(&app, get(&format!("/results/{}", job_id))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let detail = json_body(response).await["detail"].as_str().unwrap().to_string();
        assert!(detail.contains("corrupt header"));

        let response = send(&app, get(&format!("/download-results/{}", job_id))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_job_routes_are_not_found() {
        let app = app(SyntheticDecoder(SyntheticVideo::constant(10, 30.0, 0))).await;
        for uri in ["/job-status/nope", "/results/nope", "/download-results/nope", "/thumbnail/nope.jpg"] {
            let response = send(&app, get(uri)).await;
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "{}", uri);
        }
        let request = Request::builder()
            .method("DELETE")
            .uri("/job/nope")
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(&app, request).await.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_rejected_upload_is_removed() {
        let app = app(SyntheticDecoder(SyntheticVideo::constant(10, 30.0, 0))).await;
        let first = app.service.storage().upload_path("dup", "mp4");
        tokio::fs::write(&first, b"first").await.unwrap();
        app.service
            .create_job("dup".to_string(), "first.mp4".to_string(), first.clone())
            .unwrap();

        let second = app.service.storage().upload_path("dup", "mov");
        tokio::fs::write(&second, b"second").await.unwrap();
        let err = upload::register_upload(
            &app.service,
            "dup".to_string(),
            "second.mov".to_string(),
            second.clone(),
        )
        .await
        .unwrap_err();

        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(!second.exists());
        assert!(first.exists());
        assert_eq!(app.service.get_status("dup").unwrap().filename, "first.mp4");
    }

    /// Filesystem storage whose `write_report` stays pending, with the report
    /// already on disk, until a permit is added.
    struct HeldReports {
        inner: FsAdapter,
        release: Semaphore,
    }

    #[async_trait]
    impl StoragePort for HeldReports {
        fn upload_path(&self, job_id: &str, extension: &str) -> PathBuf {
            self.inner.upload_path(job_id, extension)
        }

        async fn write_artifact(&self, filename: &str, bytes: Vec<u8>) -> Result<(), StorageError> {
            self.inner.write_artifact(filename, bytes).await
        }

        async fn write_report(&self, report: &AnalysisReport) -> Result<String, StorageError> {
            let filename = self.inner.write_report(report).await?;
            let _permit = self.release.acquire().await;
            Ok(filename)
        }

        async fn read_artifact(&self, filename: &str) -> Result<Option<Vec<u8>>, StorageError> {
            self.inner.read_artifact(filename).await
        }

        async fn purge_artifacts(&self, job_id: &str) -> Result<(), StorageError> {
            self.inner.purge_artifacts(job_id).await
        }

        async fn remove_upload(&self, path: &Path) -> Result<(), StorageError> {
            self.inner.remove_upload(path).await
        }
    }

    #[tokio::test]
    async fn test_download_waits_for_completion() {
        let dir = tempdir().unwrap();
        let inner = FsAdapter::new(dir.path().join("uploads"), dir.path().join("results"));
        inner.ensure_dirs().await.unwrap();
        let storage = Arc::new(HeldReports {
            inner,
            release: Semaphore::new(0),
        });
        let service = Arc::new(AnalysisService::new(
            Arc::new(SyntheticDecoder(SyntheticVideo::constant(60, 30.0, 90))),
            storage.clone(),
            AnalysisOptions::default(),
            1,
        ));
        let router = router(service.clone());

        let response = router
            .clone()
            .oneshot(multipart("video/mp4", "clip.mp4", &[0u8; 512]))
            .await
            .unwrap();
        let job_id = json_body(response).await["job_id"].as_str().unwrap().to_string();

        let report = dir.path().join(format!("results/{}_results.json", job_id));
        for _ in 0..500 {
            if report.exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(report.exists());
        assert_eq!(service.get_status(&job_id).unwrap().status, JobStatus::Processing);

        let uri = format!("/download-results/{}", job_id);
        let response = router.clone().oneshot(get(&uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let detail = json_body(response).await["detail"].as_str().unwrap().to_string();
        assert!(detail.contains("processing"));

        storage.release.add_permits(1);
        for _ in 0..500 {
            if service.get_status(&job_id).unwrap().status.is_terminal() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(service.get_status(&job_id).unwrap().status, JobStatus::Completed);

        let response = router.clone().oneshot(get(&uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
