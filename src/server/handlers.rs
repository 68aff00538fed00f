//! Route handlers.

use std::collections::HashMap;
use std::convert::Infallible;

use axum::Json;
use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use futures_util::StreamExt;
use tokio_util::io::ReaderStream;
use tracing::{debug, error, info};

use super::AppState;
use super::responses::{ErrorBody, FileEntryBody, FileListBody, MessageBody, SuccessBody};
use crate::artifacts::ArtifactError;
use crate::job::{JobError, JobReport, ManifestRequest, TemplateRequest, session_id_from};
use crate::progress::ProgressEvent;

const TRANSPORT_STREAM_MIME: &str = "video/mp2t";

pub(super) async fn download_segments(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let session_id = session_id_from(&query);
    let request = match TemplateRequest::from_query(&query, state.default_concurrency) {
        Ok(request) => request,
        Err(err) => return rejected(&state, &session_id, err.into()),
    };

    let runner = state.runner.clone();
    let id = session_id.clone();
    // The run owns its task so a dropped request does not abort it.
    let joined = tokio::spawn(async move { runner.run_template(&id, request).await }).await;
    finish_run(&state, &session_id, joined)
}

pub(super) async fn download_from_m3u8(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let session_id = session_id_from(&query);
    let request = match ManifestRequest::from_query(&query, state.default_concurrency) {
        Ok(request) => request,
        Err(err) => return rejected(&state, &session_id, err.into()),
    };

    let runner = state.runner.clone();
    let id = session_id.clone();
    let joined = tokio::spawn(async move { runner.run_manifest(&id, request).await }).await;
    finish_run(&state, &session_id, joined)
}

fn rejected(state: &AppState, session_id: &str, err: JobError) -> Response {
    state.runner.reject(session_id, &err);
    job_error_response(session_id, &err)
}

fn finish_run(
    state: &AppState,
    session_id: &str,
    joined: Result<Result<JobReport, JobError>, tokio::task::JoinError>,
) -> Response {
    match joined {
        Ok(Ok(report)) => {
            let url = state.download_url(&report.artifact.file_name);
            Json(SuccessBody::from_report(&report, url)).into_response()
        }
        Ok(Err(err)) => job_error_response(session_id, &err),
        Err(join_err) => {
            error!(session_id, error = %join_err, "run task aborted");
            let err = JobError::Aborted;
            state.runner.reject(session_id, &err);
            job_error_response(session_id, &err)
        }
    }
}

fn job_error_response(session_id: &str, err: &JobError) -> Response {
    let status = if err.is_client_error() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(ErrorBody::for_session(session_id, err.to_string()))).into_response()
}

pub(super) async fn progress(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    debug!(session_id, "progress subscriber connected");
    let events = state
        .runner
        .progress()
        .subscribe(&session_id)
        .map(|event| Ok::<_, Infallible>(sse_event(&event)));

    (
        [
            (header::CACHE_CONTROL, HeaderValue::from_static("no-cache")),
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*")),
        ],
        Sse::new(events).keep_alive(KeepAlive::default()),
    )
}

fn sse_event(event: &ProgressEvent) -> Event {
    match serde_json::to_string(event) {
        Ok(data) => Event::default().data(data),
        Err(err) => {
            error!(error = %err, "progress event serialization failed");
            Event::default().comment("serialization error")
        }
    }
}

pub(super) async fn list_files(State(state): State<AppState>) -> Response {
    match state.artifacts.list().await {
        Ok(entries) => {
            let files = entries
                .iter()
                .map(|entry| FileEntryBody::new(entry, state.download_url(&entry.name)))
                .collect();
            Json(FileListBody {
                success: true,
                files,
            })
            .into_response()
        }
        Err(err) => artifact_error_response(&err),
    }
}

pub(super) async fn delete_file(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Response {
    match state.artifacts.delete(&filename).await {
        Ok(()) => Json(MessageBody {
            success: true,
            message: "File deleted successfully".to_string(),
        })
        .into_response(),
        Err(err) => artifact_error_response(&err),
    }
}

pub(super) async fn get_file(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Response {
    let (path, size) = match state.artifacts.locate(&filename).await {
        Ok(found) => found,
        Err(err) => return artifact_error_response(&err),
    };
    let file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        Err(source) => return artifact_error_response(&ArtifactError::Io { path, source }),
    };
    info!(filename, size, "serving artifact");

    (
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(TRANSPORT_STREAM_MIME)),
            (header::CONTENT_LENGTH, HeaderValue::from(size)),
        ],
        Body::from_stream(ReaderStream::new(file)),
    )
        .into_response()
}

fn artifact_error_response(err: &ArtifactError) -> Response {
    let status = match err {
        ArtifactError::InvalidName { .. } => StatusCode::BAD_REQUEST,
        ArtifactError::NotFound { .. } => StatusCode::NOT_FOUND,
        ArtifactError::Io { .. } => {
            error!(error = %err, "artifact operation failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, Json(ErrorBody::new(err.to_string()))).into_response()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use axum::body::to_bytes;
    use tempfile::TempDir;

    use super::*;
    use crate::artifacts::ArtifactStore;
    use crate::download::{HttpClient, RetryPolicy};
    use crate::job::JobRunner;
    use crate::merge::MergeWriter;
    use crate::progress::{ProgressKind, ProgressStore};

    fn state(dir: &TempDir) -> AppState {
        let runner = JobRunner::new(
            HttpClient::new(),
            RetryPolicy::default(),
            MergeWriter::new(dir.path()),
            ProgressStore::with_terminal_grace(Duration::from_millis(20)),
        );
        AppState::new(runner, ArtifactStore::new(dir.path()), "http://localhost:3000", 5)
    }

    async fn exploding_run() -> Result<JobReport, JobError> {
        panic!("run blew up")
    }

    #[tokio::test]
    async fn test_panicked_run_publishes_terminal_error() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir);
        let joined = tokio::spawn(exploding_run()).await;
        assert!(joined.is_err());

        let response = finish_run(&state, "panicked", joined);

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "Download task aborted");
        assert_eq!(json["sessionId"], "panicked");

        let record = state.runner.progress().snapshot("panicked").unwrap();
        assert_eq!(record.kind, ProgressKind::Error);
        assert_eq!(record.message, "Download task aborted");
    }
}
