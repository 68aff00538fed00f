//! HTTP surface: download routes, progress stream and artifact management.
//!
//! | Route | Handler |
//! |-------|---------|
//! | `GET /download-segments` | template run |
//! | `GET /download-from-m3u8` | manifest run |
//! | `GET /progress/:session_id` | server-sent progress events |
//! | `GET /files` | artifact listing |
//! | `GET /files/:filename` | artifact download |
//! | `DELETE /files/:filename` | artifact removal |

mod handlers;
mod responses;

use axum::Router;
use axum::routing::get;
use tokio::net::TcpListener;
use tracing::info;

use crate::artifacts::ArtifactStore;
use crate::job::JobRunner;

pub use responses::{ErrorBody, FileEntryBody, RunStats, SuccessBody};

/// Shared state handed to every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Executes download jobs and owns the progress table.
    pub runner: JobRunner,
    /// Artifact directory access.
    pub artifacts: ArtifactStore,
    /// Base URL used to build `downloadUrl` values, without trailing slash.
    pub public_url: String,
    /// Concurrency applied when a request does not specify one.
    pub default_concurrency: usize,
}

impl AppState {
    /// Builds the state; `public_url` loses any trailing `/`.
    #[must_use]
    pub fn new(
        runner: JobRunner,
        artifacts: ArtifactStore,
        public_url: impl Into<String>,
        default_concurrency: usize,
    ) -> Self {
        let public_url = public_url.into().trim_end_matches('/').to_string();
        Self {
            runner,
            artifacts,
            public_url,
            default_concurrency,
        }
    }

    pub(crate) fn download_url(&self, file_name: &str) -> String {
        format!("{}/files/{file_name}", self.public_url)
    }
}

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/download-segments", get(handlers::download_segments))
        .route("/download-from-m3u8", get(handlers::download_from_m3u8))
        .route("/progress/:session_id", get(handlers::progress))
        .route("/files", get(handlers::list_files))
        .route(
            "/files/:filename",
            get(handlers::get_file).delete(handlers::delete_file),
        )
        .with_state(state)
}

/// Serves the router on `listener` until Ctrl-C.
///
/// # Errors
///
/// Returns an I/O error if the listener fails.
pub async fn serve(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    let addr = listener.local_addr()?;
    info!(%addr, output_dir = %state.artifacts.dir().display(), "server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown requested");
    }
}
