//! Server entry point for the segment downloader.

use anyhow::{Context, Result};
use clap::Parser;
use segment_downloader::artifacts::ArtifactStore;
use segment_downloader::download::{HttpClient, RetryPolicy};
use segment_downloader::download::constants::RETRY_DELAY_UNIT;
use segment_downloader::job::JobRunner;
use segment_downloader::merge::MergeWriter;
use segment_downloader::progress::ProgressStore;
use segment_downloader::server::{self, AppState};
use tokio::net::TcpListener;
use tracing::{debug, info};

mod app_config;
mod cli;

use app_config::{FileConfig, ServerSettings, load_file_config};
use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(args.default_log_level()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    debug!(?args, "CLI arguments parsed");

    let file_config = match &args.config {
        Some(path) => load_file_config(path)?,
        None => FileConfig::default(),
    };
    let settings = ServerSettings::resolve(&args, &file_config);
    debug!(?settings, "effective settings");

    tokio::fs::create_dir_all(&settings.output_dir)
        .await
        .with_context(|| {
            format!(
                "Failed to create output directory {}",
                settings.output_dir.display()
            )
        })?;

    let progress = ProgressStore::with_terminal_grace(settings.progress_grace);
    let runner = JobRunner::new(
        HttpClient::with_timeout(settings.request_timeout),
        RetryPolicy::new(settings.max_attempts, RETRY_DELAY_UNIT),
        MergeWriter::new(&settings.output_dir),
        progress,
    )
    .with_batch_pause(settings.batch_pause)
    .with_max_segments(settings.max_segments);

    let state = AppState::new(
        runner,
        ArtifactStore::new(&settings.output_dir),
        settings.public_url.clone(),
        settings.default_concurrency,
    );

    let addr = settings.socket_addr();
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!(public_url = %settings.public_url, "segment downloader starting");
    server::serve(listener, state).await.context("Server error")?;
    info!("segment downloader stopped");

    Ok(())
}
