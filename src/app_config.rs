//! Server configuration: optional TOML file merged under CLI flags.

use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use segment_downloader::download::constants::REQUEST_TIMEOUT_SECS;
use segment_downloader::download::{DEFAULT_CONCURRENCY, DEFAULT_MAX_ATTEMPTS};
use segment_downloader::job::DEFAULT_MAX_SEGMENTS;

use crate::cli::Args;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_BIND: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);
const DEFAULT_OUTPUT_DIR: &str = "public";
const DEFAULT_BATCH_PAUSE_MS: u64 = 1000;
const DEFAULT_PROGRESS_GRACE_MS: u64 = 1000;

/// TOML-backed file configuration. Every key is optional.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Listen address.
    pub bind: Option<IpAddr>,
    /// Listen port.
    pub port: Option<u16>,
    /// Directory merged artifacts are written to and served from.
    pub output_dir: Option<PathBuf>,
    /// Base URL used in `downloadUrl` values.
    pub public_url: Option<String>,
    /// Per-request timeout for segments and manifests.
    pub request_timeout_secs: Option<u64>,
    /// Attempts per segment, including the first.
    pub max_attempts: Option<u32>,
    /// Pause between download windows.
    pub batch_pause_ms: Option<u64>,
    /// Wait after a terminal progress event before the stream closes.
    pub progress_grace_ms: Option<u64>,
    /// Concurrency used when a request omits it.
    pub default_concurrency: Option<usize>,
    /// Largest `start..=end` span a template download may request.
    pub max_segments: Option<u64>,
}

impl FileConfig {
    /// Validates config values against runtime constraints.
    pub fn validate(&self) -> Result<()> {
        check_range("request_timeout_secs", self.request_timeout_secs, 1, 600)?;
        check_range("max_attempts", self.max_attempts.map(u64::from), 1, 10)?;
        check_range("batch_pause_ms", self.batch_pause_ms, 0, 60_000)?;
        check_range("progress_grace_ms", self.progress_grace_ms, 0, 60_000)?;
        check_range(
            "default_concurrency",
            self.default_concurrency.map(|c| c as u64),
            1,
            20,
        )?;
        check_range("max_segments", self.max_segments, 1, 1_000_000)?;

        if let Some(url) = &self.public_url {
            if url::Url::parse(url).is_err() {
                bail!("Invalid config value for `public_url`: {url}. Expected an absolute URL");
            }
        }
        Ok(())
    }
}

fn check_range(field: &str, value: Option<u64>, min: u64, max: u64) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(min..=max).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: {min}..={max}");
    }
    Ok(())
}

/// Loads and validates a config file.
pub fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    parse_file_config(&raw).with_context(|| format!("Invalid config file {}", path.display()))
}

fn parse_file_config(raw: &str) -> Result<FileConfig> {
    let config: FileConfig = toml::from_str(raw)?;
    config.validate()?;
    Ok(config)
}

/// Effective settings after applying defaults, file values and CLI flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    pub bind: IpAddr,
    pub port: u16,
    pub output_dir: PathBuf,
    pub public_url: String,
    pub request_timeout: Duration,
    pub max_attempts: u32,
    pub batch_pause: Duration,
    pub progress_grace: Duration,
    pub default_concurrency: usize,
    pub max_segments: u64,
}

impl ServerSettings {
    /// Resolves settings. CLI flags win over file values, which win over defaults.
    #[must_use]
    pub fn resolve(args: &Args, file: &FileConfig) -> Self {
        let bind = args.bind.or(file.bind).unwrap_or(DEFAULT_BIND);
        let port = args.port.or(file.port).unwrap_or(DEFAULT_PORT);
        let output_dir = args
            .output_dir
            .clone()
            .or_else(|| file.output_dir.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));
        let public_url = args
            .public_url
            .clone()
            .or_else(|| file.public_url.clone())
            .unwrap_or_else(|| format!("http://localhost:{port}"));

        Self {
            bind,
            port,
            output_dir,
            public_url,
            request_timeout: Duration::from_secs(
                file.request_timeout_secs.unwrap_or(REQUEST_TIMEOUT_SECS),
            ),
            max_attempts: file.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS),
            batch_pause: Duration::from_millis(
                file.batch_pause_ms.unwrap_or(DEFAULT_BATCH_PAUSE_MS),
            ),
            progress_grace: Duration::from_millis(
                file.progress_grace_ms.unwrap_or(DEFAULT_PROGRESS_GRACE_MS),
            ),
            default_concurrency: file.default_concurrency.unwrap_or(DEFAULT_CONCURRENCY),
            max_segments: file.max_segments.unwrap_or(DEFAULT_MAX_SEGMENTS),
        }
    }

    /// Socket address to listen on.
    #[must_use]
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}
