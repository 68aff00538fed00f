//! CLI argument definitions using clap derive macros.

use std::net::IpAddr;
use std::path::PathBuf;

use clap::Parser;

/// Download numbered media segments or playlists and merge them into one file.
///
/// Starts an HTTP server exposing the download routes, a live progress
/// stream per session and management of the merged files.
#[derive(Parser, Debug)]
#[command(name = "segment-downloader")]
#[command(author, version, about)]
pub struct Args {
    /// Path to a TOML config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Address to listen on [default: 127.0.0.1]
    #[arg(long)]
    pub bind: Option<IpAddr>,

    /// Port to listen on [default: 3000]
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Directory for merged files [default: ./public]
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Base URL used when building download links
    #[arg(long)]
    pub public_url: Option<String>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Log level implied by `-v` / `-q`, used when `RUST_LOG` is unset.
    #[must_use]
    pub fn default_log_level(&self) -> &'static str {
        if self.quiet {
            "error"
        } else {
            match self.verbose {
                0 => "info",
                1 => "debug",
                _ => "trace",
            }
        }
    }
}
