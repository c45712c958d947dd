//! Tool Downloader
//!
//! Fetches files with whichever of `curl` or `wget` is installed.

use std::path::Path;
use std::sync::Arc;

use droidpack_core::process::args;
use droidpack_core::{CommandOptions, CommandRunner, RunError};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

/// Download error types
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("Neither curl nor wget is available")]
    NoDownloader,
    #[error("Download of {url} failed: {source}")]
    Failed {
        url: String,
        #[source]
        source: RunError,
    },
    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Supported download programs, in order of preference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadMethod {
    Curl,
    Wget,
}

impl DownloadMethod {
    pub fn program(&self) -> &'static str {
        match self {
            DownloadMethod::Curl => "curl",
            DownloadMethod::Wget => "wget",
        }
    }

    /// Arguments that fetch `url` into `target`, failing on HTTP errors
    pub fn args(&self, url: &str, target: &Path) -> Vec<String> {
        let target = target.to_string_lossy().to_string();
        match self {
            DownloadMethod::Curl => args(["-fL", "--silent", "--show-error", "-o", target.as_str(), url]),
            DownloadMethod::Wget => args(["-q", "-O", target.as_str(), url]),
        }
    }
}

/// Downloads files through the command runner
pub struct ToolDownloader {
    runner: Arc<dyn CommandRunner>,
}

impl ToolDownloader {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    /// Pick the first available download program
    pub fn method(&self) -> Option<DownloadMethod> {
        [DownloadMethod::Curl, DownloadMethod::Wget]
            .into_iter()
            .find(|m| self.runner.is_available(m.program()))
    }

    /// Download `url` to `target`. A partial file is removed on failure.
    pub async fn download_file(&self, url: &str, target: &Path) -> Result<(), DownloadError> {
        let method = self.method().ok_or(DownloadError::NoDownloader)?;

        info!("Downloading {} to {:?}", url, target);

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let result = self
            .runner
            .run(method.program(), &method.args(url, target), &CommandOptions::capture())
            .await;

        if let Err(source) = result {
            if let Err(e) = tokio::fs::remove_file(target).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("Could not remove partial download {:?}: {}", target, e);
                }
            }
            return Err(DownloadError::Failed {
                url: url.to_string(),
                source,
            });
        }

        debug!("Download complete: {:?}", target);
        Ok(())
    }

    /// Verify file checksum (SHA-256, hex)
    pub async fn verify_checksum(path: &Path, expected: &str) -> Result<(), DownloadError> {
        debug!("Verifying checksum for {:?}", path);

        let data = tokio::fs::read(path).await?;
        let mut hasher = Sha256::new();
        hasher.update(&data);
        let actual = hex::encode(hasher.finalize());

        if actual.eq_ignore_ascii_case(expected.trim()) {
            debug!("Checksum verified");
            Ok(())
        } else {
            Err(DownloadError::ChecksumMismatch {
                expected: expected.to_string(),
                actual,
            })
        }
    }
}
