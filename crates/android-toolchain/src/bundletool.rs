//! bundletool Management
//!
//! Keeps a copy of Google's bundletool jar in the per-user cache and runs it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use droidpack_core::{BundletoolConfig, CommandOptions, CommandRunner, RunError};
use tracing::info;

use crate::downloader::{DownloadError, ToolDownloader};

/// Locates, downloads and invokes bundletool
pub struct BundletoolManager {
    runner: Arc<dyn CommandRunner>,
    downloader: ToolDownloader,
    config: BundletoolConfig,
    cache_dir: PathBuf,
}

impl BundletoolManager {
    pub fn new(runner: Arc<dyn CommandRunner>, config: BundletoolConfig, cache_dir: PathBuf) -> Self {
        Self {
            downloader: ToolDownloader::new(runner.clone()),
            runner,
            config,
            cache_dir,
        }
    }

    /// Where the jar lives once downloaded
    pub fn jar_path(&self) -> PathBuf {
        self.cache_dir.join(self.config.jar_name())
    }

    pub fn is_installed(&self) -> bool {
        self.jar_path().is_file()
    }

    /// Return the cached jar, downloading it first if needed.
    ///
    /// The download lands on a `.part` file that is renamed into place only
    /// after it completed (and matched the configured checksum), so an
    /// interrupted download never leaves a broken jar in the cache.
    pub async fn ensure(&self) -> Result<PathBuf, DownloadError> {
        let jar = self.jar_path();
        if jar.is_file() {
            return Ok(jar);
        }

        info!("bundletool {} not cached, downloading...", self.config.version);

        let partial = jar.with_extension("jar.part");
        self.downloader
            .download_file(&self.config.download_url(), &partial)
            .await?;

        if let Some(ref expected) = self.config.sha256 {
            if let Err(e) = ToolDownloader::verify_checksum(&partial, expected).await {
                let _ = tokio::fs::remove_file(&partial).await;
                return Err(e);
            }
        }

        tokio::fs::rename(&partial, &jar).await?;
        info!("bundletool installed to {:?}", jar);
        Ok(jar)
    }

    /// Run `bundletool build-apks` in universal mode
    pub async fn build_universal_apks(
        &self,
        jar: &Path,
        bundle: &Path,
        output: &Path,
    ) -> Result<(), RunError> {
        let args = vec![
            "-jar".to_string(),
            jar.to_string_lossy().to_string(),
            "build-apks".to_string(),
            format!("--bundle={}", bundle.display()),
            format!("--output={}", output.display()),
            "--mode=universal".to_string(),
            "--overwrite".to_string(),
        ];

        self.runner
            .run("java", &args, &CommandOptions::inherit())
            .await
            .map(|_| ())
    }
}
