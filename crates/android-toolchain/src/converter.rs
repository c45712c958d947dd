//! AAB to APK Conversion
//!
//! Turns an Android App Bundle into a single universal APK:
//! `bundletool build-apks --mode=universal` writes an `.apks` container next
//! to the output, the container is expanded into `temp_apks/`, and the
//! `universal.apk` inside it is copied to `app-universal.apk`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use droidpack_core::{BundletoolConfig, CommandRunner, RunError};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::bundletool::BundletoolManager;
use crate::downloader::DownloadError;

/// Name of the universal variant inside an `.apks` container
pub const UNIVERSAL_APK: &str = "universal.apk";

/// Stable name of the converted package
pub const OUTPUT_APK: &str = "app-universal.apk";

/// Scratch directory the container is expanded into
pub const SCRATCH_DIR: &str = "temp_apks";

/// Conversion errors
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("Bundle not found: {0}")]
    SourceNotFound(PathBuf),
    #[error("Could not obtain bundletool: {0}")]
    DownloadFailed(#[from] DownloadError),
    #[error("bundletool failed to build APKs: {0}")]
    ExpansionFailed(#[source] RunError),
    #[error("Could not expand {path}: {reason}")]
    ExtractionUnavailable { path: PathBuf, reason: String },
    #[error("No universal.apk found in {0}")]
    UniversalVariantMissing(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConvertError {
    /// Short stable tag used when reporting the failure
    pub fn category(&self) -> &'static str {
        match self {
            ConvertError::SourceNotFound(_) => "source-not-found",
            ConvertError::DownloadFailed(_) => "download",
            ConvertError::ExpansionFailed(RunError::CommandNotFound(_)) => "prerequisite",
            ConvertError::ExpansionFailed(_) => "expansion",
            ConvertError::ExtractionUnavailable { .. } => "extraction",
            ConvertError::UniversalVariantMissing(_) => "universal-variant",
            ConvertError::Io(_) => "io",
        }
    }
}

/// Paths involved in one conversion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionJob {
    pub source: PathBuf,
    pub output_dir: PathBuf,
    /// `.apks` container written by bundletool
    pub intermediate: PathBuf,
    /// Directory the container is expanded into
    pub scratch_dir: PathBuf,
    pub final_apk: PathBuf,
}

impl ConversionJob {
    pub fn new(source: &Path, output_dir: &Path) -> Self {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "app".to_string());

        Self {
            source: source.to_path_buf(),
            output_dir: output_dir.to_path_buf(),
            intermediate: output_dir.join(format!("{}.apks", stem)),
            scratch_dir: output_dir.join(SCRATCH_DIR),
            final_apk: output_dir.join(OUTPUT_APK),
        }
    }
}

/// Removes a job's intermediate file and scratch directory when dropped,
/// whether the conversion succeeded, failed or was cancelled.
struct ScratchGuard<'a> {
    job: &'a ConversionJob,
}

impl Drop for ScratchGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.job.scratch_dir) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Could not remove {:?}: {}", self.job.scratch_dir, e);
            }
        }
        if let Err(e) = std::fs::remove_file(&self.job.intermediate) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Could not remove {:?}: {}", self.job.intermediate, e);
            }
        }
        debug!("Cleaned up conversion scratch in {:?}", self.job.output_dir);
    }
}

/// Converts bundles into universal APKs
pub struct ArchiveConverter {
    bundletool: BundletoolManager,
}

impl ArchiveConverter {
    pub fn new(runner: Arc<dyn CommandRunner>, config: BundletoolConfig, cache_dir: PathBuf) -> Self {
        Self {
            bundletool: BundletoolManager::new(runner, config, cache_dir),
        }
    }

    pub fn bundletool(&self) -> &BundletoolManager {
        &self.bundletool
    }

    /// Convert `archive` into `<output_dir>/app-universal.apk`
    pub async fn convert(&self, archive: &Path, output_dir: &Path) -> Result<PathBuf, ConvertError> {
        if !archive.is_file() {
            return Err(ConvertError::SourceNotFound(archive.to_path_buf()));
        }

        info!("Converting {:?} to a universal APK", archive);

        let jar = self.bundletool.ensure().await?;
        tokio::fs::create_dir_all(output_dir).await?;

        let job = ConversionJob::new(archive, output_dir);
        let guard = ScratchGuard { job: &job };

        // Leftovers from an earlier interrupted run
        if job.scratch_dir.exists() {
            tokio::fs::remove_dir_all(&job.scratch_dir).await?;
        }

        self.bundletool
            .build_universal_apks(&jar, &job.source, &job.intermediate)
            .await
            .map_err(ConvertError::ExpansionFailed)?;

        extract_container(&job.intermediate, &job.scratch_dir).await?;

        let universal = find_universal_apk(&job.scratch_dir)
            .ok_or_else(|| ConvertError::UniversalVariantMissing(job.intermediate.clone()))?;

        let copied = tokio::fs::copy(&universal, &job.final_apk).await;
        drop(guard);
        copied?;

        info!("Universal APK written to {:?}", job.final_apk);
        Ok(job.final_apk)
    }
}

/// Expand a zip container into `target_dir`
async fn extract_container(container: &Path, target_dir: &Path) -> Result<(), ConvertError> {
    let container = container.to_path_buf();
    let target_dir = target_dir.to_path_buf();

    debug!("Extracting {:?} to {:?}", container, target_dir);

    let reported = container.clone();
    let unavailable = {
        let path = container.clone();
        move |reason: String| ConvertError::ExtractionUnavailable {
            path: path.clone(),
            reason,
        }
    };

    // zip is synchronous
    tokio::task::spawn_blocking(move || -> Result<(), ConvertError> {
        let file = std::fs::File::open(&container)?;
        let mut zip = zip::ZipArchive::new(file).map_err(|e| unavailable(e.to_string()))?;

        for i in 0..zip.len() {
            let mut entry = zip.by_index(i).map_err(|e| unavailable(e.to_string()))?;

            let Some(relative) = entry.enclosed_name().map(Path::to_path_buf) else {
                warn!("Skipping unsafe entry {:?}", entry.name());
                continue;
            };
            let outpath = target_dir.join(relative);

            if entry.is_dir() {
                std::fs::create_dir_all(&outpath)?;
            } else {
                if let Some(parent) = outpath.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                let mut outfile = std::fs::File::create(&outpath)?;
                std::io::copy(&mut entry, &mut outfile)?;
            }
        }

        Ok(())
    })
    .await
    .map_err(|e| ConvertError::ExtractionUnavailable {
        path: reported,
        reason: e.to_string(),
    })?
}

/// First `universal.apk` anywhere under `dir`
fn find_universal_apk(dir: &Path) -> Option<PathBuf> {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .find(|e| e.file_type().is_file() && e.file_name() == UNIVERSAL_APK)
        .map(|e| e.path().to_path_buf())
}
