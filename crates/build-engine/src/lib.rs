//! Build Engine
//!
//! Turns a [`BuildRequest`] into an APK: installs JavaScript dependencies,
//! drives the Expo build CLI locally or against the EAS service, and hands
//! bundles to the archive converter.

pub mod config;
pub mod dispatcher;
pub mod expo;
pub mod installer;

pub use config::{BuildMode, BuildRequest, ModeFlags, DEFAULT_PROFILE};
pub use dispatcher::{BuildOutcome, Dispatcher, Plan, Strategy};
pub use expo::ExpoCli;
pub use installer::{
    CleanupAction, CleanupStep, DependencyInstaller, InstallAttempt, InstallError, PackageManager,
};

use droidpack_android_toolchain::{ConvertError, DownloadError};
use droidpack_core::{CoreError, RunError};

/// Build errors
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Only one build mode may be given, got: {}", .0.join(", "))]
    ConflictingModes(Vec<&'static str>),
    #[error("Local builds are not supported on Windows hosts; use --cloud or --aab-to-apk")]
    UnsupportedPlatform,
    #[error("EAS build submission failed: {0}")]
    BuildSubmissionFailed(#[source] RunError),
    #[error("Local build failed: {0}")]
    LocalBuildFailed(#[source] RunError),
    #[error("expo prebuild failed: {0}")]
    PrebuildFailed(#[source] RunError),
    #[error("eas build:configure failed: {0}")]
    BuildConfiguration(#[source] RunError),
    #[error("Remote build produced no usable artifact: {0}")]
    ArtifactMissing(String),
    #[error(transparent)]
    Prerequisite(#[from] CoreError),
    #[error(transparent)]
    Install(#[from] InstallError),
    #[error(transparent)]
    Convert(#[from] ConvertError),
    #[error("Could not download build artifact: {0}")]
    Download(#[from] DownloadError),
}

impl BuildError {
    /// Short stable tag used when reporting the failure
    pub fn category(&self) -> &'static str {
        match self {
            BuildError::ConflictingModes(_) => "conflicting-modes",
            BuildError::UnsupportedPlatform => "unsupported-platform",
            BuildError::BuildSubmissionFailed(_) => "build-submission",
            BuildError::LocalBuildFailed(_) => "local-build",
            BuildError::PrebuildFailed(_) => "prebuild",
            BuildError::BuildConfiguration(_) => "build-configuration",
            BuildError::ArtifactMissing(_) => "artifact-missing",
            BuildError::Prerequisite(e) => e.category(),
            BuildError::Install(_) => "install",
            BuildError::Convert(e) => e.category(),
            BuildError::Download(_) => "download",
        }
    }
}
