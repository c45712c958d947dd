//! Build Strategy Dispatcher
//!
//! Resolves a request into a plan and runs it. The plan is decided up front
//! from the mode and the host platform; nothing is installed, built or
//! downloaded until the plan and its prerequisites check out.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use droidpack_android_toolchain::detector::{BUILD_PREREQUISITES, CONVERSION_PREREQUISITES};
use droidpack_android_toolchain::{
    ArchiveConverter, Prerequisite, ToolDownloader, ToolchainDetector, AAB_EXTENSION, APK_EXTENSION,
};
use droidpack_core::{CommandRunner, PlatformClass, ProjectContext};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::{BuildMode, BuildRequest};
use crate::expo::ExpoCli;
use crate::installer::DependencyInstaller;
use crate::BuildError;

/// Where a remote bundle is downloaded before conversion
pub const DOWNLOADED_BUNDLE: &str = "build.aab";

/// How a build is carried out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Cloud,
    Local,
    RemoteThenConvert,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Cloud => "cloud",
            Strategy::Local => "local",
            Strategy::RemoteThenConvert => "remote-then-convert",
        }
    }

    /// External programs the strategy needs
    pub fn prerequisites(&self) -> Vec<Prerequisite> {
        let mut needed = BUILD_PREREQUISITES.to_vec();
        if *self == Strategy::RemoteThenConvert {
            needed.extend_from_slice(CONVERSION_PREREQUISITES);
        }
        needed
    }
}

/// What a request resolves to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    /// Convert an existing bundle and nothing else
    ConvertOnly(PathBuf),
    Build(Strategy),
}

/// Result of a successful run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    /// Submitted to the EAS service; the artifact shows up on the dashboard
    Submitted { profile: String },
    /// Built locally; `None` when no APK was found in the output directory
    LocalArtifact { path: Option<PathBuf> },
    /// A bundle was converted into a universal APK
    Converted { apk: PathBuf },
}

/// Runs build requests against a project
pub struct Dispatcher {
    ctx: ProjectContext,
    runner: Arc<dyn CommandRunner>,
}

impl Dispatcher {
    pub fn new(ctx: ProjectContext, runner: Arc<dyn CommandRunner>) -> Self {
        Self { ctx, runner }
    }

    pub fn context(&self) -> &ProjectContext {
        &self.ctx
    }

    /// Decide what to do for `mode` on `platform`.
    ///
    /// An explicit local build on Windows is refused, while an automatic one
    /// falls back to the cloud without asking.
    pub fn plan(mode: &BuildMode, platform: PlatformClass) -> Result<Plan, BuildError> {
        let strategy = match mode {
            BuildMode::ConvertOnly(path) => return Ok(Plan::ConvertOnly(path.clone())),
            BuildMode::Cloud => Strategy::Cloud,
            BuildMode::RemoteThenConvert => Strategy::RemoteThenConvert,
            BuildMode::Local if platform.is_windows() => return Err(BuildError::UnsupportedPlatform),
            BuildMode::Local => Strategy::Local,
            BuildMode::Auto if platform.is_windows() => {
                debug!("Windows host, using cloud build");
                Strategy::Cloud
            }
            BuildMode::Auto => Strategy::Local,
        };
        Ok(Plan::Build(strategy))
    }

    /// Run `request` on a host of class `platform`.
    ///
    /// `platform` is the one host class for the whole run; it also decides
    /// whether the installer pre-cleans.
    pub async fn dispatch(
        &self,
        request: &BuildRequest,
        platform: PlatformClass,
    ) -> Result<BuildOutcome, BuildError> {
        let plan = Self::plan(&request.mode, platform)?;
        self.ctx.require_app_config()?;

        let strategy = match plan {
            Plan::ConvertOnly(archive) => return self.convert_only(&archive).await,
            Plan::Build(strategy) => strategy,
        };

        info!(
            "Building with {} strategy, profile '{}'",
            strategy.as_str(),
            request.profile
        );

        ToolchainDetector::new(self.runner.as_ref()).require(&strategy.prerequisites())?;

        DependencyInstaller::new(self.ctx.clone().with_platform(platform), self.runner.clone())
            .install_dependencies(request.skip_install)
            .await?;

        let expo = ExpoCli::new(self.ctx.root(), self.runner.clone());
        expo.ensure_logged_in().await?;
        expo.ensure_build_config().await?;

        match strategy {
            Strategy::Cloud => {
                expo.cloud_build(&request.profile).await?;
                Ok(BuildOutcome::Submitted {
                    profile: request.profile.clone(),
                })
            }
            Strategy::Local => {
                expo.prebuild().await?;
                expo.local_build(&request.profile).await?;
                Ok(BuildOutcome::LocalArtifact {
                    path: find_apk(&self.ctx.local_output_dir()),
                })
            }
            Strategy::RemoteThenConvert => {
                let url = expo.remote_archive_build(&request.profile).await?;
                if !url.ends_with(&format!(".{}", AAB_EXTENSION)) {
                    warn!("Artifact {} does not look like an app bundle", url);
                }

                let bundle = self.ctx.path(DOWNLOADED_BUNDLE);
                ToolDownloader::new(self.runner.clone())
                    .download_file(&url, &bundle)
                    .await?;

                let apk = self.converter().convert(&bundle, &self.ctx.output_dir()).await?;
                Ok(BuildOutcome::Converted { apk })
            }
        }
    }

    async fn convert_only(&self, archive: &Path) -> Result<BuildOutcome, BuildError> {
        let archive = self.ctx.path(archive);
        info!("Converting existing bundle {:?}", archive);

        ToolchainDetector::new(self.runner.as_ref()).require(CONVERSION_PREREQUISITES)?;

        let apk = self.converter().convert(&archive, &self.ctx.output_dir()).await?;
        Ok(BuildOutcome::Converted { apk })
    }

    fn converter(&self) -> ArchiveConverter {
        ArchiveConverter::new(
            self.runner.clone(),
            self.ctx.config().bundletool.clone(),
            self.ctx.cache_dir(),
        )
    }
}

/// The shallowest `*.apk` under `dir`, ties broken by name
pub fn find_apk(dir: &Path) -> Option<PathBuf> {
    WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.file_type().is_file()
                && e.path().extension().map(|ext| ext == APK_EXTENSION).unwrap_or(false)
        })
        .min_by_key(|e| e.depth())
        .map(|e| e.into_path())
}
