//! CLI commands for droidpack
//!
//! Glue between the parsed command line and the build engine.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use droidpack_android_toolchain::ConvertError;
use droidpack_build_engine::{BuildError, BuildOutcome, BuildRequest, Dispatcher, InstallError, ModeFlags};
use droidpack_core::{CoreError, ProjectContext, RunError, SystemRunner};
use tracing::info;

/// Build command options
#[derive(Debug, Clone, Default)]
pub struct BuildCommand {
    pub project_path: PathBuf,
    /// Overrides `default_profile` from droidpack.toml
    pub profile: Option<String>,
    pub flags: ModeFlags,
    pub skip_install: bool,
}

impl BuildCommand {
    /// Execute the build command
    pub async fn execute(self) -> Result<BuildOutcome> {
        // Mode conflicts are reported before the project is even looked at
        let mode = self.flags.into_mode()?;

        let ctx = ProjectContext::discover(&self.project_path)
            .await
            .with_context(|| format!("Could not load project at {}", self.project_path.display()))?;

        let profile = self
            .profile
            .unwrap_or_else(|| ctx.config().default_profile.clone());
        let request = BuildRequest::new(profile, mode).skip_install(self.skip_install);

        info!("Project: {:?}", ctx.root());

        let runner = Arc::new(SystemRunner::new(ctx.env().clone(), ctx.root()));
        let platform = ctx.platform();
        let outcome = Dispatcher::new(ctx, runner)
            .dispatch(&request, platform)
            .await?;

        report(&outcome);
        Ok(outcome)
    }
}

/// Log a summary of a finished run
pub fn report(outcome: &BuildOutcome) {
    match outcome {
        BuildOutcome::Submitted { profile } => {
            info!("Build submitted with profile '{}'", profile);
            info!("Check your EAS dashboard (https://expo.dev) for the build and its APK");
        }
        BuildOutcome::LocalArtifact { path: Some(path) } => {
            info!("Build successful: {}", describe_file(path));
        }
        BuildOutcome::LocalArtifact { path: None } => {
            info!("Build finished, but no APK was found in the build output directory");
        }
        BuildOutcome::Converted { apk } => {
            info!("Universal APK ready: {}", describe_file(apk));
        }
    }
}

fn describe_file(path: &Path) -> String {
    match std::fs::metadata(path) {
        Ok(meta) => format!("{} ({})", path.display(), format_size(meta.len())),
        Err(_) => path.display().to_string(),
    }
}

/// Size in human-readable format
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

/// Category tag for the final error report
pub fn error_category(err: &anyhow::Error) -> &'static str {
    if let Some(e) = err.downcast_ref::<BuildError>() {
        e.category()
    } else if let Some(e) = err.downcast_ref::<CoreError>() {
        e.category()
    } else if let Some(e) = err.downcast_ref::<ConvertError>() {
        e.category()
    } else if err.downcast_ref::<InstallError>().is_some() {
        "install"
    } else if let Some(RunError::CommandNotFound(_)) = err.downcast_ref::<RunError>() {
        "prerequisite"
    } else {
        "error"
    }
}
