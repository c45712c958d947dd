//! Expo CLI
//!
//! Wraps the `eas` and `npx expo` invocations a build needs: the login
//! check, `eas.json` generation, prebuild and the three flavours of
//! `eas build`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use droidpack_core::process::args;
use droidpack_core::{CommandOptions, CommandRunner, CoreError, RunError};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::BuildError;

/// EAS project configuration file
pub const EAS_CONFIG_FILE: &str = "eas.json";

/// One entry of `eas build --json` output
#[derive(Debug, Deserialize)]
struct BuildRecord {
    #[serde(default)]
    artifacts: Option<BuildArtifacts>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BuildArtifacts {
    build_url: Option<String>,
    application_archive_url: Option<String>,
}

/// Extract the artifact URL from `eas build --json` output
pub fn parse_artifact_url(output: &str) -> Result<String, BuildError> {
    let builds: Vec<BuildRecord> = serde_json::from_str(output.trim())
        .map_err(|e| BuildError::ArtifactMissing(format!("could not parse eas output: {}", e)))?;

    let artifacts = builds
        .into_iter()
        .next()
        .and_then(|b| b.artifacts)
        .ok_or_else(|| BuildError::ArtifactMissing("eas reported no build artifacts".to_string()))?;

    artifacts
        .build_url
        .or(artifacts.application_archive_url)
        .ok_or_else(|| BuildError::ArtifactMissing("build has no download URL".to_string()))
}

/// Runs Expo tooling in a project
pub struct ExpoCli {
    root: PathBuf,
    runner: Arc<dyn CommandRunner>,
}

impl ExpoCli {
    pub fn new(root: impl Into<PathBuf>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            root: root.into(),
            runner,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn inherit(&self) -> CommandOptions {
        CommandOptions::inherit().in_dir(&self.root)
    }

    fn capture(&self) -> CommandOptions {
        CommandOptions::capture().in_dir(&self.root)
    }

    /// Make sure there is an EAS session, prompting for login if there isn't
    pub async fn ensure_logged_in(&self) -> Result<(), BuildError> {
        match self.runner.run("eas", &args(["whoami"]), &self.capture()).await {
            Ok(output) => {
                let user = output.stdout.unwrap_or_default();
                info!("Logged in to EAS as {}", user.trim());
                return Ok(());
            }
            Err(RunError::CommandNotFound(program)) => {
                return Err(CoreError::PrerequisiteMissing(format!(
                    "{} not found (npm install -g eas-cli)",
                    program
                ))
                .into());
            }
            Err(e) => debug!("eas whoami: {}", e),
        }

        warn!("Not logged in to EAS");
        self.runner
            .run("eas", &args(["login"]), &self.inherit())
            .await
            .map_err(|e| {
                BuildError::from(CoreError::PrerequisiteMissing(format!(
                    "EAS login required ({})",
                    e
                )))
            })?;
        Ok(())
    }

    /// Generate `eas.json` when the project has none
    pub async fn ensure_build_config(&self) -> Result<(), BuildError> {
        if self.root.join(EAS_CONFIG_FILE).is_file() {
            debug!("{} present", EAS_CONFIG_FILE);
            return Ok(());
        }

        info!("No {} found, running eas build:configure...", EAS_CONFIG_FILE);
        self.runner
            .run(
                "eas",
                &args(["build:configure", "--platform", "android"]),
                &self.inherit(),
            )
            .await
            .map_err(BuildError::BuildConfiguration)?;
        Ok(())
    }

    /// Generate the native `android/` project
    pub async fn prebuild(&self) -> Result<(), BuildError> {
        info!("Running expo prebuild...");
        self.runner
            .run(
                "npx",
                &args(["expo", "prebuild", "--platform", "android"]),
                &self.inherit(),
            )
            .await
            .map_err(BuildError::PrebuildFailed)?;
        Ok(())
    }

    fn build_args(profile: &str) -> Vec<String> {
        args(["build", "--platform", "android", "--profile", profile])
    }

    /// Submit a build to the EAS service
    pub async fn cloud_build(&self, profile: &str) -> Result<(), BuildError> {
        info!("Submitting cloud build with profile '{}'...", profile);
        self.runner
            .run("eas", &Self::build_args(profile), &self.inherit())
            .await
            .map_err(BuildError::BuildSubmissionFailed)?;
        Ok(())
    }

    /// Build on this machine
    pub async fn local_build(&self, profile: &str) -> Result<(), BuildError> {
        info!("Building locally with profile '{}'...", profile);
        let mut build_args = Self::build_args(profile);
        build_args.push("--local".to_string());

        self.runner
            .run("eas", &build_args, &self.inherit())
            .await
            .map_err(BuildError::LocalBuildFailed)?;
        Ok(())
    }

    /// Build remotely, wait for it and return the artifact URL
    pub async fn remote_archive_build(&self, profile: &str) -> Result<String, BuildError> {
        info!("Building bundle remotely with profile '{}' (waiting for completion)...", profile);
        let mut build_args = Self::build_args(profile);
        build_args.extend(args(["--non-interactive", "--wait", "--json"]));

        let output = self
            .runner
            .run("eas", &build_args, &self.capture())
            .await
            .map_err(BuildError::BuildSubmissionFailed)?;

        parse_artifact_url(output.stdout.as_deref().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use droidpack_core::process::testing::{Response, ScriptedRunner};

    const BUILD_JSON: &str = r#"[{"id":"abc","platform":"ANDROID","artifacts":{"buildUrl":"https://expo.dev/artifacts/app.aab"}}]"#;

    #[test]
    fn test_parse_artifact_url() {
        assert_eq!(
            parse_artifact_url(BUILD_JSON).unwrap(),
            "https://expo.dev/artifacts/app.aab"
        );

        let fallback = r#"[{"artifacts":{"applicationArchiveUrl":"https://x/app.aab"}}]"#;
        assert_eq!(parse_artifact_url(fallback).unwrap(), "https://x/app.aab");

        assert!(matches!(parse_artifact_url("[]"), Err(BuildError::ArtifactMissing(_))));
        assert!(matches!(
            parse_artifact_url(r#"[{"artifacts":{}}]"#),
            Err(BuildError::ArtifactMissing(_))
        ));
        assert!(matches!(
            parse_artifact_url("Build failed"),
            Err(BuildError::ArtifactMissing(_))
        ));
    }

    #[tokio::test]
    async fn test_logged_in_skips_login() {
        let runner = Arc::new(ScriptedRunner::new().always("eas", Response::Stdout(0, "dev\n".into())));
        ExpoCli::new("/p", runner.clone()).ensure_logged_in().await.unwrap();

        let calls = runner.calls_to("eas");
        assert_eq!(calls.len(), 1);
        assert!(calls[0].has_arg("whoami"));
        assert!(!calls[0].options.inherit_io);
    }

    #[tokio::test]
    async fn test_login_prompt_and_failure() {
        let runner = Arc::new(ScriptedRunner::new().then("eas", Response::Exit(1)));
        ExpoCli::new("/p", runner.clone()).ensure_logged_in().await.unwrap();
        let calls = runner.calls_to("eas");
        assert_eq!(calls.len(), 2);
        assert!(calls[1].has_arg("login"));
        assert!(calls[1].options.inherit_io);

        let runner = Arc::new(ScriptedRunner::new().always("eas", Response::Exit(1)));
        let err = ExpoCli::new("/p", runner).ensure_logged_in().await.unwrap_err();
        assert_eq!(err.category(), "prerequisite");
    }

    #[tokio::test]
    async fn test_build_config_generated_once() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new());
        let expo = ExpoCli::new(dir.path(), runner.clone());

        expo.ensure_build_config().await.unwrap();
        assert!(runner.calls_to("eas")[0].has_arg("build:configure"));

        std::fs::write(dir.path().join(EAS_CONFIG_FILE), "{}").unwrap();
        expo.ensure_build_config().await.unwrap();
        assert_eq!(runner.calls_to("eas").len(), 1);
    }

    #[tokio::test]
    async fn test_build_failures_map_to_errors() {
        let runner = Arc::new(
            ScriptedRunner::new()
                .always("eas", Response::Exit(1))
                .always("npx", Response::Exit(2)),
        );
        let expo = ExpoCli::new("/p", runner.clone());

        assert!(matches!(
            expo.cloud_build("preview").await,
            Err(BuildError::BuildSubmissionFailed(_))
        ));
        assert!(matches!(
            expo.local_build("preview").await,
            Err(BuildError::LocalBuildFailed(_))
        ));
        assert!(matches!(expo.prebuild().await, Err(BuildError::PrebuildFailed(_))));

        let calls = runner.calls_to("eas");
        assert!(!calls[0].has_arg("--local"));
        assert!(calls[1].has_arg("--local"));
        assert!(calls[1].has_arg("preview"));
    }

    #[tokio::test]
    async fn test_remote_archive_build() {
        let runner = Arc::new(ScriptedRunner::new().always("eas", Response::Stdout(0, BUILD_JSON.into())));
        let url = ExpoCli::new("/p", runner.clone())
            .remote_archive_build("production")
            .await
            .unwrap();

        assert_eq!(url, "https://expo.dev/artifacts/app.aab");
        let call = &runner.calls_to("eas")[0];
        assert!(call.has_arg("--json"));
        assert!(call.has_arg("--wait"));
        assert!(call.has_arg("production"));
    }
}
