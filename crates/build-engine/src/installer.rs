//! Dependency Installer
//!
//! Installs the project's JavaScript dependencies with yarn or npm, retrying
//! a bounded number of times with a fixed delay.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use droidpack_core::process::args;
use droidpack_core::{CommandOptions, CommandRunner, InstallConfig, ProjectContext, RunError};
use tracing::{debug, info, warn};

/// Installer errors
#[derive(Debug, thiserror::Error)]
pub enum InstallError {
    #[error("Dependencies are not installed ({0} is missing); run without --no-install")]
    MissingDependencies(PathBuf),
    #[error("{manager} install failed after {} attempts", .attempts.len())]
    InstallExhausted {
        manager: PackageManager,
        attempts: Vec<InstallAttempt>,
    },
    #[error("Cleanup step failed: {0}")]
    Cleanup(String),
}

/// JavaScript package manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManager {
    Yarn,
    Npm,
}

impl PackageManager {
    /// `yarn.lock` selects yarn; anything else (including no lock file) selects npm
    pub fn detect(project_root: &Path) -> Self {
        if project_root.join("yarn.lock").is_file() {
            PackageManager::Yarn
        } else {
            PackageManager::Npm
        }
    }

    pub fn program(&self) -> &'static str {
        match self {
            PackageManager::Yarn => "yarn",
            PackageManager::Npm => "npm",
        }
    }

    pub fn install_args(&self, config: &InstallConfig) -> Vec<String> {
        match self {
            PackageManager::Yarn => config.yarn_args.clone(),
            PackageManager::Npm => config.npm_args.clone(),
        }
    }

    pub fn cache_clean_args(&self) -> Vec<String> {
        match self {
            PackageManager::Yarn => args(["cache", "clean"]),
            PackageManager::Npm => args(["cache", "clean", "--force"]),
        }
    }
}

impl fmt::Display for PackageManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.program())
    }
}

/// One install try
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallAttempt {
    pub number: u32,
    pub manager: PackageManager,
    /// `Err` carries the failure message
    pub outcome: Result<(), String>,
}

/// What a cleanup step does
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupAction {
    /// Force-terminate every process with this image name
    KillProcess(&'static str),
    /// Run a command
    Command { program: String, args: Vec<String> },
    /// Delete a directory tree
    RemoveDir(PathBuf),
}

/// A pre-install cleanup step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupStep {
    pub action: CleanupAction,
    /// Log and carry on when the step fails
    pub ignore_failure: bool,
}

impl CleanupStep {
    fn best_effort(action: CleanupAction) -> Self {
        Self {
            action,
            ignore_failure: true,
        }
    }
}

/// Steps run once before the first install attempt on Windows hosts, where
/// a running node process or a stale cache commonly locks `node_modules`.
pub fn windows_preclean_steps(manager: PackageManager, node_modules: &Path) -> Vec<CleanupStep> {
    vec![
        CleanupStep::best_effort(CleanupAction::KillProcess("node.exe")),
        CleanupStep::best_effort(CleanupAction::Command {
            program: manager.program().to_string(),
            args: manager.cache_clean_args(),
        }),
        CleanupStep::best_effort(CleanupAction::RemoveDir(node_modules.to_path_buf())),
    ]
}

/// Installs project dependencies
pub struct DependencyInstaller {
    ctx: ProjectContext,
    runner: Arc<dyn CommandRunner>,
}

impl DependencyInstaller {
    pub fn new(ctx: ProjectContext, runner: Arc<dyn CommandRunner>) -> Self {
        Self { ctx, runner }
    }

    /// Install dependencies, or with `skip` only check they are present
    pub async fn install_dependencies(&self, skip: bool) -> Result<(), InstallError> {
        let node_modules = self.ctx.node_modules();

        if skip {
            if !node_modules.is_dir() {
                return Err(InstallError::MissingDependencies(node_modules));
            }
            info!("Skipping dependency installation");
            return Ok(());
        }

        let manager = PackageManager::detect(self.ctx.root());
        let config = &self.ctx.config().install;
        info!("Installing dependencies with {}...", manager);

        if self.ctx.platform().is_windows() {
            self.run_cleanup(&windows_preclean_steps(manager, &node_modules))
                .await?;
        }

        let install_args = manager.install_args(config);
        let mut attempts = Vec::new();

        for number in 1..=config.max_attempts {
            let result = self
                .runner
                .run(
                    manager.program(),
                    &install_args,
                    &CommandOptions::inherit().in_dir(self.ctx.root()),
                )
                .await;

            match result {
                Ok(_) => {
                    info!("Dependencies installed");
                    return Ok(());
                }
                Err(e) => {
                    warn!(
                        "{} install attempt {}/{} failed: {}",
                        manager, number, config.max_attempts, e
                    );
                    attempts.push(InstallAttempt {
                        number,
                        manager,
                        outcome: Err(e.to_string()),
                    });

                    if number < config.max_attempts {
                        info!("Retrying in {}s...", config.retry_delay_secs);
                        tokio::time::sleep(config.retry_delay()).await;
                    }
                }
            }
        }

        Err(InstallError::InstallExhausted { manager, attempts })
    }

    /// Run cleanup steps in order
    pub async fn run_cleanup(&self, steps: &[CleanupStep]) -> Result<(), InstallError> {
        for step in steps {
            debug!("Cleanup: {:?}", step.action);

            let result = match &step.action {
                CleanupAction::KillProcess(image) => self
                    .runner
                    .run("taskkill", &args(["/F", "/IM", *image]), &CommandOptions::capture())
                    .await
                    .map(|_| ())
                    .map_err(|e| e.to_string()),
                CleanupAction::Command { program, args } => self
                    .runner
                    .run(program, args, &CommandOptions::capture().in_dir(self.ctx.root()))
                    .await
                    .map(|_| ())
                    .map_err(|e| e.to_string()),
                CleanupAction::RemoveDir(dir) => remove_dir(dir).await.map_err(|e| e.to_string()),
            };

            if let Err(e) = result {
                if step.ignore_failure {
                    warn!("Ignoring failed cleanup step {:?}: {}", step.action, e);
                } else {
                    return Err(InstallError::Cleanup(e));
                }
            }
        }

        Ok(())
    }
}

/// Remove a directory tree; a missing directory is not an error
async fn remove_dir(dir: &Path) -> Result<(), RunError> {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use droidpack_core::process::testing::{Response, ScriptedRunner};
    use droidpack_core::{PackConfig, PlatformClass};
    use std::collections::HashMap;
    use std::time::Duration;

    fn context(root: &Path, platform: PlatformClass) -> ProjectContext {
        ProjectContext::new(root, HashMap::new(), PackConfig::default()).with_platform(platform)
    }

    fn installer(root: &Path, platform: PlatformClass, runner: Arc<ScriptedRunner>) -> DependencyInstaller {
        DependencyInstaller::new(context(root, platform), runner)
    }

    #[test]
    fn test_manager_detection() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(PackageManager::detect(dir.path()), PackageManager::Npm);

        std::fs::write(dir.path().join("package-lock.json"), "{}").unwrap();
        assert_eq!(PackageManager::detect(dir.path()), PackageManager::Npm);

        std::fs::write(dir.path().join("yarn.lock"), "").unwrap();
        assert_eq!(PackageManager::detect(dir.path()), PackageManager::Yarn);
    }

    #[tokio::test]
    async fn test_skip_checks_node_modules_only() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new());
        let installer = installer(dir.path(), PlatformClass::PosixFamily, runner.clone());

        assert!(matches!(
            installer.install_dependencies(true).await,
            Err(InstallError::MissingDependencies(_))
        ));

        std::fs::create_dir(dir.path().join("node_modules")).unwrap();
        assert!(installer.install_dependencies(true).await.is_ok());

        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_package_lock_selects_npm() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("package-lock.json"), "{}").unwrap();
        let runner = Arc::new(ScriptedRunner::new());

        installer(dir.path(), PlatformClass::PosixFamily, runner.clone())
            .install_dependencies(false)
            .await
            .unwrap();

        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].program, "npm");
        assert_eq!(calls[0].args, vec!["install".to_string()]);
        assert!(calls[0].options.inherit_io);
    }

    #[tokio::test]
    async fn test_yarn_lock_selects_yarn() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("yarn.lock"), "").unwrap();
        let runner = Arc::new(ScriptedRunner::new());

        installer(dir.path(), PlatformClass::PosixFamily, runner.clone())
            .install_dependencies(false)
            .await
            .unwrap();

        assert_eq!(runner.calls_to("yarn").len(), 1);
        assert!(runner.calls_to("npm").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_three_attempts_with_fixed_delay() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new().always("npm", Response::Exit(1)));

        let err = installer(dir.path(), PlatformClass::PosixFamily, runner.clone())
            .install_dependencies(false)
            .await
            .unwrap_err();

        match err {
            InstallError::InstallExhausted { manager, attempts } => {
                assert_eq!(manager, PackageManager::Npm);
                assert_eq!(attempts.len(), 3);
                assert_eq!(attempts[2].number, 3);
            }
            other => panic!("unexpected error: {:?}", other),
        }

        let calls = runner.calls_to("npm");
        assert_eq!(calls.len(), 3);
        for pair in calls.windows(2) {
            assert_eq!(pair[1].at - pair[0].at, Duration::from_secs(5));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_on_retry() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(
            ScriptedRunner::new()
                .then("npm", Response::Exit(1))
                .then("npm", Response::Exit(0)),
        );

        installer(dir.path(), PlatformClass::PosixFamily, runner.clone())
            .install_dependencies(false)
            .await
            .unwrap();

        assert_eq!(runner.calls_to("npm").len(), 2);
    }

    #[tokio::test]
    async fn test_windows_preclean_runs_once_and_swallows_failures() {
        let dir = tempfile::tempdir().unwrap();
        let node_modules = dir.path().join("node_modules");
        std::fs::create_dir_all(node_modules.join("left-pad")).unwrap();

        let runner = Arc::new(
            ScriptedRunner::new()
                .missing("taskkill")
                // cache clean fails, then the install succeeds
                .then("npm", Response::Exit(1))
                .then("npm", Response::Exit(0)),
        );

        installer(dir.path(), PlatformClass::WindowsFamily, runner.clone())
            .install_dependencies(false)
            .await
            .unwrap();

        let npm = runner.calls_to("npm");
        assert_eq!(npm.len(), 2);
        assert_eq!(npm[0].args, vec!["cache", "clean", "--force"]);
        assert_eq!(npm[1].args, vec!["install"]);
        assert!(!node_modules.exists());
    }

    #[tokio::test(start_paused = true)]
    async fn test_windows_preclean_not_repeated_on_retry() {
        let dir = tempfile::tempdir().unwrap();
        let node_modules = dir.path().join("node_modules");
        std::fs::create_dir(&node_modules).unwrap();

        // Each install attempt records whether node_modules was there when it
        // started, then leaves a partial one behind
        let partial = node_modules.clone();
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let record = seen.clone();
        let runner = Arc::new(
            ScriptedRunner::new()
                .then("npm", Response::Exit(0))
                .then("npm", Response::Exit(1))
                .then("npm", Response::Exit(1))
                .then("npm", Response::Exit(0))
                .on_call("npm", move |args| {
                    if args.iter().any(|a| a == "install") {
                        record.lock().unwrap().push(partial.exists());
                        std::fs::create_dir_all(&partial).unwrap();
                    }
                }),
        );

        installer(dir.path(), PlatformClass::WindowsFamily, runner.clone())
            .install_dependencies(false)
            .await
            .unwrap();

        assert_eq!(runner.calls_to("taskkill").len(), 1);
        let npm = runner.calls_to("npm");
        let cache_cleans = npm.iter().filter(|c| c.has_arg("cache")).count();
        let installs = npm.iter().filter(|c| c.has_arg("install")).count();
        assert_eq!(cache_cleans, 1);
        assert_eq!(installs, 3);
        assert!(npm[0].has_arg("cache"));
        assert_eq!(*seen.lock().unwrap(), vec![false, true, true]);
    }

    #[tokio::test]
    async fn test_strict_cleanup_step_fails() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new().always("taskkill", Response::Exit(128)));
        let installer = installer(dir.path(), PlatformClass::WindowsFamily, runner.clone());

        let strict = CleanupStep {
            action: CleanupAction::KillProcess("node.exe"),
            ignore_failure: false,
        };
        let after = CleanupStep {
            action: CleanupAction::Command {
                program: "npm".into(),
                args: args(["cache", "verify"]),
            },
            ignore_failure: false,
        };

        let err = installer.run_cleanup(&[strict.clone(), after]).await.unwrap_err();
        assert!(matches!(err, InstallError::Cleanup(_)));
        assert!(runner.calls_to("npm").is_empty());

        let lenient = CleanupStep {
            ignore_failure: true,
            ..strict
        };
        assert!(installer.run_cleanup(&[lenient]).await.is_ok());
    }

    #[tokio::test]
    async fn test_posix_skips_preclean() {
        let dir = tempfile::tempdir().unwrap();
        let node_modules = dir.path().join("node_modules");
        std::fs::create_dir(&node_modules).unwrap();
        let runner = Arc::new(ScriptedRunner::new());

        installer(dir.path(), PlatformClass::PosixFamily, runner.clone())
            .install_dependencies(false)
            .await
            .unwrap();

        assert!(node_modules.exists());
        assert!(runner.calls_to("taskkill").is_empty());
        assert_eq!(runner.calls().len(), 1);
    }

    #[test]
    fn test_preclean_steps_are_best_effort() {
        let steps = windows_preclean_steps(PackageManager::Yarn, Path::new("node_modules"));
        assert_eq!(steps.len(), 3);
        assert!(steps.iter().all(|s| s.ignore_failure));
        assert_eq!(steps[0].action, CleanupAction::KillProcess("node.exe"));
    }
}
