//! Project Context
//!
//! The project root, a snapshot of the environment and the derived platform
//! class, passed explicitly to every component instead of being read from
//! the process's working directory and environment.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::PackConfig;
use crate::error::{CoreError, Result};
use crate::platform::{classify_platform, PlatformClass, PlatformSignals};

/// App configuration files that mark an Expo project root
pub const APP_CONFIG_FILES: &[&str] = &["app.json", "app.config.js", "app.config.ts"];

/// Environment variable overriding the per-user cache directory
pub const CACHE_DIR_ENV: &str = "DROIDPACK_CACHE_DIR";

/// Everything a component needs to know about the project it works on
#[derive(Debug, Clone)]
pub struct ProjectContext {
    root: PathBuf,
    env: HashMap<String, String>,
    platform: PlatformClass,
    config: PackConfig,
}

impl ProjectContext {
    /// Create a context from explicit parts
    pub fn new(root: impl Into<PathBuf>, env: HashMap<String, String>, config: PackConfig) -> Self {
        let platform = classify_platform(&PlatformSignals::from_env(&env));
        Self {
            root: root.into(),
            env,
            platform,
            config,
        }
    }

    /// Snapshot the current process environment and load `droidpack.toml`
    pub async fn discover(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let env: HashMap<String, String> = std::env::vars().collect();
        let config = PackConfig::load(&root).await?;
        let ctx = Self::new(root, env, config);

        info!(
            "Project {:?} on {} host",
            ctx.root,
            ctx.platform.as_str()
        );
        Ok(ctx)
    }

    /// Override the detected platform
    pub fn with_platform(mut self, platform: PlatformClass) -> Self {
        self.platform = platform;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn env(&self) -> &HashMap<String, String> {
        &self.env
    }

    pub fn platform(&self) -> PlatformClass {
        self.platform
    }

    pub fn config(&self) -> &PackConfig {
        &self.config
    }

    /// Resolve a path relative to the project root
    pub fn path(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.root.join(relative)
    }

    /// The installed dependency directory
    pub fn node_modules(&self) -> PathBuf {
        self.path("node_modules")
    }

    /// Converted APK destination
    pub fn output_dir(&self) -> PathBuf {
        self.path(&self.config.output_dir)
    }

    /// Directory a local build writes its APK under
    pub fn local_output_dir(&self) -> PathBuf {
        self.path(&self.config.local_output_dir)
    }

    /// The first app configuration file present at the root
    pub fn app_config_file(&self) -> Option<PathBuf> {
        APP_CONFIG_FILES
            .iter()
            .map(|name| self.path(name))
            .find(|path| path.is_file())
    }

    /// Fail unless the root looks like an Expo project
    pub fn require_app_config(&self) -> Result<PathBuf> {
        self.app_config_file().ok_or_else(|| {
            CoreError::PrerequisiteMissing(format!(
                "No app configuration ({}) in {}",
                APP_CONFIG_FILES.join(", "),
                self.root.display()
            ))
        })
    }

    /// Per-user cache directory for downloaded helper tools.
    ///
    /// `DROIDPACK_CACHE_DIR` wins over `bundletool.cache_dir`, which wins over
    /// the platform cache directory.
    pub fn cache_dir(&self) -> PathBuf {
        if let Some(dir) = self.env.get(CACHE_DIR_ENV) {
            return PathBuf::from(dir);
        }
        if let Some(ref dir) = self.config.bundletool.cache_dir {
            return dir.clone();
        }

        let dir = dirs::cache_dir()
            .map(|d| d.join("droidpack"))
            .or_else(|| dirs::home_dir().map(|h| h.join(".droidpack")))
            .unwrap_or_else(|| self.path(".droidpack"));
        debug!("Using cache directory {:?}", dir);
        dir
    }
}
