//! Project Configuration
//!
//! Optional `droidpack.toml` at the project root. Every field has a default,
//! so an absent file, or a file that only sets a few keys, is fine.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CoreError, Result};

/// Dependency installation settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallConfig {
    /// Install attempts before giving up
    pub max_attempts: u32,
    /// Fixed delay between failed attempts
    pub retry_delay_secs: u64,
    /// Arguments passed to npm
    pub npm_args: Vec<String>,
    /// Arguments passed to yarn
    pub yarn_args: Vec<String>,
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay_secs: 5,
            npm_args: vec!["install".to_string()],
            yarn_args: vec!["install".to_string()],
        }
    }
}

impl InstallConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

/// bundletool download settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BundletoolConfig {
    /// Release version
    pub version: String,
    /// Download URL override
    pub url: Option<String>,
    /// Expected SHA-256 of the jar (hex)
    pub sha256: Option<String>,
    /// Cache directory override
    pub cache_dir: Option<PathBuf>,
}

impl Default for BundletoolConfig {
    fn default() -> Self {
        Self {
            version: "1.17.2".to_string(),
            url: None,
            sha256: None,
            cache_dir: None,
        }
    }
}

impl BundletoolConfig {
    /// File name of the jar inside the cache directory
    pub fn jar_name(&self) -> String {
        format!("bundletool-all-{}.jar", self.version)
    }

    /// Release URL for the configured version
    pub fn download_url(&self) -> String {
        self.url.clone().unwrap_or_else(|| {
            format!(
                "https://github.com/google/bundletool/releases/download/{}/{}",
                self.version,
                self.jar_name()
            )
        })
    }
}

/// Main project configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackConfig {
    /// Build profile used when none is given on the command line
    pub default_profile: String,
    /// Where converted APKs are written (relative to the project root)
    pub output_dir: PathBuf,
    /// Where a local build leaves its APK (relative to the project root)
    pub local_output_dir: PathBuf,
    /// Dependency installation
    pub install: InstallConfig,
    /// bundletool
    pub bundletool: BundletoolConfig,
}

impl Default for PackConfig {
    fn default() -> Self {
        Self {
            default_profile: "preview".to_string(),
            output_dir: PathBuf::from("apk_output"),
            local_output_dir: PathBuf::from("android/app/build/outputs"),
            install: InstallConfig::default(),
            bundletool: BundletoolConfig::default(),
        }
    }
}

impl PackConfig {
    /// Configuration file name
    pub const FILE_NAME: &'static str = "droidpack.toml";

    /// Load configuration from the project root, falling back to defaults
    pub async fn load(project_root: &Path) -> Result<Self> {
        let config_file = project_root.join(Self::FILE_NAME);

        if !config_file.exists() {
            debug!("No {} found, using defaults", Self::FILE_NAME);
            return Ok(Self::default());
        }

        debug!("Loading config from {:?}", config_file);
        let contents = tokio::fs::read_to_string(&config_file).await?;
        let config = Self::parse(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn parse(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    fn validate(&self) -> Result<()> {
        if self.install.max_attempts == 0 {
            return Err(CoreError::Config("install.max_attempts must be at least 1".into()));
        }
        if self.default_profile.trim().is_empty() {
            return Err(CoreError::Config("default_profile must not be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PackConfig::default();
        assert_eq!(config.default_profile, "preview");
        assert_eq!(config.install.max_attempts, 3);
        assert_eq!(config.install.retry_delay(), Duration::from_secs(5));
        assert_eq!(config.output_dir, PathBuf::from("apk_output"));
    }

    #[test]
    fn test_partial_file() {
        let config = PackConfig::parse(
            r#"
            default_profile = "production"

            [install]
            retry_delay_secs = 1
            "#,
        )
        .unwrap();

        assert_eq!(config.default_profile, "production");
        assert_eq!(config.install.retry_delay_secs, 1);
        assert_eq!(config.install.max_attempts, 3);
        assert_eq!(config.bundletool, BundletoolConfig::default());
    }

    #[test]
    fn test_bundletool_url() {
        let config = BundletoolConfig::default();
        assert_eq!(
            config.download_url(),
            "https://github.com/google/bundletool/releases/download/1.17.2/bundletool-all-1.17.2.jar"
        );

        let pinned = BundletoolConfig {
            url: Some("https://mirror.example/bt.jar".into()),
            ..Default::default()
        };
        assert_eq!(pinned.download_url(), "https://mirror.example/bt.jar");
    }

    #[tokio::test]
    async fn test_load_missing_and_invalid() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(PackConfig::load(dir.path()).await.unwrap(), PackConfig::default());

        std::fs::write(dir.path().join(PackConfig::FILE_NAME), "[install]\nmax_attempts = 0\n").unwrap();
        assert!(matches!(
            PackConfig::load(dir.path()).await,
            Err(CoreError::Config(_))
        ));

        std::fs::write(dir.path().join(PackConfig::FILE_NAME), "default_profile = [").unwrap();
        assert!(matches!(
            PackConfig::load(dir.path()).await,
            Err(CoreError::TomlParse(_))
        ));
    }
}
