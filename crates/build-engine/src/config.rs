//! Build Request
//!
//! What the user asked for: a profile, at most one build mode and whether
//! dependency installation should be skipped.

use std::path::{Path, PathBuf};

use crate::BuildError;

/// Default EAS build profile
pub const DEFAULT_PROFILE: &str = "preview";

/// How the APK should be produced
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum BuildMode {
    /// Pick local or cloud from the host platform
    #[default]
    Auto,
    /// Submit to the EAS build service
    Cloud,
    /// Build on this machine with `eas build --local`
    Local,
    /// Only convert an existing AAB
    ConvertOnly(PathBuf),
    /// Build an AAB remotely, then convert it here
    RemoteThenConvert,
}

impl BuildMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildMode::Auto => "auto",
            BuildMode::Cloud => "cloud",
            BuildMode::Local => "local",
            BuildMode::ConvertOnly(_) => "convert-aab",
            BuildMode::RemoteThenConvert => "aab-to-apk",
        }
    }

    /// The user-supplied bundle, for convert-only requests
    pub fn source_archive(&self) -> Option<&Path> {
        match self {
            BuildMode::ConvertOnly(path) => Some(path),
            _ => None,
        }
    }
}

/// Mode flags as they come off the command line, before validation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModeFlags {
    pub cloud: bool,
    pub local: bool,
    pub aab_to_apk: bool,
    pub convert_aab: Option<PathBuf>,
}

impl ModeFlags {
    /// Names of the flags that are set
    pub fn active(&self) -> Vec<&'static str> {
        let mut active = Vec::new();
        if self.cloud {
            active.push("--cloud");
        }
        if self.local {
            active.push("--local");
        }
        if self.aab_to_apk {
            active.push("--aab-to-apk");
        }
        if self.convert_aab.is_some() {
            active.push("--convert-aab");
        }
        active
    }

    /// Collapse the flags into a single mode.
    ///
    /// This is the only place more than one mode can be expressed; past it
    /// a request carries exactly one [`BuildMode`].
    pub fn into_mode(self) -> Result<BuildMode, BuildError> {
        let active = self.active();
        if active.len() > 1 {
            return Err(BuildError::ConflictingModes(active));
        }

        Ok(match self {
            ModeFlags { cloud: true, .. } => BuildMode::Cloud,
            ModeFlags { local: true, .. } => BuildMode::Local,
            ModeFlags { aab_to_apk: true, .. } => BuildMode::RemoteThenConvert,
            ModeFlags {
                convert_aab: Some(path),
                ..
            } => BuildMode::ConvertOnly(path),
            _ => BuildMode::Auto,
        })
    }
}

/// A validated build request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    pub profile: String,
    pub mode: BuildMode,
    pub skip_install: bool,
}

impl Default for BuildRequest {
    fn default() -> Self {
        Self {
            profile: DEFAULT_PROFILE.to_string(),
            mode: BuildMode::Auto,
            skip_install: false,
        }
    }
}

impl BuildRequest {
    pub fn new(profile: impl Into<String>, mode: BuildMode) -> Self {
        Self {
            profile: profile.into(),
            mode,
            skip_install: false,
        }
    }

    /// Build a request from raw command line flags
    pub fn from_flags(
        profile: impl Into<String>,
        flags: ModeFlags,
        skip_install: bool,
    ) -> Result<Self, BuildError> {
        Ok(Self::new(profile, flags.into_mode()?).skip_install(skip_install))
    }

    pub fn skip_install(mut self, skip: bool) -> Self {
        self.skip_install = skip;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flags(cloud: bool, local: bool, aab_to_apk: bool, convert: bool) -> ModeFlags {
        ModeFlags {
            cloud,
            local,
            aab_to_apk,
            convert_aab: convert.then(|| PathBuf::from("app.aab")),
        }
    }

    #[test]
    fn test_single_modes() {
        assert_eq!(ModeFlags::default().into_mode().unwrap(), BuildMode::Auto);
        assert_eq!(flags(true, false, false, false).into_mode().unwrap(), BuildMode::Cloud);
        assert_eq!(flags(false, true, false, false).into_mode().unwrap(), BuildMode::Local);
        assert_eq!(
            flags(false, false, true, false).into_mode().unwrap(),
            BuildMode::RemoteThenConvert
        );
        assert_eq!(
            flags(false, false, false, true).into_mode().unwrap(),
            BuildMode::ConvertOnly(PathBuf::from("app.aab"))
        );
    }

    #[test]
    fn test_every_pair_conflicts() {
        for mask in 0u8..16 {
            if mask.count_ones() < 2 {
                continue;
            }
            let f = flags(mask & 1 != 0, mask & 2 != 0, mask & 4 != 0, mask & 8 != 0);
            match f.clone().into_mode() {
                Err(BuildError::ConflictingModes(active)) => {
                    assert_eq!(active.len(), mask.count_ones() as usize, "{:?}", f)
                }
                other => panic!("{:?} resolved to {:?}", f, other),
            }
        }
    }

    #[test]
    fn test_request_from_flags() {
        let request = BuildRequest::from_flags("production", flags(true, false, false, false), true).unwrap();
        assert_eq!(request.profile, "production");
        assert_eq!(request.mode, BuildMode::Cloud);
        assert!(request.skip_install);
        assert!(request.mode.source_archive().is_none());

        assert_eq!(BuildRequest::default().profile, DEFAULT_PROFILE);
    }
}
