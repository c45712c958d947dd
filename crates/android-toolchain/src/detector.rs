//! Toolchain Detection
//!
//! Checks that the external programs a run needs resolve on the project's
//! search path before anything is touched.

use droidpack_core::{CommandRunner, CoreError};
use tracing::{debug, info};

/// An external program droidpack depends on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Prerequisite {
    pub program: &'static str,
    pub purpose: &'static str,
    pub install_hint: &'static str,
}

pub const NODE: Prerequisite = Prerequisite {
    program: "node",
    purpose: "JavaScript runtime",
    install_hint: "https://nodejs.org",
};

pub const NPM: Prerequisite = Prerequisite {
    program: "npm",
    purpose: "package manager",
    install_hint: "ships with Node.js",
};

pub const EAS: Prerequisite = Prerequisite {
    program: "eas",
    purpose: "Expo build CLI",
    install_hint: "npm install -g eas-cli",
};

pub const JAVA: Prerequisite = Prerequisite {
    program: "java",
    purpose: "runs bundletool",
    install_hint: "install a JDK 11 or newer",
};

/// Programs needed to install dependencies and build
pub const BUILD_PREREQUISITES: &[Prerequisite] = &[NODE, NPM, EAS];

/// Programs needed to turn an AAB into an APK
pub const CONVERSION_PREREQUISITES: &[Prerequisite] = &[JAVA];

/// Result of a prerequisite check
#[derive(Debug, Clone, Default)]
pub struct ToolchainStatus {
    pub found: Vec<Prerequisite>,
    pub missing: Vec<Prerequisite>,
}

impl ToolchainStatus {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }

    /// Turn missing tools into a single prerequisite error
    pub fn into_result(self) -> Result<(), CoreError> {
        if self.is_complete() {
            return Ok(());
        }

        let details: Vec<String> = self
            .missing
            .iter()
            .map(|p| format!("{} ({}; {})", p.program, p.purpose, p.install_hint))
            .collect();
        Err(CoreError::PrerequisiteMissing(format!(
            "Required tools not found: {}",
            details.join(", ")
        )))
    }
}

/// Checks prerequisites against a command runner's search path
pub struct ToolchainDetector<'a> {
    runner: &'a dyn CommandRunner,
}

impl<'a> ToolchainDetector<'a> {
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self { runner }
    }

    /// Check a list of prerequisites
    pub fn check(&self, prerequisites: &[Prerequisite]) -> ToolchainStatus {
        let mut status = ToolchainStatus::default();

        for prerequisite in prerequisites {
            if self.runner.is_available(prerequisite.program) {
                debug!("Found {}", prerequisite.program);
                status.found.push(*prerequisite);
            } else {
                status.missing.push(*prerequisite);
            }
        }

        status
    }

    /// Fail unless everything in `prerequisites` is available
    pub fn require(&self, prerequisites: &[Prerequisite]) -> Result<(), CoreError> {
        info!("Checking prerequisites...");
        self.check(prerequisites).into_result()
    }
}
