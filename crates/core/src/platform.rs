//! Host platform classification
//!
//! Only the coarse family matters: local Android builds are not possible on
//! Windows-family hosts, and the dependency installer needs a pre-clean there.

use std::collections::HashMap;

/// OS-type values that mark a Windows-family host
const WINDOWS_OS_TYPES: &[&str] = &["msys", "win32", "cygwin"];

/// Kernel-name prefixes that mark a Windows-family host
const WINDOWS_KERNEL_PREFIXES: &[&str] = &["MINGW", "CYGWIN"];

/// Coarse OS family of the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlatformClass {
    WindowsFamily,
    PosixFamily,
}

impl PlatformClass {
    pub fn is_windows(&self) -> bool {
        matches!(self, PlatformClass::WindowsFamily)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformClass::WindowsFamily => "windows",
            PlatformClass::PosixFamily => "posix",
        }
    }
}

/// Raw identifiers the classification is computed from
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlatformSignals {
    /// Shell OS-type string (`OSTYPE`)
    pub os_type: Option<String>,
    /// Kernel name as reported by `uname -s`
    pub kernel_name: Option<String>,
}

impl PlatformSignals {
    pub fn new(os_type: Option<&str>, kernel_name: Option<&str>) -> Self {
        Self {
            os_type: os_type.map(str::to_string),
            kernel_name: kernel_name.map(str::to_string),
        }
    }

    /// Collect signals from an environment snapshot.
    ///
    /// `OSTYPE` is only exported by some shells, so a native Windows build
    /// reports `win32` when it is missing. Git Bash and MSYS2 export
    /// `MSYSTEM` (`MINGW64`, `MINGW32`, ...), which stands in for the kernel
    /// name.
    pub fn from_env(env: &HashMap<String, String>) -> Self {
        let os_type = env.get("OSTYPE").cloned().or_else(|| {
            if cfg!(windows) {
                Some("win32".to_string())
            } else {
                Some(std::env::consts::OS.to_string())
            }
        });

        Self {
            os_type,
            kernel_name: env.get("MSYSTEM").cloned(),
        }
    }
}

/// Classify the host from its OS-type and kernel-name strings.
pub fn classify_platform(signals: &PlatformSignals) -> PlatformClass {
    let windows_os_type = signals
        .os_type
        .as_deref()
        .map(|os| WINDOWS_OS_TYPES.contains(&os))
        .unwrap_or(false);

    let windows_kernel = signals
        .kernel_name
        .as_deref()
        .map(|kernel| {
            WINDOWS_KERNEL_PREFIXES
                .iter()
                .any(|prefix| kernel.starts_with(prefix))
        })
        .unwrap_or(false);

    if windows_os_type || windows_kernel {
        PlatformClass::WindowsFamily
    } else {
        PlatformClass::PosixFamily
    }
}
