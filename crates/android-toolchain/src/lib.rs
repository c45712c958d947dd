//! Android Toolchain Management
//!
//! Handles the Android side of a build:
//! - prerequisite detection (node, npm, eas, java)
//! - downloading helper tools with curl or wget
//! - caching and running bundletool
//! - converting an AAB into a universal APK

pub mod bundletool;
pub mod converter;
pub mod detector;
pub mod downloader;

pub use bundletool::BundletoolManager;
pub use converter::{ArchiveConverter, ConversionJob, ConvertError, OUTPUT_APK, SCRATCH_DIR, UNIVERSAL_APK};
pub use detector::{Prerequisite, ToolchainDetector, ToolchainStatus, BUILD_PREREQUISITES, CONVERSION_PREREQUISITES};
pub use downloader::{DownloadError, DownloadMethod, ToolDownloader};

/// Extension of an installable Android package
pub const APK_EXTENSION: &str = "apk";

/// Extension of an Android App Bundle
pub const AAB_EXTENSION: &str = "aab";
