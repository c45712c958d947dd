//! droidpack - build an installable APK from an Expo project
//!
//! droidpack installs a project's JavaScript dependencies, drives the Expo
//! build CLI locally or against the EAS build service, and can turn an
//! Android App Bundle into a single universal APK with bundletool.
//!
//! ## Architecture
//!
//! - `droidpack-core`: project context, configuration, platform probe and
//!   the external command runner
//! - `droidpack-android-toolchain`: prerequisite checks, tool downloads,
//!   bundletool and AAB conversion
//! - `droidpack-build-engine`: build modes, dependency installer, Expo CLI
//!   and the strategy dispatcher

#![warn(clippy::all)]

pub mod commands;

// Re-export main components for library usage
pub use droidpack_android_toolchain as toolchain;
pub use droidpack_build_engine as build;
pub use droidpack_core as core;

/// Prelude module for convenient imports
pub mod prelude {
    pub use droidpack_build_engine::{BuildMode, BuildOutcome, BuildRequest, Dispatcher, ModeFlags};
    pub use droidpack_core::{PackConfig, ProjectContext, SystemRunner};
}
