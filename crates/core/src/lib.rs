//! droidpack core - shared types
//!
//! Everything the other crates need to talk about a project without reading
//! ambient process state: the [`ProjectContext`], its [`PackConfig`], the
//! host [`PlatformClass`] and the [`CommandRunner`] used for every external
//! program.

pub mod config;
pub mod error;
pub mod platform;
pub mod process;
pub mod project;

pub use config::{BundletoolConfig, InstallConfig, PackConfig};
pub use error::{CoreError, Result};
pub use platform::{classify_platform, PlatformClass, PlatformSignals};
pub use process::{CommandOptions, CommandOutput, CommandRunner, RunError, SystemRunner};
pub use project::{ProjectContext, APP_CONFIG_FILES};

/// droidpack version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "droidpack";
