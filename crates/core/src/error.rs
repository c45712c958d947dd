//! Error types for droidpack core
//!
//! Failures that happen before anything is mutated: missing prerequisites
//! and unreadable configuration.

use thiserror::Error;

/// Core error type
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Prerequisite missing: {0}")]
    PrerequisiteMissing(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
    /// Short stable tag used when reporting the failure
    pub fn category(&self) -> &'static str {
        match self {
            CoreError::PrerequisiteMissing(_) => "prerequisite",
            CoreError::Config(_) | CoreError::TomlParse(_) => "config",
            CoreError::Io(_) => "io",
        }
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            CoreError::PrerequisiteMissing(what) => format!("{}. Install it and try again.", what),
            CoreError::TomlParse(e) => format!("droidpack.toml is not valid TOML: {}", e),
            _ => self.to_string(),
        }
    }
}
