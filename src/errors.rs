// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum KyonrunError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Script not found: {0}")]
    ScriptNotFound(String),

    #[error("Script '{0}' does not accept inline source")]
    SourceNotAccepted(String),

    #[error("Admission for '{0}' was abandoned by the registry")]
    AdmissionClosed(String),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, KyonrunError>;
