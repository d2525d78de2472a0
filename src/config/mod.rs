// src/config/mod.rs

//! Configuration loading and validation for kyonrun.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate durations, script ids and paths (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{config_root_dir, load_and_validate, load_from_path};
pub use model::{
    AdhocSection, ConfigFile, ExecLimits, ExecSection, RawConfigFile, ScriptsSection,
    ServerSection,
};
pub use validate::{parse_duration, validate_script_entry};
