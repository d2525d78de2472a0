// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `kyonrun`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "kyonrun",
    version,
    about = "Serve scripts over HTTP, one execution per script at a time.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Kyonrun.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Kyonrun.toml")]
    pub config: String,

    /// Override `[server].host`.
    #[arg(long, value_name = "HOST")]
    pub host: Option<String>,

    /// Override `[server].port`.
    #[arg(long, value_name = "PORT")]
    pub port: Option<u16>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `KYONRUN_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Validate the config, print a summary, and exit without serving.
    #[arg(long)]
    pub check: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
