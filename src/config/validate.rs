// src/config/validate.rs

use std::path::{Component, Path};
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;

use crate::config::model::{ConfigFile, ExecLimits, RawConfigFile};
use crate::errors::{KyonrunError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::KyonrunError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_server(&raw)?;
        validate_interpreters(&raw)?;
        for (id, file) in raw.scripts.entries.iter() {
            validate_script_entry(id, file)?;
        }

        let limits = ExecLimits {
            timeout: positive_duration("exec.timeout", &raw.exec.timeout)?,
            kill_grace: positive_duration("exec.kill_grace", &raw.exec.kill_grace)?,
        };
        let wait_heartbeat = positive_duration("exec.wait_heartbeat", &raw.exec.wait_heartbeat)?;

        Ok(ConfigFile::new_unchecked(
            raw.server,
            limits,
            wait_heartbeat,
            raw.adhoc,
            raw.scripts,
        ))
    }
}

fn validate_server(cfg: &RawConfigFile) -> Result<()> {
    if cfg.server.port == 0 {
        return Err(KyonrunError::ConfigError(
            "[server].port must be >= 1 (got 0)".to_string(),
        ));
    }
    if cfg.server.host.trim().is_empty() {
        return Err(KyonrunError::ConfigError(
            "[server].host must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_interpreters(cfg: &RawConfigFile) -> Result<()> {
    if cfg.scripts.interpreter.trim().is_empty() {
        return Err(KyonrunError::ConfigError(
            "[scripts].interpreter must not be empty".to_string(),
        ));
    }
    if let Some(adhoc) = &cfg.adhoc {
        if adhoc.interpreter.trim().is_empty() {
            return Err(KyonrunError::ConfigError(
                "[adhoc].interpreter must not be empty".to_string(),
            ));
        }
    }
    Ok(())
}

fn positive_duration(field: &str, value: &str) -> Result<Duration> {
    let dur = parse_duration(value)
        .map_err(|e| KyonrunError::ConfigError(format!("{field}: {e}")))?;
    if dur.is_zero() {
        return Err(KyonrunError::ConfigError(format!(
            "{field} must be greater than zero"
        )));
    }
    Ok(dur)
}

fn script_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_.-]+$").expect("static regex is valid"))
}

/// Check a single `id = "file"` script mapping.
///
/// Ids are restricted to `[A-Za-z0-9_.-]+` and files must stay inside the
/// scripts directory (relative, no `..`).
pub fn validate_script_entry(id: &str, file: &str) -> Result<()> {
    if !script_id_regex().is_match(id) {
        return Err(KyonrunError::ConfigError(format!(
            "script id '{id}' must match [A-Za-z0-9_.-]+"
        )));
    }

    let path = Path::new(file);
    if file.trim().is_empty() {
        return Err(KyonrunError::ConfigError(format!(
            "script '{id}' has an empty file name"
        )));
    }
    let escapes = path
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        return Err(KyonrunError::ConfigError(format!(
            "script '{id}' file '{file}' must be a relative path inside the scripts dir"
        )));
    }
    Ok(())
}

/// Parse a simple duration string like `"3s"`, `"250ms"`, `"1m"`, `"2h"`.
pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    // Find the boundary between digits and suffix.
    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| "duration missing unit suffix".to_string())?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;
    let unit = unit_part.trim().to_lowercase();

    match unit.as_str() {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "m" => Ok(Duration::from_secs(value * 60)),
        "h" => Ok(Duration::from_secs(value * 60 * 60)),
        _ => Err(format!(
            "unsupported duration unit '{}'; expected ms, s, m, or h",
            unit
        )),
    }
}
