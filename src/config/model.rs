// src/config/model.rs

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

/// Configuration exactly as read from the TOML file.
///
/// ```toml
/// [server]
/// host = "127.0.0.1"
/// port = 4502
/// static_dir = "dist"
///
/// [exec]
/// timeout = "20s"
/// kill_grace = "5s"
/// wait_heartbeat = "5s"
///
/// [adhoc]
/// interpreter = "node"
/// script_path = "scripts/tmp.js"
///
/// [scripts]
/// interpreter = "sh"
/// dir = "scripts"
/// table = "scripts.toml"
/// ```
///
/// All sections are optional. Use `ConfigFile::try_from(raw)` to validate it.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub exec: ExecSection,

    /// Ad-hoc execution of caller-supplied source. Disabled when absent.
    #[serde(default)]
    pub adhoc: Option<AdhocSection>,

    #[serde(default)]
    pub scripts: ScriptsSection,
}

/// `[server]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory served for any path no API route matches.
    #[serde(default)]
    pub static_dir: Option<PathBuf>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    4502
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_dir: None,
        }
    }
}

/// `[exec]` section. Durations use the `"250ms"`, `"3s"`, `"1m"`, `"2h"` form.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecSection {
    /// Wall-clock limit before the process is sent SIGTERM.
    #[serde(default = "default_timeout")]
    pub timeout: String,

    /// How long a terminated process may linger before SIGKILL.
    #[serde(default = "default_kill_grace")]
    pub kill_grace: String,

    /// Interval between `Waiting` notifications sent to queued callers.
    #[serde(default = "default_wait_heartbeat")]
    pub wait_heartbeat: String,
}

fn default_timeout() -> String {
    "20s".to_string()
}

fn default_kill_grace() -> String {
    "5s".to_string()
}

fn default_wait_heartbeat() -> String {
    "5s".to_string()
}

impl Default for ExecSection {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            kill_grace: default_kill_grace(),
            wait_heartbeat: default_wait_heartbeat(),
        }
    }
}

/// `[adhoc]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct AdhocSection {
    #[serde(default = "default_adhoc_interpreter")]
    pub interpreter: String,

    /// Where caller-supplied source is written before each run.
    #[serde(default = "default_adhoc_script_path")]
    pub script_path: PathBuf,
}

fn default_adhoc_interpreter() -> String {
    "node".to_string()
}

fn default_adhoc_script_path() -> PathBuf {
    PathBuf::from("scripts/tmp.js")
}

impl Default for AdhocSection {
    fn default() -> Self {
        Self {
            interpreter: default_adhoc_interpreter(),
            script_path: default_adhoc_script_path(),
        }
    }
}

/// `[scripts]` section: pre-registered scripts addressed by id.
#[derive(Debug, Clone, Deserialize)]
pub struct ScriptsSection {
    #[serde(default = "default_scripts_interpreter")]
    pub interpreter: String,

    /// Directory that script file names are resolved against.
    #[serde(default = "default_scripts_dir")]
    pub dir: PathBuf,

    /// Optional TOML file of `id = "file"` pairs, reloaded when it changes.
    ///
    /// When set, it replaces `entries` entirely.
    #[serde(default)]
    pub table: Option<PathBuf>,

    /// Static `id = "file"` mapping used when no `table` is configured.
    #[serde(default)]
    pub entries: BTreeMap<String, String>,
}

fn default_scripts_interpreter() -> String {
    "sh".to_string()
}

fn default_scripts_dir() -> PathBuf {
    PathBuf::from("scripts")
}

impl Default for ScriptsSection {
    fn default() -> Self {
        Self {
            interpreter: default_scripts_interpreter(),
            dir: default_scripts_dir(),
            table: None,
            entries: BTreeMap::new(),
        }
    }
}

/// Timing limits applied to every execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecLimits {
    pub timeout: Duration,
    pub kill_grace: Duration,
}

impl Default for ExecLimits {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(20),
            kill_grace: Duration::from_secs(5),
        }
    }
}

/// Validated configuration.
///
/// Relative paths have been resolved against the config file's directory and
/// durations have been parsed.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub server: ServerSection,
    pub limits: ExecLimits,
    pub wait_heartbeat: Duration,
    pub adhoc: Option<AdhocSection>,
    pub scripts: ScriptsSection,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        server: ServerSection,
        limits: ExecLimits,
        wait_heartbeat: Duration,
        adhoc: Option<AdhocSection>,
        scripts: ScriptsSection,
    ) -> Self {
        Self {
            server,
            limits,
            wait_heartbeat,
            adhoc,
            scripts,
        }
    }

    /// Rewrite every relative path in the config to be relative to `root`.
    pub fn rebase(mut self, root: &Path) -> Self {
        fn join(root: &Path, p: &Path) -> PathBuf {
            if p.is_absolute() { p.to_path_buf() } else { root.join(p) }
        }

        if let Some(dir) = self.server.static_dir.take() {
            self.server.static_dir = Some(join(root, &dir));
        }
        if let Some(adhoc) = self.adhoc.as_mut() {
            adhoc.script_path = join(root, &adhoc.script_path);
        }
        self.scripts.dir = join(root, &self.scripts.dir);
        if let Some(table) = self.scripts.table.take() {
            self.scripts.table = Some(join(root, &table));
        }
        self
    }
}
