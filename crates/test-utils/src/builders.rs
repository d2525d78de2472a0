#![allow(dead_code)]

use std::path::{Path, PathBuf};

use kyonrun::config::{AdhocSection, ConfigFile, RawConfigFile};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
    root: Option<PathBuf>,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
            root: None,
        }
    }

    pub fn with_script(mut self, id: &str, file: &str) -> Self {
        self.config
            .scripts
            .entries
            .insert(id.to_string(), file.to_string());
        self
    }

    pub fn with_scripts_interpreter(mut self, interpreter: &str) -> Self {
        self.config.scripts.interpreter = interpreter.to_string();
        self
    }

    pub fn with_scripts_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.config.scripts.dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn with_table(mut self, path: impl AsRef<Path>) -> Self {
        self.config.scripts.table = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn with_adhoc(mut self, interpreter: &str, script_path: impl AsRef<Path>) -> Self {
        self.config.adhoc = Some(AdhocSection {
            interpreter: interpreter.to_string(),
            script_path: script_path.as_ref().to_path_buf(),
        });
        self
    }

    pub fn with_timeout(mut self, timeout: &str) -> Self {
        self.config.exec.timeout = timeout.to_string();
        self
    }

    pub fn with_kill_grace(mut self, grace: &str) -> Self {
        self.config.exec.kill_grace = grace.to_string();
        self
    }

    pub fn with_wait_heartbeat(mut self, every: &str) -> Self {
        self.config.exec.wait_heartbeat = every.to_string();
        self
    }

    pub fn with_static_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.config.server.static_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Resolve relative paths against `root`, as loading from a file would.
    pub fn rooted_at(mut self, root: impl AsRef<Path>) -> Self {
        self.root = Some(root.as_ref().to_path_buf());
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        let cfg = ConfigFile::try_from(self.config)
            .expect("Failed to build valid config from builder");
        match self.root {
            Some(root) => cfg.rebase(&root),
            None => cfg,
        }
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}
