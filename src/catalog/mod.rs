// src/catalog/mod.rs

//! Resolution of script identities to runnable commands.
//!
//! - [`table`] holds the registered `id -> file` mapping.
//! - [`watcher`] reloads the mapping when its backing file changes.
//!
//! [`ScriptCatalog`] combines the registered table with the optional ad-hoc
//! script, which is addressed by [`ScriptIdentity::ADHOC`].

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{AdhocSection, ConfigFile};
use crate::errors::Result;
use crate::exec::ScriptCommand;
use crate::fs::FileSystem;
use crate::types::ScriptIdentity;

pub mod table;
pub mod watcher;

pub use table::{parse_table, ScriptTable};
pub use watcher::{spawn_table_watcher, TableWatcher};

/// What an identity resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedScript {
    pub command: ScriptCommand,
    /// The file the interpreter is pointed at.
    pub script_path: PathBuf,
    /// Whether caller-supplied source is written to `script_path` before
    /// each run.
    pub accepts_source: bool,
}

/// Lookup seam used by the coordinator.
pub trait ScriptResolver: Send + Sync {
    fn resolve(&self, identity: &ScriptIdentity) -> Option<ResolvedScript>;
}

/// Split an interpreter setting such as `"node --no-warnings"` into a
/// command with its leading arguments.
pub(crate) fn interpreter_command(interpreter: &str) -> ScriptCommand {
    let mut parts = interpreter.split_whitespace();
    let program = parts.next().unwrap_or_default();
    ScriptCommand::new(program).args(parts)
}

/// The single ad-hoc script slot.
#[derive(Debug, Clone)]
pub struct AdhocScript {
    interpreter: String,
    script_path: PathBuf,
}

impl AdhocScript {
    pub fn new(interpreter: impl Into<String>, script_path: impl Into<PathBuf>) -> Self {
        Self {
            interpreter: interpreter.into(),
            script_path: script_path.into(),
        }
    }

    pub fn resolved(&self) -> ResolvedScript {
        let command = interpreter_command(&self.interpreter)
            .arg(self.script_path.to_string_lossy().into_owned());
        ResolvedScript {
            command,
            script_path: self.script_path.clone(),
            accepts_source: true,
        }
    }
}

impl From<&AdhocSection> for AdhocScript {
    fn from(section: &AdhocSection) -> Self {
        Self::new(section.interpreter.clone(), section.script_path.clone())
    }
}

/// Everything the server can run.
#[derive(Debug, Clone)]
pub struct ScriptCatalog {
    adhoc: Option<AdhocScript>,
    table: Arc<ScriptTable>,
}

impl ScriptCatalog {
    pub fn new(adhoc: Option<AdhocScript>, table: Arc<ScriptTable>) -> Self {
        Self { adhoc, table }
    }

    pub fn from_config(cfg: &ConfigFile, fs: Arc<dyn FileSystem>) -> Result<Self> {
        let table = ScriptTable::from_config(&cfg.scripts, fs)?;
        Ok(Self::new(
            cfg.adhoc.as_ref().map(AdhocScript::from),
            Arc::new(table),
        ))
    }

    pub fn table(&self) -> &Arc<ScriptTable> {
        &self.table
    }

    pub fn adhoc_enabled(&self) -> bool {
        self.adhoc.is_some()
    }
}

impl ScriptResolver for ScriptCatalog {
    fn resolve(&self, identity: &ScriptIdentity) -> Option<ResolvedScript> {
        if identity.is_adhoc() {
            return self.adhoc.as_ref().map(AdhocScript::resolved);
        }
        self.table.lookup(identity)
    }
}
