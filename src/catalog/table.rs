// src/catalog/table.rs

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{info, warn};

use crate::config::{validate_script_entry, ScriptsSection};
use crate::errors::Result;
use crate::exec::ScriptCommand;
use crate::fs::FileSystem;
use crate::types::ScriptIdentity;

use super::{interpreter_command, ResolvedScript};

/// Mapping from registered script id to a file in the scripts directory.
///
/// When backed by a table file the mapping can be swapped at runtime with
/// [`ScriptTable::reload`]; readers always see either the old or the new
/// mapping, never a mix.
#[derive(Debug)]
pub struct ScriptTable {
    interpreter: String,
    dir: PathBuf,
    table_path: Option<PathBuf>,
    entries: RwLock<BTreeMap<String, String>>,
    fs: Arc<dyn FileSystem>,
}

impl ScriptTable {
    /// Build the table from `[scripts]`, reading the table file if one is
    /// configured. A table file that cannot be read at startup is an error.
    pub fn from_config(section: &ScriptsSection, fs: Arc<dyn FileSystem>) -> Result<Self> {
        let entries = match &section.table {
            Some(path) => read_table(fs.as_ref(), path)?,
            None => section.entries.clone(),
        };

        Ok(Self {
            interpreter: section.interpreter.clone(),
            dir: section.dir.clone(),
            table_path: section.table.clone(),
            entries: RwLock::new(entries),
            fs,
        })
    }

    pub fn table_path(&self) -> Option<&Path> {
        self.table_path.as_deref()
    }

    /// Re-read the table file, replacing the current mapping.
    ///
    /// On error the previous mapping stays in place. Tables without a
    /// backing file have nothing to reload and report their current size.
    pub fn reload(&self) -> Result<usize> {
        let Some(path) = self.table_path.as_deref() else {
            return Ok(self.len());
        };

        match read_table(self.fs.as_ref(), path) {
            Ok(entries) => {
                let count = entries.len();
                *self.entries.write().unwrap_or_else(PoisonError::into_inner) = entries;
                info!(path = ?path, scripts = count, "script table reloaded");
                Ok(count)
            }
            Err(e) => {
                warn!(path = ?path, error = %e, "script table reload failed; keeping previous mapping");
                Err(e)
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registered ids in sorted order.
    pub fn ids(&self) -> Vec<String> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    pub fn lookup(&self, identity: &ScriptIdentity) -> Option<ResolvedScript> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let file = entries.get(identity.as_str())?;
        let script_path = self.dir.join(file);

        let command: ScriptCommand = interpreter_command(&self.interpreter)
            .arg(script_path.to_string_lossy().into_owned());

        Some(ResolvedScript {
            command,
            script_path,
            accepts_source: false,
        })
    }
}

fn read_table(fs: &dyn FileSystem, path: &Path) -> Result<BTreeMap<String, String>> {
    let contents = fs.read_to_string(path)?;
    parse_table(&contents)
}

/// Parse a table file of `id = "file"` pairs.
pub fn parse_table(contents: &str) -> Result<BTreeMap<String, String>> {
    let entries: BTreeMap<String, String> = toml::from_str(contents)?;
    for (id, file) in entries.iter() {
        validate_script_entry(id, file)?;
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    fn section(table: Option<&str>) -> ScriptsSection {
        ScriptsSection {
            interpreter: "sh".to_string(),
            dir: PathBuf::from("/srv/scripts"),
            table: table.map(PathBuf::from),
            entries: BTreeMap::from([("static".to_string(), "static.sh".to_string())]),
        }
    }

    #[test]
    fn static_entries_resolve_to_interpreter_on_file() {
        let fs = Arc::new(MockFileSystem::new());
        let table = ScriptTable::from_config(&section(None), fs).unwrap();

        let resolved = table.lookup(&ScriptIdentity::new("static")).unwrap();
        assert_eq!(resolved.command.program, "sh");
        assert_eq!(resolved.command.args, vec!["/srv/scripts/static.sh".to_string()]);
        assert!(!resolved.accepts_source);
        assert!(table.lookup(&ScriptIdentity::new("missing")).is_none());
    }

    #[test]
    fn table_file_replaces_static_entries_and_reloads() {
        let fs = MockFileSystem::new();
        fs.add_file("/srv/scripts.toml", "deploy = \"deploy.sh\"\n");
        let table =
            ScriptTable::from_config(&section(Some("/srv/scripts.toml")), Arc::new(fs.clone()))
                .unwrap();

        assert_eq!(table.ids(), vec!["deploy".to_string()]);

        fs.add_file(
            "/srv/scripts.toml",
            "deploy = \"deploy.sh\"\nbackup = \"backup.sh\"\n",
        );
        assert_eq!(table.reload().unwrap(), 2);
        assert!(table.lookup(&ScriptIdentity::new("backup")).is_some());
    }

    #[test]
    fn failed_reload_keeps_previous_mapping() {
        let fs = MockFileSystem::new();
        fs.add_file("/srv/scripts.toml", "deploy = \"deploy.sh\"\n");
        let table =
            ScriptTable::from_config(&section(Some("/srv/scripts.toml")), Arc::new(fs.clone()))
                .unwrap();

        fs.add_file("/srv/scripts.toml", "evil = \"../../etc/passwd\"\n");
        assert!(table.reload().is_err());
        assert_eq!(table.ids(), vec!["deploy".to_string()]);
    }

    #[test]
    fn missing_table_file_fails_at_startup() {
        let fs = Arc::new(MockFileSystem::new());
        assert!(ScriptTable::from_config(&section(Some("/nope.toml")), fs).is_err());
    }
}
