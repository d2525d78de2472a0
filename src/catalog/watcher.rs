// src/catalog/watcher.rs

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::errors::{KyonrunError, Result};

use super::table::ScriptTable;

/// Editors tend to emit several events per save.
const SETTLE: Duration = Duration::from_millis(100);

/// Keeps the table watcher alive. Dropping it stops reloading.
pub struct TableWatcher {
    _inner: RecommendedWatcher,
    path: PathBuf,
}

impl std::fmt::Debug for TableWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableWatcher")
            .field("path", &self.path)
            .finish()
    }
}

/// Watch the table file behind `table` and reload it whenever it changes.
///
/// The parent directory is watched rather than the file itself so that
/// atomic save-by-rename is picked up. Returns `Ok(None)` when the table has
/// no backing file.
pub fn spawn_table_watcher(table: Arc<ScriptTable>) -> Result<Option<TableWatcher>> {
    let Some(path) = table.table_path().map(Path::to_path_buf) else {
        return Ok(None);
    };
    let path = path.canonicalize().unwrap_or(path);
    let Some(dir) = path.parent().map(Path::to_path_buf) else {
        return Err(KyonrunError::ConfigError(format!(
            "script table {path:?} has no parent directory"
        )));
    };
    let Some(file_name) = path.file_name().map(|n| n.to_os_string()) else {
        return Err(KyonrunError::ConfigError(format!(
            "script table {path:?} has no file name"
        )));
    };

    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if let Err(err) = event_tx.send(event) {
                    eprintln!("kyonrun: failed to forward notify event: {err}");
                }
            }
            Err(err) => eprintln!("kyonrun: file watch error: {err}"),
        },
        Config::default(),
    )
    .map_err(anyhow::Error::from)?;

    watcher
        .watch(&dir, RecursiveMode::NonRecursive)
        .map_err(anyhow::Error::from)?;

    info!(path = ?path, "watching script table for changes");

    tokio::spawn(async move {
        let touches_table = |event: &Event| {
            !matches!(event.kind, EventKind::Access(_))
                && event
                    .paths
                    .iter()
                    .any(|p| p.file_name() == Some(file_name.as_os_str()))
        };

        while let Some(event) = event_rx.recv().await {
            if !touches_table(&event) {
                continue;
            }
            debug!(?event, "script table touched");

            tokio::time::sleep(SETTLE).await;
            while event_rx.try_recv().is_ok() {}

            // Failures are logged by reload and the old mapping stays.
            let _ = table.reload();
        }
        debug!("script table watcher finished");
    });

    Ok(Some(TableWatcher {
        _inner: watcher,
        path,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScriptsSection;
    use crate::fs::RealFileSystem;

    #[tokio::test]
    async fn no_table_file_means_no_watcher() {
        let table = ScriptTable::from_config(&ScriptsSection::default(), Arc::new(RealFileSystem))
            .unwrap();
        assert!(spawn_table_watcher(Arc::new(table)).unwrap().is_none());
    }

    #[tokio::test]
    async fn edits_to_the_table_file_are_picked_up() {
        let dir = tempfile::tempdir().unwrap();
        let table_path = dir.path().join("scripts.toml");
        std::fs::write(&table_path, "one = \"one.sh\"\n").unwrap();

        let section = ScriptsSection {
            table: Some(table_path.clone()),
            ..ScriptsSection::default()
        };
        let table = Arc::new(ScriptTable::from_config(&section, Arc::new(RealFileSystem)).unwrap());
        let _watcher = spawn_table_watcher(Arc::clone(&table)).unwrap().unwrap();

        std::fs::write(&table_path, "one = \"one.sh\"\ntwo = \"two.sh\"\n").unwrap();

        let reloaded = tokio::time::timeout(Duration::from_secs(5), async {
            while table.len() != 2 {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await;
        assert!(reloaded.is_ok(), "table was not reloaded after edit");
    }
}
