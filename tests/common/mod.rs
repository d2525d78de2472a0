#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use kyonrun::catalog::ScriptCatalog;
use kyonrun::config::ConfigFile;
use kyonrun::coordinator::{CoordinatorOptions, ExecutionCoordinator};
use kyonrun::exec::RealProcessBackend;
use kyonrun::fs::{FileSystem, RealFileSystem};
use kyonrun::registry::ExecutionRegistry;
use kyonrun_test_utils::builders::ConfigFileBuilder;

pub use kyonrun_test_utils::{init_tracing, with_timeout};

/// Write `body` as an `sh` script named `name` under `dir`.
pub fn write_script(dir: &Path, name: &str, body: &str) {
    std::fs::write(dir.join(name), body).unwrap();
}

/// A config with `sh` scripts in `dir`, short timings, and ad-hoc `sh`.
pub fn sh_config(dir: &Path) -> ConfigFileBuilder {
    ConfigFileBuilder::new()
        .with_scripts_interpreter("sh")
        .with_scripts_dir(dir)
        .with_adhoc("sh", dir.join("adhoc/tmp.sh"))
        .with_timeout("5s")
        .with_kill_grace("1s")
        .with_wait_heartbeat("100ms")
}

/// Coordinator over real processes and the real filesystem.
pub fn real_coordinator(cfg: &ConfigFile) -> (ExecutionCoordinator, ScriptCatalog) {
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let catalog = ScriptCatalog::from_config(cfg, Arc::clone(&fs)).unwrap();
    let coordinator = ExecutionCoordinator::new(
        ExecutionRegistry::new(),
        Arc::new(RealProcessBackend::new()),
        Arc::new(catalog.clone()),
        fs,
        CoordinatorOptions::from(cfg),
    );
    (coordinator, catalog)
}
