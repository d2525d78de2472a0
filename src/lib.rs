// src/lib.rs

pub mod api;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod coordinator;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod registry;
pub mod sink;
pub mod types;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::api::{ApiConfig, ApiState};
use crate::catalog::{spawn_table_watcher, ScriptCatalog};
use crate::cli::CliArgs;
use crate::config::load_and_validate;
use crate::config::model::ConfigFile;
use crate::coordinator::{CoordinatorOptions, ExecutionCoordinator};
use crate::exec::RealProcessBackend;
use crate::fs::{FileSystem, RealFileSystem};
use crate::registry::ExecutionRegistry;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - script catalog and its table watcher
/// - registry / process backend / coordinator
/// - HTTP server
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let mut cfg = load_and_validate(&config_path)
        .with_context(|| format!("loading config {:?}", config_path))?;

    if let Some(host) = args.host {
        cfg.server.host = host;
    }
    if let Some(port) = args.port {
        cfg.server.port = port;
    }

    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let catalog = ScriptCatalog::from_config(&cfg, Arc::clone(&fs))?;

    if args.check {
        print_check(&cfg, &catalog);
        return Ok(());
    }

    let _watcher = spawn_table_watcher(Arc::clone(catalog.table()))?;

    let state = ApiState {
        scripts: Arc::clone(catalog.table()),
        adhoc_enabled: catalog.adhoc_enabled(),
        coordinator: ExecutionCoordinator::new(
            ExecutionRegistry::new(),
            Arc::new(RealProcessBackend::new()),
            Arc::new(catalog),
            fs,
            CoordinatorOptions::from(&cfg),
        ),
    };

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
        info!("shutdown requested");
    };

    let (_addr, server) = api::start_server(ApiConfig::from(&cfg.server), state, shutdown)
        .await
        .with_context(|| format!("binding {}:{}", cfg.server.host, cfg.server.port))?;

    server.await.context("server task panicked")?;
    Ok(())
}

/// `--check` output: what would be served.
fn print_check(cfg: &ConfigFile, catalog: &ScriptCatalog) {
    println!("kyonrun config OK");
    println!("  listen = {}:{}", cfg.server.host, cfg.server.port);
    if let Some(dir) = &cfg.server.static_dir {
        println!("  static_dir = {}", dir.display());
    }
    println!(
        "  timeout = {:?}, kill_grace = {:?}, wait_heartbeat = {:?}",
        cfg.limits.timeout, cfg.limits.kill_grace, cfg.wait_heartbeat
    );
    match &cfg.adhoc {
        Some(adhoc) => println!(
            "  adhoc = {} {}",
            adhoc.interpreter,
            adhoc.script_path.display()
        ),
        None => println!("  adhoc = disabled"),
    }
    println!();

    let table = catalog.table();
    println!("scripts ({}):", table.len());
    for id in table.ids() {
        println!("  - {id}");
    }
}
