// src/lib.rs

pub mod bundler;
pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod fs;
pub mod host;
pub mod logging;
pub mod types;
pub mod watch;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::bundler::{Bundler, CommandBundler};
use crate::cli::CliArgs;
use crate::config::{default_config_path, open_store, ConfigFile};
use crate::engine::{Runtime, RuntimeEvent, RuntimeParts};
use crate::fs::RealFileSystem;
use crate::host::{spawn_command_reader, StdoutSink};
use crate::watch::NotifyWatcher;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - the bundler command
/// - the host protocol on stdin/stdout
/// - the runtime with its rebuild loop and readiness gate
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = args.config.clone().unwrap_or_else(default_config_path);
    let store = open_store(&config_path)?;
    let cfg = store.to_config()?;

    if args.dry_run {
        print_dry_run(&config_path, &cfg);
        return Ok(());
    }

    let bundler = CommandBundler::new(cfg.bundler.cmd.clone());

    if let Some(file) = args.once.as_deref() {
        return run_once(bundler, &cfg, file).await;
    }

    // Runtime event channel.
    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);

    // Host commands from stdin.
    let _reader = spawn_command_reader(BufReader::new(tokio::io::stdin()), rt_tx.clone());

    // Ctrl-C → graceful shutdown.
    {
        let tx = rt_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            let _ = tx.send(RuntimeEvent::ShutdownRequested).await;
        });
    }

    info!(config = ?config_path, source = ?cfg.plugins.source, "bundlewatch ready");

    let runtime = Runtime::new(RuntimeParts {
        store,
        bundler,
        watcher: Arc::new(NotifyWatcher::new()),
        sink: StdoutSink::new(),
        fs: Arc::new(RealFileSystem),
        event_tx: rt_tx,
        event_rx: rt_rx,
    })?;
    runtime.run().await?;
    Ok(())
}

/// Compile `file` once and print the module list (or the compile error) as
/// JSON on stdout.
async fn run_once(mut bundler: CommandBundler, cfg: &ConfigFile, file: &Path) -> Result<()> {
    let entry = cfg.plugins.source.join(file);
    match bundler.compile(&entry, &cfg.plugins.destination).await {
        Ok(graph) => {
            println!("{}", serde_json::to_string_pretty(&graph)?);
            Ok(())
        }
        Err(err) => {
            println!("{}", serde_json::to_string_pretty(&err)?);
            Err(err.into())
        }
    }
}

/// Simple dry-run output: print the effective configuration.
fn print_dry_run(config_path: &Path, cfg: &ConfigFile) {
    println!("bundlewatch dry-run");
    println!("  config file = {}", config_path.display());
    println!();
    println!("plugins:");
    println!("  source      = {}", cfg.plugins.source.display());
    println!("  destination = {}", cfg.plugins.destination.display());
    println!("bundler:");
    println!("  cmd = {}", cfg.bundler.cmd);
    println!("watch:");
    println!("  debounce_ms = {}", cfg.watch.debounce_ms);
    if !cfg.watch.exclude.is_empty() {
        println!("  exclude = {:?}", cfg.watch.exclude);
    }
    if cfg.watch.use_hash {
        println!("  use_hash = true");
    }
    if cfg.watch.rearm_on_failure {
        println!("  rearm_on_failure = true");
    }

    debug!("dry-run complete (nothing compiled)");
}
