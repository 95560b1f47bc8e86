// src/engine/rebuild.rs

//! Incremental rebuild loop.
//!
//! Keeps one watch per module of the most recent dependency graph and
//! recompiles the current request when one of those modules changes.
//!
//! Ordering rules:
//! - `start` closes every handle of the previous request before compiling.
//! - after a change-triggered compile succeeds, every old handle is closed
//!   before any new one is opened; handles are never reused.
//! - a failed compile leaves the watch set exactly as it was.
//!
//! Each watch set gets a fresh generation number. Events carry the
//! generation of the watch that produced them, so anything still queued from
//! a closed handle is ignored.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::bundler::{Bundler, CompileError};
use crate::config::ConfigFile;
use crate::engine::RuntimeEvent;
use crate::errors::Result;
use crate::fs::FileSystem;
use crate::types::{BundleRequest, ComponentArgs, DependencyGraph};
use crate::watch::{
    ContentHashes, DirectoryWatcher, ExcludeFilter, FsEvent, FsEventKind, WatchHandle, WatchSpec,
};

/// Settings of the rebuild loop, derived from `[plugins]` and `[watch]`.
#[derive(Debug, Clone)]
pub struct LoopOptions {
    pub source_root: PathBuf,
    pub debounce: Duration,
    pub exclude: ExcludeFilter,
    pub use_hash: bool,
    pub rearm_on_failure: bool,
}

impl LoopOptions {
    pub fn from_config(cfg: &ConfigFile) -> Result<Self> {
        Ok(Self {
            source_root: cfg.plugins.source.clone(),
            debounce: Duration::from_millis(cfg.watch.debounce_ms),
            exclude: ExcludeFilter::new(cfg.watch.exclude.iter().cloned())?,
            use_hash: cfg.watch.use_hash,
            rearm_on_failure: cfg.watch.rearm_on_failure,
        })
    }
}

/// Result of one compile attempt, ready for the gate / host.
#[derive(Debug, Clone, PartialEq)]
pub enum CompileOutcome {
    Succeeded {
        graph: DependencyGraph,
        component_args: ComponentArgs,
    },
    Failed(CompileError),
}

struct ActiveWatch {
    module: PathBuf,
    handle: Box<dyn WatchHandle>,
}

pub struct RebuildWatchLoop<B: Bundler> {
    bundler: B,
    watcher: Arc<dyn DirectoryWatcher>,
    events: mpsc::Sender<RuntimeEvent>,
    options: LoopOptions,
    request: Option<BundleRequest>,
    watches: Vec<ActiveWatch>,
    generation: u64,
    hashes: ContentHashes,
}

impl<B: Bundler> std::fmt::Debug for RebuildWatchLoop<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RebuildWatchLoop")
            .field("request", &self.request)
            .field("generation", &self.generation)
            .field("watched", &self.watched_modules())
            .finish_non_exhaustive()
    }
}

impl<B: Bundler> RebuildWatchLoop<B> {
    pub fn new(
        bundler: B,
        watcher: Arc<dyn DirectoryWatcher>,
        events: mpsc::Sender<RuntimeEvent>,
        options: LoopOptions,
        fs: Arc<dyn FileSystem>,
    ) -> Self {
        Self {
            bundler,
            watcher,
            events,
            options,
            request: None,
            watches: Vec::new(),
            generation: 0,
            hashes: ContentHashes::new(fs),
        }
    }

    pub fn options(&self) -> &LoopOptions {
        &self.options
    }

    /// Replace the options; takes effect with the next compile.
    pub fn set_options(&mut self, options: LoopOptions) {
        self.options = options;
    }

    /// Request currently kept compiled, if any.
    pub fn request(&self) -> Option<&BundleRequest> {
        self.request.as_ref()
    }

    /// Generation of the current watch set.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Modules with a live watch, in graph order.
    pub fn watched_modules(&self) -> Vec<PathBuf> {
        self.watches.iter().map(|w| w.module.clone()).collect()
    }

    pub fn is_watching(&self, path: &Path) -> bool {
        self.watches.iter().any(|w| w.module == path)
    }

    /// Make `request` the current one: close the previous watches, compile,
    /// and watch the resulting graph.
    pub async fn start(&mut self, request: BundleRequest) -> CompileOutcome {
        self.close_all().await;

        info!(file = ?request.source_file, "starting bundle");
        self.request = Some(request.clone());
        let outcome = self.compile(&request).await;

        match &outcome {
            CompileOutcome::Succeeded { graph, .. } => {
                self.install(graph.modules().to_vec()).await;
            }
            CompileOutcome::Failed(err) if self.options.rearm_on_failure => {
                let mut targets = vec![request.entry_path(&self.options.source_root)];
                if let Some(file) = &err.offending_file {
                    targets.push(file.clone());
                }
                info!(?targets, "compile failed; watching entry and offending file");
                self.install(targets).await;
            }
            CompileOutcome::Failed(_) => {
                debug!("compile failed; no watches armed");
            }
        }

        outcome
    }

    /// Whether `event`, produced by a module watch of `generation`, should
    /// trigger a rebuild. Only content changes of currently watched modules
    /// qualify.
    pub fn accepts(&mut self, generation: u64, event: &FsEvent) -> bool {
        if generation != self.generation {
            debug!(generation, current = self.generation, path = ?event.path, "ignoring event from closed watch");
            return false;
        }
        if event.kind != FsEventKind::Changed {
            debug!(kind = ?event.kind, path = ?event.path, "ignoring non-change event");
            return false;
        }
        if !self.is_watching(&event.path) {
            debug!(path = ?event.path, "ignoring event for unwatched path");
            return false;
        }
        if self.options.use_hash && !self.hashes.refresh(&event.path) {
            info!(path = ?event.path, "content unchanged; skipping rebuild");
            return false;
        }
        true
    }

    /// Recompile the current request. On success the watch set is replaced
    /// (close all, then open new); on failure it is left untouched.
    ///
    /// Returns `None` when there is no current request.
    pub async fn rebuild(&mut self) -> Option<CompileOutcome> {
        let request = self.request.clone()?;
        info!(file = ?request.source_file, "rebuilding bundle");
        let outcome = self.compile(&request).await;

        match &outcome {
            CompileOutcome::Succeeded { graph, .. } => {
                self.close_all().await;
                self.install(graph.modules().to_vec()).await;
            }
            CompileOutcome::Failed(err) => {
                info!(code = %err.code, watched = self.watches.len(), "rebuild failed; keeping current watches");
            }
        }

        Some(outcome)
    }

    /// Close every watch and forget the current request.
    pub async fn stop(&mut self) {
        self.close_all().await;
        if self.request.take().is_some() {
            info!("rebuild loop stopped");
        }
    }

    async fn compile(&mut self, request: &BundleRequest) -> CompileOutcome {
        let entry = request.entry_path(&self.options.source_root);
        match self.bundler.compile(&entry, &request.destination_dir).await {
            Ok(graph) => {
                debug!(modules = graph.len(), "compile succeeded");
                CompileOutcome::Succeeded {
                    graph,
                    component_args: request.component_args.clone(),
                }
            }
            Err(err) => {
                warn!(code = %err.code, message = %err.message, file = ?err.offending_file, "compile failed");
                CompileOutcome::Failed(err)
            }
        }
    }

    async fn close_all(&mut self) {
        let watches = std::mem::take(&mut self.watches);
        let count = watches.len();
        for watch in watches {
            watch.handle.close().await;
        }
        self.generation += 1;
        if count > 0 {
            debug!(count, generation = self.generation, "closed module watches");
        }
    }

    /// Open one watch per distinct, non-excluded module. Failures to open a
    /// watch are logged and the module is left unwatched.
    async fn install(&mut self, modules: Vec<PathBuf>) {
        let mut seen = HashSet::new();

        for module in modules {
            if self.options.exclude.is_excluded(&module) {
                debug!(?module, "module excluded from watching");
                continue;
            }
            if !seen.insert(module.clone()) {
                continue;
            }
            let Some(spec) = WatchSpec::for_module(&module, self.options.debounce, self.generation)
            else {
                warn!(?module, "module has no parent directory; not watching");
                continue;
            };

            match self.watcher.open(spec, self.events.clone()).await {
                Ok(handle) => {
                    info!(?module, "watching module");
                    if self.options.use_hash {
                        self.hashes.record(&module);
                    }
                    self.watches.push(ActiveWatch { module, handle });
                }
                Err(err) => {
                    warn!(?module, error = %err, "failed to watch module; skipping");
                }
            }
        }

        if self.options.use_hash {
            let watched = self.watched_modules();
            self.hashes.retain(&watched);
        }
    }
}
