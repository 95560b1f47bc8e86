// src/engine/runtime.rs

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::bundler::Bundler;
use crate::config::{json_to_toml, ConfigFile, ConfigStore};
use crate::errors::Result;
use crate::fs::FileSystem;
use crate::host::{HostMessage, HostSink};
use crate::types::{BundleRequest, ComponentArgs};
use crate::watch::{
    catalog_watch_spec, scan_source, DirectoryWatcher, FsEvent, FsEventKind, WatchHandle, WatchTag,
};

use super::gate::{Delivery, ReadinessGate};
use super::rebuild::{CompileOutcome, LoopOptions, RebuildWatchLoop};
use super::RuntimeEvent;

/// Collaborators the runtime is assembled from.
pub struct RuntimeParts<B: Bundler, S: HostSink> {
    pub store: ConfigStore,
    pub bundler: B,
    pub watcher: Arc<dyn DirectoryWatcher>,
    pub sink: S,
    pub fs: Arc<dyn FileSystem>,
    pub event_tx: mpsc::Sender<RuntimeEvent>,
    pub event_rx: mpsc::Receiver<RuntimeEvent>,
}

/// Drives the rebuild loop and the readiness gate in response to
/// `RuntimeEvent`s, and reports to the host through a `HostSink`.
///
/// Events are handled strictly one after another; a compile in flight runs
/// to completion before the next event is looked at.
pub struct Runtime<B: Bundler, S: HostSink> {
    store: ConfigStore,
    config: ConfigFile,
    rebuild: RebuildWatchLoop<B>,
    gate: ReadinessGate,
    watcher: Arc<dyn DirectoryWatcher>,
    catalog_watch: Option<Box<dyn WatchHandle>>,
    fs: Arc<dyn FileSystem>,
    sink: S,
    event_tx: mpsc::Sender<RuntimeEvent>,
    event_rx: mpsc::Receiver<RuntimeEvent>,
}

impl<B: Bundler, S: HostSink> fmt::Debug for Runtime<B, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("rebuild", &self.rebuild)
            .field("gate", &self.gate)
            .finish_non_exhaustive()
    }
}

impl<B: Bundler, S: HostSink> Runtime<B, S> {
    /// Build a runtime; fails if the store does not hold a valid config.
    pub fn new(parts: RuntimeParts<B, S>) -> Result<Self> {
        let RuntimeParts {
            store,
            bundler,
            watcher,
            sink,
            fs,
            event_tx,
            event_rx,
        } = parts;

        let config = store.to_config()?;
        let options = LoopOptions::from_config(&config)?;
        let rebuild = RebuildWatchLoop::new(
            bundler,
            Arc::clone(&watcher),
            event_tx.clone(),
            options,
            Arc::clone(&fs),
        );

        Ok(Self {
            store,
            config,
            rebuild,
            gate: ReadinessGate::new(),
            watcher,
            catalog_watch: None,
            fs,
            sink,
            event_tx,
            event_rx,
        })
    }

    /// Main event loop.
    ///
    /// Runs until shutdown is requested, the event channel closes, or the
    /// host can no longer be reached. All watches are closed before
    /// returning, also on error.
    pub async fn run(mut self) -> Result<()> {
        info!("bundlewatch runtime started");

        let result = self.event_loop().await;
        self.shutdown().await;

        match &result {
            Ok(()) => info!("runtime exiting"),
            Err(err) => warn!(error = %err, "runtime exiting after error"),
        }
        result
    }

    async fn event_loop(&mut self) -> Result<()> {
        loop {
            let event = match self.event_rx.recv().await {
                Some(e) => e,
                None => {
                    info!("runtime event channel closed; exiting");
                    return Ok(());
                }
            };

            debug!(?event, "runtime received event");

            if !self.handle(event).await? {
                info!("shutdown requested; stopping runtime");
                return Ok(());
            }
        }
    }

    /// Handle one event. Returns `false` when the runtime should stop.
    async fn handle(&mut self, event: RuntimeEvent) -> Result<bool> {
        match event {
            RuntimeEvent::CompileRequested {
                file,
                component_args,
            } => self.compile_requested(file, component_args).await?,
            RuntimeEvent::ViewerAttached { viewer } => {
                info!(viewer, "viewer attached");
                if let Some(delivery) = self.gate.on_viewer_attached(viewer) {
                    self.deliver(delivery).await?;
                }
            }
            RuntimeEvent::Fs {
                tag: WatchTag::Module { generation },
                event,
            } => self.module_event(generation, event).await?,
            RuntimeEvent::Fs {
                tag: WatchTag::Catalog,
                event,
            } => {
                // Content edits do not change the catalog.
                if event.kind != FsEventKind::Changed {
                    debug!(kind = ?event.kind, path = ?event.path, "catalog changed");
                    self.send_repos().await?;
                }
            }
            RuntimeEvent::ReposRequested => {
                self.send_repos().await?;
                self.ensure_catalog_watch().await;
            }
            RuntimeEvent::SourceRequested => {
                let path = self.config.plugins.source.clone();
                self.sink.send(HostMessage::Source { path }).await?;
            }
            RuntimeEvent::ConfigGet { key } => {
                let value = match self.store.get(&key) {
                    Some(v) => serde_json::to_value(v)?,
                    None => serde_json::Value::Null,
                };
                self.sink.send(HostMessage::ConfigValue { key, value }).await?;
            }
            RuntimeEvent::ConfigSet { key, value } => self.config_set(key, value).await?,
            RuntimeEvent::MalformedCommand { message } => {
                self.sink.send(HostMessage::Error { message }).await?;
            }
            RuntimeEvent::StopRequested => self.rebuild.stop().await,
            RuntimeEvent::ShutdownRequested => return Ok(false),
        }
        Ok(true)
    }

    async fn compile_requested(&mut self, file: PathBuf, component_args: ComponentArgs) -> Result<()> {
        info!(?file, "compile requested");
        let request = BundleRequest::new(
            file,
            self.config.plugins.destination.clone(),
            component_args,
        );

        self.gate.on_compile_started();
        let outcome = self.rebuild.start(request).await;
        self.settle(outcome).await
    }

    async fn module_event(&mut self, generation: u64, event: FsEvent) -> Result<()> {
        if !self.rebuild.accepts(generation, &event) {
            return Ok(());
        }

        info!(path = ?event.path, "module changed");
        self.gate.on_compile_started();
        if let Some(outcome) = self.rebuild.rebuild().await {
            self.settle(outcome).await?;
        }
        Ok(())
    }

    /// Report a finished compile attempt to the gate and the host.
    async fn settle(&mut self, outcome: CompileOutcome) -> Result<()> {
        match outcome {
            CompileOutcome::Succeeded {
                graph,
                component_args,
            } => {
                self.sink
                    .send(HostMessage::Compiled {
                        modules: graph.modules().to_vec(),
                    })
                    .await?;
                if let Some(delivery) = self.gate.on_compile_succeeded(component_args) {
                    self.deliver(delivery).await?;
                }
            }
            CompileOutcome::Failed(error) => {
                self.sink.send(HostMessage::CompileFailed { error }).await?;
            }
        }
        Ok(())
    }

    async fn deliver(&mut self, delivery: Delivery) -> Result<()> {
        info!(viewer = delivery.viewer, "delivering components to viewer");
        self.sink
            .send(HostMessage::UpdateComponents {
                viewer: delivery.viewer,
                component_args: delivery.payload,
            })
            .await
    }

    async fn send_repos(&mut self) -> Result<()> {
        let root = &self.config.plugins.source;
        match scan_source(self.fs.as_ref(), root) {
            Ok(repos) => self.sink.send(HostMessage::ReposUpdated { repos }).await,
            Err(err) => {
                warn!(?root, error = %err, "failed to scan source catalog");
                let message = format!("failed to scan {}: {err}", root.display());
                self.sink.send(HostMessage::Error { message }).await
            }
        }
    }

    async fn ensure_catalog_watch(&mut self) {
        if self.catalog_watch.is_some() {
            return;
        }
        let spec = catalog_watch_spec(
            &self.config.plugins.source,
            self.rebuild.options().debounce,
        );
        match self.watcher.open(spec, self.event_tx.clone()).await {
            Ok(handle) => self.catalog_watch = Some(handle),
            Err(err) => warn!(error = %err, "failed to watch source catalog"),
        }
    }

    async fn config_set(&mut self, key: String, value: serde_json::Value) -> Result<()> {
        if let Err(err) = self.try_config_set(&key, value).await {
            warn!(key = %key, error = %err, "config update rejected");
            self.sink
                .send(HostMessage::Error {
                    message: format!("config_set {key}: {err}"),
                })
                .await?;
            return Ok(());
        }

        let value = match self.store.get(&key) {
            Some(v) => serde_json::to_value(v)?,
            None => serde_json::Value::Null,
        };
        self.sink.send(HostMessage::ConfigValue { key, value }).await
    }

    /// Apply `value` at `key`, but only persist it if the resulting config
    /// is still valid.
    async fn try_config_set(&mut self, key: &str, value: serde_json::Value) -> Result<()> {
        let mut candidate = self.store.clone();
        candidate.set(key, json_to_toml(value)?)?;
        let config = candidate.to_config()?;
        let options = LoopOptions::from_config(&config)?;
        candidate.save()?;

        if config.plugins.source != self.config.plugins.source {
            if let Some(handle) = self.catalog_watch.take() {
                handle.close().await;
            }
        }

        self.store = candidate;
        self.config = config;
        self.rebuild.set_options(options);
        info!(key, "config updated");
        Ok(())
    }

    async fn shutdown(&mut self) {
        self.rebuild.stop().await;
        if let Some(handle) = self.catalog_watch.take() {
            handle.close().await;
        }
    }
}
