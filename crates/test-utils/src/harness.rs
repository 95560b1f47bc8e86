//! A runtime wired to fakes, running on its own task.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use bundlewatch::engine::{Runtime, RuntimeEvent, RuntimeParts};
use bundlewatch::errors::Result;
use bundlewatch::fs::mock::MockFileSystem;
use bundlewatch::host::HostMessage;

use crate::builders::ConfigBuilder;
use crate::fakes::{FakeBundler, FakeWatcher, RecordingSink};

pub struct RuntimeHarness {
    pub tx: mpsc::Sender<RuntimeEvent>,
    pub messages: mpsc::UnboundedReceiver<HostMessage>,
    pub bundler: FakeBundler,
    pub watcher: FakeWatcher,
    pub sink: RecordingSink,
    pub fs: MockFileSystem,
    task: JoinHandle<Result<()>>,
}

impl RuntimeHarness {
    /// Start a runtime over `config`, an empty in-memory filesystem, and
    /// fresh fakes.
    pub fn start(config: ConfigBuilder) -> Self {
        Self::start_with_fs(config, MockFileSystem::new())
    }

    pub fn start_with_fs(config: ConfigBuilder, fs: MockFileSystem) -> Self {
        let bundler = FakeBundler::new();
        let watcher = FakeWatcher::new();
        let (sink, messages) = RecordingSink::new();
        let (tx, rx) = mpsc::channel(64);

        let store = config.build_store(Arc::new(fs.clone()));
        let runtime = Runtime::new(RuntimeParts {
            store,
            bundler: bundler.clone(),
            watcher: Arc::new(watcher.clone()),
            sink: sink.clone(),
            fs: Arc::new(fs.clone()),
            event_tx: tx.clone(),
            event_rx: rx,
        })
        .expect("harness config must be valid");

        let task = tokio::spawn(runtime.run());

        Self {
            tx,
            messages,
            bundler,
            watcher,
            sink,
            fs,
            task,
        }
    }

    pub async fn send(&self, event: RuntimeEvent) {
        self.tx
            .send(event)
            .await
            .expect("runtime stopped before the event was sent");
    }

    pub async fn compile(&self, file: impl Into<PathBuf>, component_args: serde_json::Value) {
        self.send(RuntimeEvent::CompileRequested {
            file: file.into(),
            component_args,
        })
        .await;
    }

    /// Next message the runtime sent to the host; panics after 2 seconds.
    pub async fn next_message(&mut self) -> HostMessage {
        tokio::time::timeout(Duration::from_secs(2), self.messages.recv())
            .await
            .expect("no host message within 2 seconds")
            .expect("runtime dropped the sink")
    }

    /// Wait until every event sent so far has been handled and return the
    /// messages sent in the meantime.
    ///
    /// Uses a `source` round trip as a barrier: the runtime handles events in
    /// order, so the `source` reply comes after everything queued before it.
    pub async fn drain(&mut self) -> Vec<HostMessage> {
        self.send(RuntimeEvent::SourceRequested).await;
        let mut seen = Vec::new();
        loop {
            match self.next_message().await {
                HostMessage::Source { .. } => return seen,
                other => seen.push(other),
            }
        }
    }

    /// Request shutdown and wait for the runtime to finish.
    pub async fn shutdown(self) -> Result<()> {
        // The runtime may already have stopped on its own.
        let _ = self.tx.send(RuntimeEvent::ShutdownRequested).await;
        tokio::time::timeout(Duration::from_secs(3), self.task)
            .await
            .expect("runtime did not finish within 3 seconds")
            .expect("runtime task panicked")
    }
}
