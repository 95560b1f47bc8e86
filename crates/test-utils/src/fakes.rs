//! Fake collaborators for the runtime and the rebuild loop.

use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;

use bundlewatch::bundler::{Bundler, CompileError};
use bundlewatch::engine::RuntimeEvent;
use bundlewatch::errors::{BundlewatchError, Result};
use bundlewatch::host::{HostMessage, HostSink};
use bundlewatch::types::{BoxFuture, DependencyGraph};
use bundlewatch::watch::{DirectoryWatcher, FsEvent, FsEventKind, WatchHandle, WatchSpec};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|p| p.into_inner())
}

type ScriptedResult = std::result::Result<Vec<PathBuf>, CompileError>;

#[derive(Default)]
struct BundlerState {
    script: VecDeque<ScriptedResult>,
    calls: Vec<PathBuf>,
}

/// A fake bundler that:
/// - records the entry path of every compile
/// - answers with scripted results, in order.
///
/// Running out of script is reported as a `NO_SCRIPT` compile error.
#[derive(Clone, Default)]
pub struct FakeBundler {
    state: Arc<Mutex<BundlerState>>,
}

impl FakeBundler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_success<I, P>(&self, modules: I)
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let modules = modules.into_iter().map(Into::into).collect();
        lock(&self.state).script.push_back(Ok(modules));
    }

    pub fn push_failure(&self, error: CompileError) {
        lock(&self.state).script.push_back(Err(error));
    }

    /// Entry paths compiled so far.
    pub fn calls(&self) -> Vec<PathBuf> {
        lock(&self.state).calls.clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.state).calls.len()
    }
}

impl Bundler for FakeBundler {
    fn compile<'a>(
        &'a mut self,
        source_entry: &'a Path,
        _destination_dir: &'a Path,
    ) -> BoxFuture<'a, std::result::Result<DependencyGraph, CompileError>> {
        Box::pin(async move {
            let next = {
                let mut state = lock(&self.state);
                state.calls.push(source_entry.to_path_buf());
                state.script.pop_front()
            };
            match next {
                Some(Ok(modules)) => Ok(DependencyGraph::new(modules)),
                Some(Err(err)) => Err(err),
                None => Err(CompileError::new("NO_SCRIPT", "fake bundler has no scripted result")),
            }
        })
    }
}

/// One entry of the watcher's operation log. The path is the watch's target
/// file, or its root for directory-wide watches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchOp {
    Opened(PathBuf),
    Closed(PathBuf),
}

struct LiveWatch {
    id: u64,
    spec: WatchSpec,
    tx: mpsc::Sender<RuntimeEvent>,
}

#[derive(Default)]
struct WatcherState {
    next_id: u64,
    log: Vec<WatchOp>,
    live: Vec<LiveWatch>,
    failing: HashSet<PathBuf>,
}

/// A fake directory watcher that:
/// - logs every open and close, in order
/// - refuses to open watches for paths marked with [`FakeWatcher::fail_for`]
/// - lets tests inject events into the live watches with [`FakeWatcher::emit`].
#[derive(Clone, Default)]
pub struct FakeWatcher {
    state: Arc<Mutex<WatcherState>>,
}

impl FakeWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make opening a watch for `path` (target or root) fail.
    pub fn fail_for(&self, path: impl Into<PathBuf>) {
        lock(&self.state).failing.insert(path.into());
    }

    pub fn log(&self) -> Vec<WatchOp> {
        lock(&self.state).log.clone()
    }

    pub fn clear_log(&self) {
        lock(&self.state).log.clear();
    }

    /// Targets (or roots) of the watches currently open.
    pub fn live(&self) -> Vec<PathBuf> {
        lock(&self.state)
            .live
            .iter()
            .map(|w| label(&w.spec))
            .collect()
    }

    /// Deliver an event for `path` through every live watch that would
    /// report it. Returns how many watches delivered it.
    pub async fn emit(&self, kind: FsEventKind, path: impl AsRef<Path>) -> usize {
        let path = path.as_ref();
        let targets: Vec<_> = lock(&self.state)
            .live
            .iter()
            .filter(|w| path.starts_with(&w.spec.root) && w.spec.filter.matches(path))
            .map(|w| (w.spec.tag, w.tx.clone()))
            .collect();

        let mut delivered = 0;
        for (tag, tx) in targets {
            let event = RuntimeEvent::Fs {
                tag,
                event: FsEvent::new(kind, path),
            };
            if tx.send(event).await.is_ok() {
                delivered += 1;
            }
        }
        delivered
    }
}

fn label(spec: &WatchSpec) -> PathBuf {
    spec.target.clone().unwrap_or_else(|| spec.root.clone())
}

impl DirectoryWatcher for FakeWatcher {
    fn open(
        &self,
        spec: WatchSpec,
        events: mpsc::Sender<RuntimeEvent>,
    ) -> BoxFuture<'_, Result<Box<dyn WatchHandle>>> {
        Box::pin(async move {
            let path = label(&spec);
            let mut state = lock(&self.state);
            if state.failing.contains(&path) || state.failing.contains(&spec.root) {
                return Err(BundlewatchError::WatchInit {
                    path,
                    message: "refused by fake watcher".into(),
                });
            }

            state.next_id += 1;
            let id = state.next_id;
            state.log.push(WatchOp::Opened(path.clone()));
            state.live.push(LiveWatch {
                id,
                spec,
                tx: events,
            });

            let handle: Box<dyn WatchHandle> = Box::new(FakeWatchHandle {
                id,
                path,
                state: Arc::clone(&self.state),
            });
            Ok(handle)
        })
    }
}

struct FakeWatchHandle {
    id: u64,
    path: PathBuf,
    state: Arc<Mutex<WatcherState>>,
}

impl WatchHandle for FakeWatchHandle {
    fn close(self: Box<Self>) -> BoxFuture<'static, ()> {
        Box::pin(async move {
            let mut state = lock(&self.state);
            state.live.retain(|w| w.id != self.id);
            state.log.push(WatchOp::Closed(self.path.clone()));
        })
    }
}

/// Host sink that records every message and forwards a copy to a channel,
/// so tests can await the next message.
///
/// After [`RecordingSink::disconnect`] every send fails, like a closed stdout.
#[derive(Clone)]
pub struct RecordingSink {
    messages: Arc<Mutex<Vec<HostMessage>>>,
    tx: mpsc::UnboundedSender<HostMessage>,
    disconnected: Arc<AtomicBool>,
}

impl RecordingSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<HostMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = Self {
            messages: Arc::new(Mutex::new(Vec::new())),
            tx,
            disconnected: Arc::new(AtomicBool::new(false)),
        };
        (sink, rx)
    }

    pub fn messages(&self) -> Vec<HostMessage> {
        lock(&self.messages).clone()
    }

    pub fn disconnect(&self) {
        self.disconnected.store(true, Ordering::SeqCst);
    }
}

impl HostSink for RecordingSink {
    fn send(&mut self, message: HostMessage) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            if self.disconnected.load(Ordering::SeqCst) {
                return Err(BundlewatchError::IoError(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    "host disconnected",
                )));
            }
            lock(&self.messages).push(message.clone());
            // The receiver may already be gone at the end of a test.
            let _ = self.tx.send(message);
            Ok(())
        })
    }
}
