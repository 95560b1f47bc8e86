// src/watch/watcher.rs

use std::path::{Path, PathBuf};

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::engine::RuntimeEvent;
use crate::errors::{BundlewatchError, Result};
use crate::types::BoxFuture;
use crate::watch::debounce::{Coalescer, EventClassifier};
use crate::watch::event::{FsEvent, PathFilter, WatchSpec};

/// Opens directory watches that report into the runtime event channel.
///
/// Production code uses [`NotifyWatcher`]; tests can provide an
/// implementation that records opens/closes and injects events by hand.
pub trait DirectoryWatcher: Send + Sync {
    fn open(
        &self,
        spec: WatchSpec,
        events: mpsc::Sender<RuntimeEvent>,
    ) -> BoxFuture<'_, Result<Box<dyn WatchHandle>>>;
}

/// A live watch. Dropping it also stops watching, but only [`close`]
/// guarantees that no further events are sent once it resolves.
///
/// [`close`]: WatchHandle::close
pub trait WatchHandle: Send {
    fn close(self: Box<Self>) -> BoxFuture<'static, ()>;
}

/// [`DirectoryWatcher`] backed by the platform's `notify` watcher.
#[derive(Debug, Clone, Default)]
pub struct NotifyWatcher;

impl NotifyWatcher {
    pub fn new() -> Self {
        Self
    }
}

impl DirectoryWatcher for NotifyWatcher {
    fn open(
        &self,
        spec: WatchSpec,
        events: mpsc::Sender<RuntimeEvent>,
    ) -> BoxFuture<'_, Result<Box<dyn WatchHandle>>> {
        Box::pin(async move {
            let handle = spawn_notify_watch(spec, events)?;
            Ok(Box::new(handle) as Box<dyn WatchHandle>)
        })
    }
}

/// Handle for one `notify` watch plus its forwarding task.
pub struct NotifyWatchHandle {
    root: PathBuf,
    watcher: Option<RecommendedWatcher>,
    task: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for NotifyWatchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifyWatchHandle")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl WatchHandle for NotifyWatchHandle {
    fn close(mut self: Box<Self>) -> BoxFuture<'static, ()> {
        // Stop the OS watch first so the callback stops feeding the task.
        drop(self.watcher.take());
        let task = self.task.take();
        let root = self.root.clone();
        Box::pin(async move {
            if let Some(task) = task {
                task.abort();
                let _ = task.await;
            }
            debug!(?root, "watch closed");
        })
    }
}

impl Drop for NotifyWatchHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Start a `notify` watch for `spec` and a task that classifies, filters
/// and debounces its events before sending them as `RuntimeEvent::Fs`.
pub fn spawn_notify_watch(
    spec: WatchSpec,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
) -> Result<NotifyWatchHandle> {
    let WatchSpec {
        root,
        target,
        recursive,
        filter,
        debounce,
        tag,
    } = spec;

    // Channel from the blocking notify callback into the async world.
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                // Receiver gone means the handle is closing.
                let _ = event_tx.send(event);
            }
            Err(err) => warn!(error = %err, "file watch error"),
        },
        Config::default(),
    )
    .map_err(|e| watch_init_error(&root, e))?;

    let mode = if recursive {
        RecursiveMode::Recursive
    } else {
        RecursiveMode::NonRecursive
    };
    watcher
        .watch(&root, mode)
        .map_err(|e| watch_init_error(&root, e))?;

    let existing = existing_entries(&root, recursive)
        .into_iter()
        .filter(|p| filter.matches(p));
    let mut classifier = EventClassifier::new(existing);

    info!(?root, ?target, recursive, ?tag, "watch started");

    let task_root = root.clone();
    let task = tokio::spawn(async move {
        let mut coalescer = Coalescer::new();

        'outer: while let Some(first) = event_rx.recv().await {
            absorb(&first, &filter, &mut classifier, &mut coalescer);

            // Coalesce whatever else arrives within the window.
            let deadline = Instant::now() + debounce;
            let mut closed = false;
            loop {
                match tokio::time::timeout_at(deadline, event_rx.recv()).await {
                    Ok(Some(event)) => absorb(&event, &filter, &mut classifier, &mut coalescer),
                    Ok(None) => {
                        closed = true;
                        break;
                    }
                    Err(_elapsed) => break,
                }
            }

            for event in coalescer.drain() {
                debug!(?tag, kind = ?event.kind, path = ?event.path, "forwarding fs event");
                if runtime_tx.send(RuntimeEvent::Fs { tag, event }).await.is_err() {
                    // Runtime is gone; nothing left to report to.
                    break 'outer;
                }
            }

            if closed {
                break;
            }
        }
        debug!(root = ?task_root, "watch event loop finished");
    });

    Ok(NotifyWatchHandle {
        root,
        watcher: Some(watcher),
        task: Some(task),
    })
}

fn absorb(
    event: &Event,
    filter: &PathFilter,
    classifier: &mut EventClassifier,
    coalescer: &mut Coalescer,
) {
    for path in event.paths.iter() {
        if !filter.matches(path) {
            continue;
        }
        if let Some(kind) = classifier.classify(&event.kind, path) {
            coalescer.push(FsEvent::new(kind, path.clone()));
        }
    }
}

fn watch_init_error(root: &Path, err: notify::Error) -> BundlewatchError {
    BundlewatchError::WatchInit {
        path: root.to_path_buf(),
        message: err.to_string(),
    }
}

/// Paths that exist below `root` when the watch opens.
fn existing_entries(root: &Path, recursive: bool) -> Vec<PathBuf> {
    let mut out = Vec::new();
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) => {
                warn!(?dir, error = %err, "could not list directory");
                continue;
            }
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if recursive && path.is_dir() {
                stack.push(path.clone());
            }
            out.push(path);
        }
    }

    out
}

