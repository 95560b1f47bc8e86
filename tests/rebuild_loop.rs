// tests/rebuild_loop.rs

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::mpsc;

use bundlewatch::bundler::CompileError;
use bundlewatch::engine::{CompileOutcome, LoopOptions, RebuildWatchLoop, RuntimeEvent};
use bundlewatch::fs::mock::MockFileSystem;
use bundlewatch::types::BundleRequest;
use bundlewatch::watch::{ExcludeFilter, FsEvent, FsEventKind};
use bundlewatch_test_utils::fakes::{FakeBundler, FakeWatcher, WatchOp};
use bundlewatch_test_utils::init_tracing;

struct Setup {
    rebuild: RebuildWatchLoop<FakeBundler>,
    bundler: FakeBundler,
    watcher: FakeWatcher,
    fs: MockFileSystem,
    _rx: mpsc::Receiver<RuntimeEvent>,
}

fn options() -> LoopOptions {
    LoopOptions {
        source_root: PathBuf::from("/src"),
        debounce: Duration::from_millis(10),
        exclude: ExcludeFilter::new(["**/node_modules/**"]).unwrap(),
        use_hash: false,
        rearm_on_failure: false,
    }
}

fn setup(options: LoopOptions) -> Setup {
    init_tracing();
    let bundler = FakeBundler::new();
    let watcher = FakeWatcher::new();
    let fs = MockFileSystem::new();
    let (tx, rx) = mpsc::channel(16);
    let rebuild = RebuildWatchLoop::new(
        bundler.clone(),
        Arc::new(watcher.clone()),
        tx,
        options,
        Arc::new(fs.clone()),
    );
    Setup {
        rebuild,
        bundler,
        watcher,
        fs,
        _rx: rx,
    }
}

fn request() -> BundleRequest {
    BundleRequest::new("doc/index.html", "/out", json!({"doc": 1}))
}

fn paths(items: &[&str]) -> Vec<PathBuf> {
    items.iter().map(PathBuf::from).collect()
}

fn changed(path: &str) -> FsEvent {
    FsEvent::new(FsEventKind::Changed, path)
}

#[tokio::test]
async fn start_compiles_entry_and_watches_every_module() {
    let mut s = setup(options());
    s.bundler.push_success(["/src/doc/index.html", "/src/doc/a.js"]);

    let outcome = s.rebuild.start(request()).await;

    assert!(matches!(outcome, CompileOutcome::Succeeded { .. }));
    assert_eq!(s.bundler.calls(), paths(&["/src/doc/index.html"]));
    assert_eq!(
        s.rebuild.watched_modules(),
        paths(&["/src/doc/index.html", "/src/doc/a.js"])
    );
    assert_eq!(s.watcher.live().len(), 2);
}

#[tokio::test]
async fn replacing_the_watch_set_closes_everything_before_opening() {
    let mut s = setup(options());
    s.bundler.push_success(["/src/a.js", "/src/b.js", "/src/c.js"]);
    s.rebuild.start(request()).await;
    let generation = s.rebuild.generation();
    s.watcher.clear_log();

    s.bundler.push_success(["/src/b.js", "/src/c.js", "/src/d.js"]);
    assert!(s.rebuild.accepts(generation, &changed("/src/a.js")));
    let outcome = s.rebuild.rebuild().await;
    assert!(matches!(outcome, Some(CompileOutcome::Succeeded { .. })));

    let log = s.watcher.log();
    assert_eq!(log.len(), 6);
    let (closes, opens) = log.split_at(3);
    assert!(closes.iter().all(|op| matches!(op, WatchOp::Closed(_))));
    assert!(opens.iter().all(|op| matches!(op, WatchOp::Opened(_))));

    let mut live = s.watcher.live();
    live.sort();
    assert_eq!(live, paths(&["/src/b.js", "/src/c.js", "/src/d.js"]));
    assert!(s.rebuild.generation() > generation);
}

#[tokio::test]
async fn duplicate_modules_get_one_watch() {
    let mut s = setup(options());
    s.bundler.push_success(["/src/a.js", "/src/a.js", "/src/b.js"]);
    s.rebuild.start(request()).await;
    assert_eq!(s.watcher.live().len(), 2);
}

#[tokio::test]
async fn excluded_modules_are_never_watched() {
    let mut s = setup(options());
    s.bundler.push_success([
        "/src/doc/index.html",
        "/src/node_modules/lit/index.js",
        "/src/doc/node_modules/x/y.js",
    ]);
    s.rebuild.start(request()).await;

    assert_eq!(s.rebuild.watched_modules(), paths(&["/src/doc/index.html"]));
    assert!(!s.rebuild.accepts(
        s.rebuild.generation(),
        &changed("/src/node_modules/lit/index.js")
    ));
}

#[tokio::test]
async fn events_for_unwatched_or_stale_paths_are_ignored() {
    let mut s = setup(options());
    s.bundler.push_success(["/src/a.js"]);
    s.rebuild.start(request()).await;
    let generation = s.rebuild.generation();

    assert!(!s.rebuild.accepts(generation, &changed("/src/other.js")));
    assert!(!s.rebuild.accepts(generation - 1, &changed("/src/a.js")));
    assert!(!s
        .rebuild
        .accepts(generation, &FsEvent::new(FsEventKind::Removed, "/src/a.js")));
    // A watched file appearing anew is not a content change.
    assert!(!s
        .rebuild
        .accepts(generation, &FsEvent::new(FsEventKind::Created, "/src/a.js")));
    assert!(s.rebuild.accepts(generation, &changed("/src/a.js")));
    assert_eq!(s.bundler.call_count(), 1);
}

#[tokio::test]
async fn failed_rebuild_keeps_the_previous_watch_set() {
    let mut s = setup(options());
    s.bundler.push_success(["/src/x.js", "/src/y.js"]);
    s.rebuild.start(request()).await;
    let generation = s.rebuild.generation();
    s.watcher.clear_log();

    s.bundler
        .push_failure(CompileError::new("SYNTAX", "unexpected token").with_offending_file("/src/y.js"));
    let outcome = s.rebuild.rebuild().await;

    assert!(matches!(outcome, Some(CompileOutcome::Failed(ref e)) if e.code == "SYNTAX"));
    assert!(s.watcher.log().is_empty(), "no handle created or closed");
    assert_eq!(s.rebuild.watched_modules(), paths(&["/src/x.js", "/src/y.js"]));
    assert_eq!(s.rebuild.generation(), generation);

    // The loop is still live: the next edit rebuilds again.
    s.bundler.push_success(["/src/x.js"]);
    assert!(s.rebuild.accepts(generation, &changed("/src/y.js")));
    assert!(matches!(
        s.rebuild.rebuild().await,
        Some(CompileOutcome::Succeeded { .. })
    ));
    assert_eq!(s.rebuild.watched_modules(), paths(&["/src/x.js"]));
}

#[tokio::test]
async fn failed_start_arms_nothing_by_default() {
    let mut s = setup(options());
    s.bundler.push_success(["/src/a.js"]);
    s.rebuild.start(request()).await;

    s.bundler.push_failure(CompileError::new("SYNTAX", "boom"));
    let outcome = s.rebuild.start(request()).await;

    assert!(matches!(outcome, CompileOutcome::Failed(_)));
    assert!(s.rebuild.watched_modules().is_empty());
    assert!(s.watcher.live().is_empty());
    assert_eq!(s.rebuild.request(), Some(&request()));
}

#[tokio::test]
async fn failed_start_can_rearm_entry_and_offending_file() {
    let mut s = setup(LoopOptions {
        rearm_on_failure: true,
        ..options()
    });
    s.bundler.push_failure(
        CompileError::new("SYNTAX", "boom").with_offending_file("/src/doc/broken.js"),
    );
    s.rebuild.start(request()).await;

    assert_eq!(
        s.rebuild.watched_modules(),
        paths(&["/src/doc/index.html", "/src/doc/broken.js"])
    );
}

#[tokio::test]
async fn module_that_cannot_be_watched_is_skipped() {
    let mut s = setup(options());
    s.watcher.fail_for("/src/b.js");
    s.bundler.push_success(["/src/a.js", "/src/b.js", "/src/c.js"]);

    let outcome = s.rebuild.start(request()).await;

    assert!(matches!(outcome, CompileOutcome::Succeeded { .. }));
    assert_eq!(s.rebuild.watched_modules(), paths(&["/src/a.js", "/src/c.js"]));
}

#[tokio::test]
async fn stop_closes_all_watches_and_forgets_the_request() {
    let mut s = setup(options());
    s.bundler.push_success(["/src/a.js", "/src/b.js"]);
    s.rebuild.start(request()).await;

    s.rebuild.stop().await;

    assert!(s.watcher.live().is_empty());
    assert!(s.rebuild.request().is_none());
    assert!(s.rebuild.rebuild().await.is_none());
}

#[tokio::test]
async fn unchanged_content_is_skipped_with_use_hash() {
    let mut s = setup(LoopOptions {
        use_hash: true,
        ..options()
    });
    s.fs.add_file("/src/a.js", "export const a = 1;");
    s.bundler.push_success(["/src/a.js"]);
    s.rebuild.start(request()).await;
    let generation = s.rebuild.generation();

    assert!(!s.rebuild.accepts(generation, &changed("/src/a.js")));

    s.fs.add_file("/src/a.js", "export const a = 2;");
    assert!(s.rebuild.accepts(generation, &changed("/src/a.js")));
}
