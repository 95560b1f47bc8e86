// src/watch/mod.rs

//! File watching.
//!
//! This module is responsible for:
//! - the [`DirectoryWatcher`] / [`WatchHandle`] seam and its `notify`
//!   implementation,
//! - classifying and debouncing raw filesystem events,
//! - the exclude filter for vendored modules and optional content hashing,
//! - scanning and watching the source catalog.
//!
//! It does **not** know about bundles or viewers; the engine decides what an
//! event means.

pub mod catalog;
pub mod debounce;
pub mod event;
pub mod exclude;
pub mod hash;
pub mod path_utils;
pub mod watcher;

pub use catalog::{catalog_watch_spec, scan_source, Catalog};
pub use event::{FsEvent, FsEventKind, PathFilter, WatchSpec, WatchTag};
pub use exclude::ExcludeFilter;
pub use hash::ContentHashes;
pub use watcher::{spawn_notify_watch, DirectoryWatcher, NotifyWatcher, WatchHandle};
