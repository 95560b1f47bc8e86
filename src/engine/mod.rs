// src/engine/mod.rs

//! Orchestration engine for bundlewatch.
//!
//! This module ties together:
//! - the [`ReadinessGate`](gate::ReadinessGate) deciding when compiled
//!   content may be pushed to the viewer,
//! - the [`RebuildWatchLoop`](rebuild::RebuildWatchLoop) keeping module
//!   watches in sync with the last dependency graph,
//! - the main [`Runtime`] event loop that reacts to host commands,
//!   filesystem events and shutdown signals.
//!
//! All events go through one channel and are handled one at a time, which is
//! what orders gate transitions and watch-set replacement.

use std::path::PathBuf;

use crate::types::{ComponentArgs, ViewerId};
use crate::watch::{FsEvent, WatchTag};

pub mod gate;
pub mod rebuild;
pub mod runtime;

pub use gate::{Delivery, GateState, ReadinessGate};
pub use rebuild::{CompileOutcome, LoopOptions, RebuildWatchLoop};
pub use runtime::{Runtime, RuntimeParts};

/// Events flowing into the runtime from the host, watchers and signals.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// Compile `file` (relative to the source root) and keep it compiled.
    CompileRequested {
        file: PathBuf,
        component_args: ComponentArgs,
    },
    /// A viewer instance is attached and ready for content.
    ViewerAttached { viewer: ViewerId },
    /// A watcher reported a filesystem change.
    Fs { tag: WatchTag, event: FsEvent },
    /// Host asked for the source catalog.
    ReposRequested,
    /// Host asked for the configured source root.
    SourceRequested,
    ConfigGet { key: String },
    ConfigSet { key: String, value: serde_json::Value },
    /// A host command line could not be parsed.
    MalformedCommand { message: String },
    /// Stop watching modules of the current request.
    StopRequested,
    /// Graceful shutdown requested (Ctrl-C, host exit, stdin closed).
    ShutdownRequested,
}
