// src/bundler/mod.rs

//! Document bundler abstraction.
//!
//! The runtime talks to a [`Bundler`] instead of spawning the bundler
//! itself, so tests can script compile results while production uses
//! [`CommandBundler`], which runs the configured bundler command.

pub mod command;
pub mod output;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{BoxFuture, DependencyGraph};

pub use command::CommandBundler;

/// Structured compile failure, forwarded to the host as data.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct CompileError {
    pub code: String,
    pub message: String,
    #[serde(default)]
    pub stack: Option<String>,
    /// Absolute path of the file the error points at, when known.
    #[serde(default)]
    pub offending_file: Option<PathBuf>,
}

impl CompileError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            stack: None,
            offending_file: None,
        }
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    pub fn with_offending_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.offending_file = Some(file.into());
        self
    }
}

/// Trait abstracting how a document is compiled.
pub trait Bundler: Send {
    /// Compile `source_entry` into `destination_dir` and return the modules
    /// that went into the bundle.
    fn compile<'a>(
        &'a mut self,
        source_entry: &'a Path,
        destination_dir: &'a Path,
    ) -> BoxFuture<'a, Result<DependencyGraph, CompileError>>;
}
