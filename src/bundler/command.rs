// src/bundler/command.rs

//! Bundler backed by an external command (rollup, esbuild, a wrapper
//! script, ...).

use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, info, warn};

use super::output::{parse_failure, parse_module_list};
use super::{Bundler, CompileError};
use crate::types::{BoxFuture, DependencyGraph};

/// Runs `cmd` through the platform shell for every compile.
///
/// `{source}` and `{dest}` in the command are replaced with the quoted entry
/// file and output directory; the same values are exported as
/// `BUNDLEWATCH_SOURCE` and `BUNDLEWATCH_DEST`.
#[derive(Debug, Clone)]
pub struct CommandBundler {
    cmd: String,
}

impl CommandBundler {
    pub fn new(cmd: impl Into<String>) -> Self {
        Self { cmd: cmd.into() }
    }

    /// The command line that will be run for the given paths.
    pub fn render(&self, source_entry: &Path, destination_dir: &Path) -> String {
        self.cmd
            .replace("{source}", &shell_quote(&source_entry.to_string_lossy()))
            .replace("{dest}", &shell_quote(&destination_dir.to_string_lossy()))
    }

    async fn run(
        &self,
        source_entry: &Path,
        destination_dir: &Path,
    ) -> Result<DependencyGraph, CompileError> {
        let line = self.render(source_entry, destination_dir);
        info!(source = ?source_entry, dest = ?destination_dir, cmd = %line, "starting bundler");

        // Build a shell command appropriate for the platform.
        let mut cmd = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(&line);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(&line);
            c
        };

        if let Some(dir) = source_entry.parent() {
            if dir.is_dir() {
                cmd.current_dir(dir);
            }
        }

        cmd.env("BUNDLEWATCH_SOURCE", source_entry)
            .env("BUNDLEWATCH_DEST", destination_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = cmd.output().await.map_err(|e| {
            warn!(error = %e, "failed to spawn bundler");
            CompileError::new("SPAWN_FAILED", format!("failed to run bundler: {e}"))
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        for l in stderr.lines() {
            debug!("bundler stderr: {}", l);
        }

        let base = source_entry.parent().unwrap_or_else(|| Path::new("."));

        if !output.status.success() {
            let err = parse_failure(output.status.code(), &stdout, &stderr, base);
            info!(code = %err.code, "bundler failed");
            return Err(err);
        }

        let graph = parse_module_list(&stdout, base)?;
        info!(modules = graph.len(), "bundler finished");
        Ok(graph)
    }
}

impl Bundler for CommandBundler {
    fn compile<'a>(
        &'a mut self,
        source_entry: &'a Path,
        destination_dir: &'a Path,
    ) -> BoxFuture<'a, Result<DependencyGraph, CompileError>> {
        Box::pin(self.run(source_entry, destination_dir))
    }
}

/// Quote a value for the shell used by [`CommandBundler`].
fn shell_quote(value: &str) -> String {
    if cfg!(windows) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        format!("'{}'", value.replace('\'', r"'\''"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(unix)]
    fn render_quotes_placeholders() {
        let bundler = CommandBundler::new("rollup -i {source} -d {dest}");
        let line = bundler.render(Path::new("/src/it's.js"), Path::new("/out dir"));
        assert_eq!(line, r"rollup -i '/src/it'\''s.js' -d '/out dir'");
    }
}
