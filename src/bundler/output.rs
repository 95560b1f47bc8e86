// src/bundler/output.rs

//! Parsing of the bundler command's output.
//!
//! On success the command prints its module list on stdout, either as a JSON
//! array, as `{"modules": [...]}`, or as one path per line. On failure it
//! may print a JSON error object (the usual bundler error shape with `code`,
//! `message`, `stack` and `id` / `filename` / `loc.file`); anything else is
//! turned into a best-effort [`CompileError`] from stderr.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use super::CompileError;
use crate::types::DependencyGraph;

/// `path/to/file.ext:12` or `path/to/file.ext:12:3`, as printed in stack
/// traces and diagnostics.
static LOCATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?P<file>(?:[A-Za-z]:)?[^\s:()'\x22]+\.[A-Za-z0-9]+):\d+(?::\d+)?")
        .expect("location regex is valid")
});

/// Parse the module list printed by a successful bundler run.
///
/// Relative paths are resolved against `base`.
pub fn parse_module_list(stdout: &str, base: &Path) -> Result<DependencyGraph, CompileError> {
    let trimmed = stdout.trim();

    let modules: Vec<PathBuf> = if trimmed.starts_with('[') {
        serde_json::from_str(trimmed).map_err(|e| bad_output(e.to_string()))?
    } else if trimmed.starts_with('{') {
        let value: Value = serde_json::from_str(trimmed).map_err(|e| bad_output(e.to_string()))?;
        let list = value
            .get("modules")
            .cloned()
            .ok_or_else(|| bad_output("missing \"modules\" field".to_string()))?;
        serde_json::from_value(list).map_err(|e| bad_output(e.to_string()))?
    } else {
        trimmed
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(PathBuf::from)
            .collect()
    };

    Ok(modules
        .into_iter()
        .map(|m| if m.is_relative() { base.join(m) } else { m })
        .collect())
}

fn bad_output(detail: String) -> CompileError {
    CompileError::new(
        "BAD_OUTPUT",
        format!("could not read module list from bundler output: {detail}"),
    )
}

/// Build a [`CompileError`] for a bundler run that exited unsuccessfully.
///
/// A relative offending file is resolved against `base`, the directory the
/// bundler ran in.
pub fn parse_failure(exit_code: Option<i32>, stdout: &str, stderr: &str, base: &Path) -> CompileError {
    let mut err = last_json_error(stderr)
        .or_else(|| last_json_error(stdout))
        .unwrap_or_else(|| text_failure(exit_code, stderr));

    if let Some(file) = err.offending_file.take() {
        err.offending_file = Some(if file.is_relative() { base.join(file) } else { file });
    }
    err
}

fn text_failure(exit_code: Option<i32>, stderr: &str) -> CompileError {
    let code = match exit_code {
        Some(c) => format!("EXIT_{c}"),
        None => "KILLED".to_string(),
    };
    let message = stderr
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| match exit_code {
            Some(c) => format!("bundler exited with status {c}"),
            None => "bundler was terminated by a signal".to_string(),
        });

    let mut err = CompileError::new(code, message);
    if !stderr.trim().is_empty() {
        err = err.with_stack(stderr.trim_end());
    }
    if let Some(file) = first_location(stderr) {
        err = err.with_offending_file(file);
    }
    err
}

fn last_json_error(text: &str) -> Option<CompileError> {
    text.lines()
        .rev()
        .map(str::trim)
        .filter(|l| l.starts_with('{'))
        .find_map(|l| match serde_json::from_str::<Value>(l) {
            Ok(Value::Object(obj)) => error_from_object(&obj),
            _ => None,
        })
}

fn error_from_object(obj: &Map<String, Value>) -> Option<CompileError> {
    let message = obj.get("message")?.as_str()?;
    let code = obj
        .get("code")
        .and_then(Value::as_str)
        .unwrap_or("COMPILE_ERROR");

    let mut err = CompileError::new(code, message);
    if let Some(stack) = obj.get("stack").and_then(Value::as_str) {
        err = err.with_stack(stack);
    }

    let file = ["filename", "id", "file"]
        .iter()
        .find_map(|k| obj.get(*k).and_then(Value::as_str))
        .or_else(|| obj.get("loc")?.get("file")?.as_str());
    if let Some(file) = file {
        err = err.with_offending_file(file);
    }

    Some(err)
}

fn first_location(text: &str) -> Option<PathBuf> {
    LOCATION_RE
        .captures(text)
        .and_then(|c| c.name("file"))
        .map(|m| PathBuf::from(m.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_list_accepts_json_array_and_resolves_relative_paths() {
        let graph = parse_module_list(r#"["/abs/a.js", "b.js"]"#, Path::new("/base")).unwrap();
        assert_eq!(
            graph.modules(),
            &[PathBuf::from("/abs/a.js"), PathBuf::from("/base/b.js")]
        );
    }

    #[test]
    fn module_list_accepts_object_and_lines() {
        let graph = parse_module_list(r#"{"modules": ["/x.js"]}"#, Path::new("/")).unwrap();
        assert_eq!(graph.modules(), &[PathBuf::from("/x.js")]);

        let graph = parse_module_list("/a.js\n\n  /b.js  \n", Path::new("/")).unwrap();
        assert_eq!(graph.len(), 2);
    }

    #[test]
    fn module_list_rejects_malformed_json() {
        let err = parse_module_list("[\"/a.js\"", Path::new("/")).unwrap_err();
        assert_eq!(err.code, "BAD_OUTPUT");
    }

    #[test]
    fn failure_prefers_json_error_object() {
        let stderr = "some noise\n{\"code\":\"PARSE_ERROR\",\"message\":\"Unexpected token\",\"id\":\"/src/doc.js\",\"stack\":\"at x\"}\n";
        let err = parse_failure(Some(1), "", stderr, Path::new("/base"));
        assert_eq!(err.code, "PARSE_ERROR");
        assert_eq!(err.message, "Unexpected token");
        assert_eq!(err.stack.as_deref(), Some("at x"));
        assert_eq!(err.offending_file, Some(PathBuf::from("/src/doc.js")));
    }

    #[test]
    fn failure_reads_nested_loc_file() {
        let stdout = r#"{"message":"boom","loc":{"file":"/src/part.svelte","line":3}}"#;
        let err = parse_failure(Some(2), stdout, "", Path::new("/base"));
        assert_eq!(err.code, "COMPILE_ERROR");
        assert_eq!(err.offending_file, Some(PathBuf::from("/src/part.svelte")));
    }

    #[test]
    fn failure_falls_back_to_stderr_text() {
        let stderr = "\nError: cannot resolve './missing'\n    at /src/doc/index.js:4:12\n";
        let err = parse_failure(Some(1), "", stderr, Path::new("/base"));
        assert_eq!(err.code, "EXIT_1");
        assert_eq!(err.message, "Error: cannot resolve './missing'");
        assert_eq!(err.offending_file, Some(PathBuf::from("/src/doc/index.js")));
        assert!(err.stack.unwrap().contains("index.js:4:12"));
    }

    #[test]
    fn failure_without_output_mentions_status() {
        let err = parse_failure(None, "", "", Path::new("/base"));
        assert_eq!(err.code, "KILLED");
        assert!(err.stack.is_none());
        assert!(err.offending_file.is_none());
    }

    #[test]
    fn relative_offending_file_is_resolved_against_the_run_dir() {
        let err = parse_failure(Some(1), "", "    at broken.js:1:1\n", Path::new("/src/doc"));
        assert_eq!(err.offending_file, Some(PathBuf::from("/src/doc/broken.js")));

        let stderr = r#"{"message":"boom","id":"parts/a.js"}"#;
        let err = parse_failure(Some(1), "", stderr, Path::new("/src/doc"));
        assert_eq!(err.offending_file, Some(PathBuf::from("/src/doc/parts/a.js")));
    }
}
