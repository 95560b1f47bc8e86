// src/host/protocol.rs

//! Newline-delimited JSON protocol spoken with the host shell.
//!
//! Commands arrive on stdin tagged by `cmd`, messages leave on stdout tagged
//! by `event`:
//!
//! ```text
//! > {"cmd":"viewer_ready","viewer":1}
//! > {"cmd":"compile","file":"zeugnis/halbjahr.html","component_args":{"id":3}}
//! < {"event":"compiled","modules":["/src/zeugnis/halbjahr.html", ...]}
//! < {"event":"update_components","viewer":1,"component_args":{"id":3}}
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::bundler::CompileError;
use crate::engine::RuntimeEvent;
use crate::types::{ComponentArgs, ViewerId};
use crate::watch::Catalog;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum HostCommand {
    Compile {
        file: PathBuf,
        #[serde(default)]
        component_args: ComponentArgs,
    },
    ViewerReady {
        viewer: ViewerId,
    },
    Repos,
    Source,
    ConfigGet {
        key: String,
    },
    ConfigSet {
        key: String,
        value: serde_json::Value,
    },
    Stop,
    Shutdown,
}

impl HostCommand {
    /// Parse one protocol line.
    pub fn parse(line: &str) -> serde_json::Result<Self> {
        serde_json::from_str(line)
    }
}

impl From<HostCommand> for RuntimeEvent {
    fn from(cmd: HostCommand) -> Self {
        match cmd {
            HostCommand::Compile {
                file,
                component_args,
            } => RuntimeEvent::CompileRequested {
                file,
                component_args,
            },
            HostCommand::ViewerReady { viewer } => RuntimeEvent::ViewerAttached { viewer },
            HostCommand::Repos => RuntimeEvent::ReposRequested,
            HostCommand::Source => RuntimeEvent::SourceRequested,
            HostCommand::ConfigGet { key } => RuntimeEvent::ConfigGet { key },
            HostCommand::ConfigSet { key, value } => RuntimeEvent::ConfigSet { key, value },
            HostCommand::Stop => RuntimeEvent::StopRequested,
            HostCommand::Shutdown => RuntimeEvent::ShutdownRequested,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HostMessage {
    /// Push compiled content to one viewer.
    UpdateComponents {
        viewer: ViewerId,
        component_args: ComponentArgs,
    },
    /// A compile attempt succeeded.
    Compiled { modules: Vec<PathBuf> },
    /// A compile attempt failed; the error is passed through unmodified.
    CompileFailed { error: CompileError },
    ReposUpdated { repos: Catalog },
    Source { path: PathBuf },
    ConfigValue {
        key: String,
        value: serde_json::Value,
    },
    Error { message: String },
}

impl HostMessage {
    /// One protocol line, without the trailing newline.
    ///
    /// Fails for paths that are not valid UTF-8.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Like [`to_json`](Self::to_json), but a message that cannot be encoded
    /// becomes an `error` message describing why.
    pub fn to_line(&self) -> serde_json::Result<String> {
        match self.to_json() {
            Ok(line) => Ok(line),
            Err(err) => {
                warn!(error = %err, message = ?self, "could not encode host message");
                HostMessage::Error {
                    message: format!("could not encode host message: {err}"),
                }
                .to_json()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_commands() {
        let cmd = HostCommand::parse(r#"{"cmd":"compile","file":"a/b.html","component_args":{"x":1}}"#)
            .unwrap();
        assert_eq!(
            cmd,
            HostCommand::Compile {
                file: PathBuf::from("a/b.html"),
                component_args: json!({"x": 1}),
            }
        );
        assert_eq!(
            HostCommand::parse(r#"{"cmd":"viewer_ready","viewer":4}"#).unwrap(),
            HostCommand::ViewerReady { viewer: 4 }
        );
        assert_eq!(HostCommand::parse(r#"{"cmd":"repos"}"#).unwrap(), HostCommand::Repos);
        assert!(HostCommand::parse(r#"{"cmd":"fly"}"#).is_err());
    }

    #[test]
    fn compile_without_args_defaults_to_null() {
        let cmd = HostCommand::parse(r#"{"cmd":"compile","file":"a.html"}"#).unwrap();
        assert!(matches!(cmd, HostCommand::Compile { component_args, .. } if component_args.is_null()));
    }

    #[test]
    fn compile_failure_is_wrapped_in_envelope() {
        let msg = HostMessage::CompileFailed {
            error: CompileError::new("PARSE_ERROR", "bad").with_offending_file("/src/a.js"),
        };
        let value: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(value["event"], "compile_failed");
        assert_eq!(value["error"]["code"], "PARSE_ERROR");
        assert_eq!(value["error"]["offending_file"], "/src/a.js");
    }

    #[test]
    #[cfg(unix)]
    fn unencodable_message_becomes_error_line() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let msg = HostMessage::Compiled {
            modules: vec![PathBuf::from(OsStr::from_bytes(b"/src/caf\xe9.js"))],
        };
        assert!(msg.to_json().is_err());

        let value: serde_json::Value = serde_json::from_str(&msg.to_line().unwrap()).unwrap();
        assert_eq!(value["event"], "error");
        assert!(value["message"]
            .as_str()
            .is_some_and(|m| m.starts_with("could not encode host message")));
    }
}
