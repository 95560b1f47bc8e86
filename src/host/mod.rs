// src/host/mod.rs

//! Boundary to the host shell.
//!
//! - [`protocol`] defines the JSON commands and messages.
//! - [`HostSink`] is where the runtime sends messages; production writes
//!   them to stdout, tests record them.
//! - [`spawn_command_reader`] turns stdin lines into runtime events.

pub mod protocol;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, Stdout};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::engine::RuntimeEvent;
use crate::errors::Result;
use crate::types::BoxFuture;

pub use protocol::{HostCommand, HostMessage};

/// Trait abstracting where host messages go.
pub trait HostSink: Send {
    fn send(&mut self, message: HostMessage) -> BoxFuture<'_, Result<()>>;
}

/// Writes one JSON message per line to stdout.
pub struct StdoutSink {
    out: Stdout,
}

impl StdoutSink {
    pub fn new() -> Self {
        Self {
            out: tokio::io::stdout(),
        }
    }
}

impl Default for StdoutSink {
    fn default() -> Self {
        Self::new()
    }
}

impl HostSink for StdoutSink {
    fn send(&mut self, message: HostMessage) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let mut line = message.to_line()?;
            line.push('\n');
            self.out.write_all(line.as_bytes()).await?;
            self.out.flush().await?;
            Ok(())
        })
    }
}

/// Read commands line by line from `input` and forward them to the runtime.
///
/// Malformed lines become `RuntimeEvent::MalformedCommand`; end of input
/// requests shutdown.
pub fn spawn_command_reader<R>(input: R, runtime_tx: mpsc::Sender<RuntimeEvent>) -> JoinHandle<()>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = input.lines();
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => {
                    info!("host input closed; requesting shutdown");
                    break;
                }
                Err(err) => {
                    warn!(error = %err, "failed to read host input; requesting shutdown");
                    break;
                }
            };

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            match HostCommand::parse(trimmed) {
                Ok(cmd) => {
                    debug!(?cmd, "host command");
                    if runtime_tx.send(cmd.into()).await.is_err() {
                        return;
                    }
                }
                Err(err) => {
                    warn!(error = %err, line = %trimmed, "malformed host command");
                    let event = RuntimeEvent::MalformedCommand {
                        message: format!("malformed command: {err}"),
                    };
                    if runtime_tx.send(event).await.is_err() {
                        return;
                    }
                }
            }
        }
        let _ = runtime_tx.send(RuntimeEvent::ShutdownRequested).await;
    })
}
