//! Stdout reading for subprocess transport

use std::time::Duration;

use futures::StreamExt;
use log::{debug, warn};
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};

use crate::error::{AgentError, Result};

use super::config::READ_CHANNEL_CAPACITY;
use super::transport::SubprocessTransport;

/// How long the reader waits for the process to report its exit status after EOF
const EXIT_STATUS_WAIT: Duration = Duration::from_secs(1);

impl SubprocessTransport {
    /// Spawn the stdout reader and hand back its receiver
    ///
    /// Lines are accumulated until they form one complete JSON document, so a
    /// document split across lines still arrives whole. Blank lines are
    /// skipped. Text that can never become JSON is logged and dropped together
    /// with whatever was buffered. Only framing faults end reading: a line or
    /// buffered document longer than the configured maximum, or an I/O error.
    /// A non-zero exit status observed after EOF is reported as an `Err` item.
    pub(super) fn read_messages_impl(
        &mut self,
    ) -> Result<mpsc::Receiver<Result<serde_json::Value>>> {
        let stdout = self
            .stdout
            .take()
            .ok_or_else(|| AgentError::connection("Not connected - stdout not available"))?;
        let process = std::sync::Arc::clone(&self.process);
        let max_buffer_size = self.max_buffer_size;
        let (tx, rx) = mpsc::channel(READ_CHANNEL_CAPACITY);

        let task = tokio::spawn(async move {
            let mut lines =
                FramedRead::new(stdout, LinesCodec::new_with_max_length(max_buffer_size));

            let mut json_buffer = String::new();

            while let Some(line) = lines.next().await {
                let item = match line {
                    Ok(line) => {
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        match accumulate(&mut json_buffer, line, max_buffer_size) {
                            Ok(Some(document)) => Ok(document),
                            Ok(None) => continue,
                            Err(e) => Err(e),
                        }
                    }
                    Err(LinesCodecError::MaxLineLengthExceeded) => {
                        Err(AgentError::transport(oversized(max_buffer_size)))
                    }
                    Err(LinesCodecError::Io(e)) => Err(AgentError::Io(e)),
                };

                let fatal = item.is_err();
                if tx.send(item).await.is_err() {
                    debug!("stdout receiver dropped, stopping reader");
                    return;
                }
                if fatal {
                    return;
                }
            }

            if !json_buffer.is_empty() {
                warn!(
                    "stdout closed with {} bytes of incomplete JSON, discarding",
                    json_buffer.len()
                );
            }

            let mut guard = process.lock().await;
            if let Some(child) = guard.as_mut() {
                match tokio::time::timeout(EXIT_STATUS_WAIT, child.wait()).await {
                    Ok(Ok(status)) if !status.success() => {
                        let code = status.code().unwrap_or(-1);
                        warn!("agent CLI exited with {status}");
                        let _ = tx
                            .send(Err(AgentError::process(
                                "Agent CLI exited with failure",
                                code,
                                None,
                            )))
                            .await;
                    }
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => {
                        let _ = tx.send(Err(AgentError::Io(e))).await;
                    }
                    Err(_) => debug!("agent CLI still running after stdout closed"),
                }
            }
        });

        self.reader_task = Some(task);
        Ok(rx)
    }
}

fn oversized(max_buffer_size: usize) -> String {
    format!("JSON message exceeded maximum buffer size of {max_buffer_size} bytes")
}

/// Append one line to the buffer and try to complete a document
///
/// Returns `Ok(None)` while the buffered text is a valid prefix of a document.
/// Text that fails with a syntax error is dropped with a warning and the
/// buffer starts over. Exceeding `max_buffer_size` is the only error.
fn accumulate(
    json_buffer: &mut String,
    line: &str,
    max_buffer_size: usize,
) -> Result<Option<serde_json::Value>> {
    json_buffer.push_str(line);
    if json_buffer.len() > max_buffer_size {
        json_buffer.clear();
        return Err(AgentError::transport(oversized(max_buffer_size)));
    }

    match serde_json::from_str::<serde_json::Value>(json_buffer) {
        Ok(document) => {
            json_buffer.clear();
            Ok(Some(document))
        }
        Err(e) if e.is_eof() => Ok(None),
        Err(e) => {
            warn!("dropping unparsable agent output ({e}): {json_buffer}");
            json_buffer.clear();
            Ok(None)
        }
    }
}
