//! Subprocess transport running the agent CLI

use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, ChildStdout};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

use crate::error::{AgentError, Result};
use crate::transport::Transport;
use crate::types::options::AgentOptions;

use super::config::DEFAULT_MAX_BUFFER_SIZE;

/// Subprocess transport for the agent CLI
pub struct SubprocessTransport {
    pub(super) options: AgentOptions,
    pub(super) cli_path: PathBuf,
    pub(super) process: Arc<Mutex<Option<Child>>>,
    pub(super) stdin: Option<ChildStdin>,
    pub(super) stdout: Option<ChildStdout>,
    pub(super) ready: Arc<AtomicBool>,
    pub(super) max_buffer_size: usize,
    pub(super) reader_task: Option<JoinHandle<()>>,
    pub(super) stderr_task: Option<JoinHandle<()>>,
}

impl SubprocessTransport {
    /// Create a transport for the configured CLI
    ///
    /// Uses `options.cli_path` when set and searches for the CLI otherwise.
    ///
    /// # Errors
    /// Returns `AgentError::CliNotFound` if the CLI cannot be located
    pub fn new(options: &AgentOptions) -> Result<Self> {
        let cli_path = match options.cli_path {
            Some(ref path) => path.clone(),
            None => Self::find_cli()?,
        };

        Ok(Self {
            options: options.clone(),
            cli_path,
            process: Arc::new(Mutex::new(None)),
            stdin: None,
            stdout: None,
            ready: Arc::new(AtomicBool::new(false)),
            max_buffer_size: options.max_buffer_size.unwrap_or(DEFAULT_MAX_BUFFER_SIZE),
            reader_task: None,
            stderr_task: None,
        })
    }

    /// Find the agent CLI binary
    ///
    /// # Errors
    /// Returns error if the CLI cannot be found in PATH or common locations
    pub fn find_cli() -> Result<PathBuf> {
        if let Ok(path) = which::which("claude") {
            return Ok(path);
        }

        let home = PathBuf::from(env::var("HOME").unwrap_or_else(|_| String::from("/root")));
        [
            home.join(".npm-global/bin/claude"),
            PathBuf::from("/usr/local/bin/claude"),
            home.join(".local/bin/claude"),
            home.join("node_modules/.bin/claude"),
            home.join(".yarn/bin/claude"),
        ]
        .into_iter()
        .find(|path| path.is_file())
        .ok_or_else(AgentError::cli_not_found)
    }

    /// Path of the CLI this transport runs
    #[must_use]
    pub const fn cli_path(&self) -> &PathBuf {
        &self.cli_path
    }
}

impl Transport for SubprocessTransport {
    async fn connect(&mut self) -> Result<()> {
        self.connect_impl().await
    }

    async fn write(&mut self, data: &str) -> Result<()> {
        if !self.is_ready() {
            return Err(AgentError::transport("Transport is not ready for writing"));
        }

        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| AgentError::transport("stdin not available"))?;

        stdin
            .write_all(data.as_bytes())
            .await
            .map_err(|e| AgentError::transport(format!("Failed to write to stdin: {e}")))?;

        stdin
            .flush()
            .await
            .map_err(|e| AgentError::transport(format!("Failed to flush stdin: {e}")))?;

        Ok(())
    }

    async fn end_input(&mut self) -> Result<()> {
        if let Some(mut stdin) = self.stdin.take() {
            stdin
                .shutdown()
                .await
                .map_err(|e| AgentError::transport(format!("Failed to close stdin: {e}")))?;
        }
        Ok(())
    }

    fn read_messages(&mut self) -> Result<mpsc::Receiver<Result<serde_json::Value>>> {
        self.read_messages_impl()
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn close(&mut self) -> Result<()> {
        self.close_impl().await
    }
}

impl Drop for SubprocessTransport {
    fn drop(&mut self) {
        self.drop_impl();
    }
}
