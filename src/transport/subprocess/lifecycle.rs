//! Lifecycle management for subprocess transport (connect, close)

use std::collections::HashMap;
use std::env;
use std::process::Stdio;
use std::sync::atomic::Ordering;

use futures::StreamExt;
use log::{debug, info, warn};
use tokio::io::AsyncWriteExt;
use tokio_util::codec::{FramedRead, LinesCodec};

use crate::VERSION;
use crate::error::{AgentError, Result};

use super::command::CommandBuilder;
use super::config::{CLOSE_TIMEOUT, DANGEROUS_ENV_VARS, ENTRYPOINT};
use super::transport::SubprocessTransport;

impl SubprocessTransport {
    /// Spawn the CLI and set up stdio pipes
    ///
    /// # Errors
    /// Returns error if process spawning fails or stdio handles cannot be obtained
    pub(super) async fn connect_impl(&mut self) -> Result<()> {
        let mut process = self.process.lock().await;
        if process.is_some() {
            return Ok(());
        }

        let mut cmd = CommandBuilder::new(&self.cli_path, &self.options).build();

        let mut process_env = env::vars().collect::<HashMap<_, _>>();
        for (key, value) in &self.options.env {
            if DANGEROUS_ENV_VARS.contains(&key.as_str()) {
                warn!("refusing to pass {key} to the agent process");
                continue;
            }
            process_env.insert(key.clone(), value.clone());
        }
        process_env.insert("CLAUDE_CODE_ENTRYPOINT".to_string(), ENTRYPOINT.to_string());
        process_env.insert("CLAUDE_AGENT_SDK_VERSION".to_string(), VERSION.to_string());

        if let Some(ref cwd) = self.options.cwd {
            process_env.insert("PWD".to_string(), cwd.to_string_lossy().to_string());
            cmd.current_dir(cwd);
        }
        cmd.envs(process_env);

        // Piped stderr keeps the child away from the parent terminal
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            if let Some(ref cwd) = self.options.cwd
                && !cwd.exists()
            {
                return AgentError::connection(format!(
                    "Working directory does not exist: {}",
                    cwd.display()
                ));
            }
            AgentError::connection(format!("Failed to start agent CLI: {e}"))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| AgentError::connection("Failed to get stdin handle"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AgentError::connection("Failed to get stdout handle"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| AgentError::connection("Failed to get stderr handle"))?;

        // Drain stderr so the child never blocks on a full pipe
        let stderr_task = tokio::spawn(async move {
            let mut lines = FramedRead::new(stderr, LinesCodec::new());
            while let Some(Ok(line)) = lines.next().await {
                debug!(target: "agent_cli", "{line}");
            }
        });

        info!(
            "spawned agent CLI {} (pid {:?})",
            self.cli_path.display(),
            child.id()
        );

        *process = Some(child);
        drop(process);
        self.stdin = Some(stdin);
        self.stdout = Some(stdout);
        self.stderr_task = Some(stderr_task);
        self.ready.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Close stdin, stop reader tasks and reap the process
    ///
    /// The process gets [`CLOSE_TIMEOUT`] to exit after stdin closes before it
    /// is killed.
    ///
    /// # Errors
    /// Returns error if waiting on the process fails
    pub(super) async fn close_impl(&mut self) -> Result<()> {
        self.ready.store(false, Ordering::SeqCst);

        if let Some(mut stdin) = self.stdin.take() {
            let _ = stdin.shutdown().await;
        }

        if let Some(task) = self.reader_task.take() {
            task.abort();
        }
        if let Some(task) = self.stderr_task.take() {
            task.abort();
        }
        self.stdout = None;

        let Some(mut child) = self.process.lock().await.take() else {
            return Ok(());
        };

        match tokio::time::timeout(CLOSE_TIMEOUT, child.wait()).await {
            Ok(Ok(status)) => {
                debug!("agent CLI exited with {status}");
                Ok(())
            }
            Ok(Err(e)) => Err(AgentError::Io(e)),
            Err(_) => {
                warn!("agent CLI did not exit within {CLOSE_TIMEOUT:?}, killing it");
                let _ = child.kill().await;
                let _ = child.wait().await;
                Ok(())
            }
        }
    }

    /// Best-effort cleanup when dropped without `close`
    pub(super) fn drop_impl(&mut self) {
        drop(self.stdin.take());

        if let Some(task) = self.reader_task.take() {
            task.abort();
        }
        if let Some(task) = self.stderr_task.take() {
            task.abort();
        }

        if let Ok(mut process) = self.process.try_lock()
            && let Some(mut child) = process.take()
        {
            let _ = child.start_kill();
        }
    }
}
