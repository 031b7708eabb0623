//! CLI command building logic for subprocess transport

use std::path::Path;

use log::warn;
use tokio::process::Command;

use crate::types::options::AgentOptions;

use super::config::ALLOWED_EXTRA_FLAGS;

/// Command builder for the agent CLI in streaming control mode
pub struct CommandBuilder<'a> {
    cli_path: &'a Path,
    options: &'a AgentOptions,
}

impl<'a> CommandBuilder<'a> {
    /// Create a new command builder
    pub const fn new(cli_path: &'a Path, options: &'a AgentOptions) -> Self {
        Self { cli_path, options }
    }

    /// Build the complete CLI command
    pub fn build(&self) -> Command {
        let mut cmd = Command::new(self.cli_path);
        cmd.args(self.args());
        cmd
    }

    /// Arguments in the order they are passed
    pub fn args(&self) -> Vec<String> {
        let mut args: Vec<String> = [
            "--output-format",
            "stream-json",
            "--verbose",
            "--input-format",
            "stream-json",
        ]
        .iter()
        .map(ToString::to_string)
        .collect();

        if let Some(ref prompt) = self.options.system_prompt {
            args.extend(["--system-prompt".to_string(), prompt.clone()]);
        }

        Self::push_list(&mut args, "--allowedTools", &self.options.allowed_tools);
        Self::push_list(&mut args, "--disallowedTools", &self.options.disallowed_tools);

        if let Some(max_turns) = self.options.max_turns {
            args.extend(["--max-turns".to_string(), max_turns.to_string()]);
        }
        if let Some(ref model) = self.options.model {
            args.extend(["--model".to_string(), model.clone()]);
        }
        if let Some(mode) = self.options.permission_mode {
            args.extend(["--permission-mode".to_string(), mode.as_str().to_string()]);
        }

        // Permission prompts travel back over the control channel
        if self.options.can_use_tool.is_some() {
            args.extend(["--permission-prompt-tool".to_string(), "stdio".to_string()]);
        }

        if !self.options.tool_servers.is_empty() {
            let mut names: Vec<&String> = self.options.tool_servers.keys().collect();
            names.sort();
            let servers: serde_json::Map<String, serde_json::Value> = names
                .into_iter()
                .map(|name| {
                    (
                        name.clone(),
                        serde_json::json!({ "type": "sdk", "name": name }),
                    )
                })
                .collect();
            args.extend([
                "--mcp-config".to_string(),
                serde_json::json!({ "mcpServers": servers }).to_string(),
            ]);
        }

        let mut extra: Vec<(&String, &Option<String>)> = self.options.extra_args.iter().collect();
        extra.sort_by_key(|(flag, _)| *flag);
        for (flag, value) in extra {
            if !ALLOWED_EXTRA_FLAGS.contains(&flag.as_str()) {
                warn!("ignoring extra CLI flag --{flag}: not in the allowlist");
                continue;
            }
            args.push(format!("--{flag}"));
            if let Some(v) = value {
                args.push(v.clone());
            }
        }

        args
    }

    fn push_list<T: AsRef<str>>(args: &mut Vec<String>, flag: &str, items: &[T]) {
        if items.is_empty() {
            return;
        }
        let joined: Vec<&str> = items.iter().map(AsRef::as_ref).collect();
        args.extend([flag.to_string(), joined.join(",")]);
    }
}
