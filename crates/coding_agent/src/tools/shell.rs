use std::process::{ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use agent_provider::{Tool, ToolError};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::process::Command;
use tracing::debug;

use super::{parse_arguments, truncate_to_byte_limit, Workspace, SHELL_TOOL};

const DEFAULT_TIMEOUT_SEC: u64 = 30;
const DEFAULT_MAX_OUTPUT_BYTES: usize = 100 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShellOptions {
    pub default_timeout_sec: u64,
    pub max_output_bytes: usize,
}

impl Default for ShellOptions {
    fn default() -> Self {
        Self {
            default_timeout_sec: DEFAULT_TIMEOUT_SEC,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ShellArgs {
    pub command: String,
    #[serde(default)]
    pub timeout_sec: Option<u64>,
    #[serde(default)]
    pub cwd: Option<String>,
}

/// Finished command, formatted for the model.
pub(crate) struct CommandReport {
    pub success: bool,
    pub content: String,
}

/// Runs `bash -lc` commands inside the workspace.
#[derive(Debug)]
pub struct ShellTool {
    workspace: Workspace,
    options: ShellOptions,
    disposed: AtomicBool,
}

impl ShellTool {
    #[must_use]
    pub fn new(workspace: Workspace, options: ShellOptions) -> Self {
        Self {
            workspace,
            options,
            disposed: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

#[async_trait]
impl Tool for ShellTool {
    fn name(&self) -> &str {
        SHELL_TOOL
    }

    fn description(&self) -> &str {
        "Run a bash command in the workspace. Returns the exit status, stdout, and stderr."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": { "type": "string", "description": "Command passed to bash -lc" },
                "timeout_sec": { "type": "integer", "minimum": 1 },
                "cwd": { "type": "string", "description": "Directory relative to the workspace root" }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, arguments: Value) -> Result<String, ToolError> {
        if self.is_disposed() {
            return Err(ToolError::execution("shell tool has been disposed"));
        }
        let args: ShellArgs = parse_arguments(SHELL_TOOL, arguments)?;
        let report = run_command(&self.workspace, &self.options, args).await?;
        if report.success {
            Ok(report.content)
        } else {
            Err(ToolError::Execution(report.content))
        }
    }

    async fn dispose(&self) {
        if !self.disposed.swap(true, Ordering::AcqRel) {
            debug!(tool = SHELL_TOOL, "tool disposed");
        }
    }
}

pub(crate) async fn run_command(
    workspace: &Workspace,
    options: &ShellOptions,
    args: ShellArgs,
) -> Result<CommandReport, ToolError> {
    if args.command.trim().is_empty() {
        return Err(ToolError::execution("command must not be empty"));
    }
    let timeout = args
        .timeout_sec
        .filter(|seconds| *seconds > 0)
        .unwrap_or(options.default_timeout_sec);

    let mut command = Command::new("bash");
    command
        .arg("-lc")
        .arg(&args.command)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let cwd = match args.cwd.as_deref() {
        Some(cwd) => {
            let resolved = workspace
                .resolve_existing_path(cwd)
                .map_err(|error| ToolError::execution(format!("Invalid bash cwd: {error}")))?;
            if !resolved.is_dir() {
                return Err(ToolError::execution("Invalid bash cwd: expected a directory"));
            }
            resolved
        }
        None => workspace.root().to_path_buf(),
    };
    command.current_dir(cwd);

    let child = command
        .spawn()
        .map_err(|error| ToolError::execution(format!("Failed to launch bash command: {error}")))?;

    let (status_label, success, stdout, stderr) =
        match tokio::time::timeout(Duration::from_secs(timeout), child.wait_with_output()).await {
            Ok(Ok(output)) => (
                format_exit_status(output.status),
                output.status.success(),
                output.stdout,
                output.stderr,
            ),
            Ok(Err(error)) => {
                return Err(ToolError::execution(format!(
                    "Failed waiting for bash command: {error}"
                )));
            }
            Err(_) => (format!("timeout after {timeout}s"), false, Vec::new(), Vec::new()),
        };
    debug!(command = %args.command, status = %status_label, "shell command finished");

    let content = format!(
        "status: {status_label}\nstdout:\n{}\nstderr:\n{}",
        String::from_utf8_lossy(&stdout),
        String::from_utf8_lossy(&stderr)
    );
    Ok(CommandReport {
        success,
        content: truncate_to_byte_limit(content, options.max_output_bytes),
    })
}

fn format_exit_status(status: ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("exit_code={code}"),
        None => "exit_code=terminated_by_signal".to_string(),
    }
}
