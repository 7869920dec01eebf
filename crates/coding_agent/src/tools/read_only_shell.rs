use std::sync::OnceLock;

use agent_provider::{Tool, ToolError};
use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};

use super::shell::{run_command, ShellArgs, ShellOptions};
use super::{parse_arguments, Workspace, READ_ONLY_SHELL_TOOL};

const ALLOWED_PROGRAMS: &[&str] = &[
    "cat", "cut", "du", "echo", "file", "find", "git", "grep", "head", "ls", "pwd", "rg", "sort",
    "stat", "tail", "tree", "uniq", "wc", "which",
];
const ALLOWED_GIT_SUBCOMMANDS: &[&str] = &["blame", "branch", "diff", "log", "ls-files", "show", "status"];
const FORBIDDEN_FIND_FLAGS: &[&str] = &["-delete", "-exec", "-execdir", "-ok", "-okdir", "-fprint", "-fprintf", "-fls"];

fn separator_regex() -> &'static Regex {
    static CACHED: OnceLock<Regex> = OnceLock::new();
    CACHED.get_or_init(|| Regex::new(r"\|\||&&|;|\||\n").expect("separator regex must compile"))
}

/// Rejects anything but allow-listed inspection commands.
pub fn check_read_only(command: &str) -> Result<(), ToolError> {
    if command.trim().is_empty() {
        return Err(ToolError::execution("command must not be empty"));
    }
    for forbidden in [">", "<", "`", "$(", "${"] {
        if command.contains(forbidden) {
            return Err(ToolError::execution(format!(
                "read-only shell does not allow '{forbidden}'"
            )));
        }
    }

    for segment in separator_regex().split(command) {
        let words = segment.split_whitespace().collect::<Vec<_>>();
        let Some(program) = words.first() else {
            continue;
        };
        if segment.contains('&') {
            return Err(ToolError::execution("read-only shell does not allow background jobs"));
        }
        if !ALLOWED_PROGRAMS.contains(program) {
            return Err(ToolError::execution(format!(
                "read-only shell does not allow '{program}'; allowed: {}",
                ALLOWED_PROGRAMS.join(", ")
            )));
        }
        match *program {
            "git" => {
                let subcommand = words.get(1).copied().unwrap_or_default();
                if !ALLOWED_GIT_SUBCOMMANDS.contains(&subcommand) {
                    return Err(ToolError::execution(format!(
                        "read-only shell does not allow 'git {subcommand}'"
                    )));
                }
            }
            "find" => {
                if let Some(flag) = words.iter().find(|word| FORBIDDEN_FIND_FLAGS.contains(*word)) {
                    return Err(ToolError::execution(format!(
                        "read-only shell does not allow 'find {flag}'"
                    )));
                }
            }
            _ => {}
        }
    }
    Ok(())
}

/// Shell restricted to commands that only inspect the workspace.
#[derive(Debug)]
pub struct ReadOnlyShellTool {
    workspace: Workspace,
    options: ShellOptions,
}

impl ReadOnlyShellTool {
    #[must_use]
    pub fn new(workspace: Workspace, options: ShellOptions) -> Self {
        Self { workspace, options }
    }
}

#[async_trait]
impl Tool for ReadOnlyShellTool {
    fn name(&self) -> &str {
        READ_ONLY_SHELL_TOOL
    }

    fn description(&self) -> &str {
        "Inspect the workspace with read-only commands (ls, cat, grep, find, git status/log/diff, ...). \
         Redirection, substitution, and mutating commands are rejected."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": { "type": "string" },
                "cwd": { "type": "string", "description": "Directory relative to the workspace root" }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, arguments: Value) -> Result<String, ToolError> {
        let args: ShellArgs = parse_arguments(READ_ONLY_SHELL_TOOL, arguments)?;
        check_read_only(&args.command)?;
        let report = run_command(&self.workspace, &self.options, args).await?;
        if report.success {
            Ok(report.content)
        } else {
            Err(ToolError::Execution(report.content))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;

    #[test]
    fn inspection_pipelines_are_allowed() {
        assert!(check_read_only("ls -la src && grep -rn main src | head -5").is_ok());
        assert!(check_read_only("git log --oneline -3; git status").is_ok());
        assert!(check_read_only("find . -name '*.rs'").is_ok());
    }

    #[test]
    fn mutations_and_redirections_are_rejected() {
        for command in [
            "rm -rf src",
            "echo hi > notes.txt",
            "cat $(which ls)",
            "git commit -m x",
            "find . -name '*.tmp' -delete",
            "ls & rm x",
            "ls\ntouch x",
        ] {
            assert!(check_read_only(command).is_err(), "{command} should be rejected");
        }
    }

    #[test]
    fn rejection_names_the_program() {
        let error = check_read_only("ls && touch new.txt").expect_err("touch is not allowed");
        assert!(error.to_string().starts_with("read-only shell does not allow 'touch'"));
    }

    #[tokio::test]
    async fn allowed_command_runs_in_workspace() {
        let workspace = tempdir().expect("temp workspace");
        fs::write(workspace.path().join("Cargo.toml"), "[package]").expect("seed");
        let tool = ReadOnlyShellTool::new(
            Workspace::new(workspace.path()).expect("workspace"),
            ShellOptions::default(),
        );

        let output = tool
            .execute(json!({ "command": "ls" }))
            .await
            .expect("ls succeeds");

        assert!(output.contains("Cargo.toml"), "{output}");
    }
}
