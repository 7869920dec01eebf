use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use agent_provider::{Tool, ToolError};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::fs;
use tracing::debug;

use super::{parse_arguments, PathTracker, Workspace, FILE_EDITOR_TOOL};

const DEFAULT_VIEW_MAX_BYTES: usize = 200 * 1024;

#[derive(Debug, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
enum EditorCommand {
    View {
        path: String,
        #[serde(default)]
        view_range: Option<(usize, i64)>,
    },
    Create {
        path: String,
        file_text: String,
    },
    StrReplace {
        path: String,
        old_str: String,
        #[serde(default)]
        new_str: String,
    },
    Insert {
        path: String,
        insert_line: usize,
        new_str: String,
    },
}

/// View, create, and edit files inside the workspace.
#[derive(Debug)]
pub struct FileEditorTool {
    workspace: Workspace,
    tracker: PathTracker,
    view_max_bytes: usize,
    disposed: AtomicBool,
}

impl FileEditorTool {
    #[must_use]
    pub fn new(workspace: Workspace, tracker: PathTracker) -> Self {
        Self {
            workspace,
            tracker,
            view_max_bytes: DEFAULT_VIEW_MAX_BYTES,
            disposed: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    async fn view(&self, path: &str, view_range: Option<(usize, i64)>) -> Result<String, ToolError> {
        let resolved = self.workspace.resolve_existing_path(path)?;
        if resolved.is_dir() {
            return self.list_directory(&resolved).await;
        }

        let content = read_text(&resolved, self.view_max_bytes).await?;
        let lines = content.lines().collect::<Vec<_>>();
        let (start, end) = match view_range {
            None => (1, lines.len()),
            Some((start, end)) => {
                let end = if end < 0 { lines.len() } else { end as usize };
                if start == 0 || start > end.max(1) || end > lines.len() {
                    return Err(ToolError::execution(format!(
                        "Invalid view_range [{start}, {end}] for a file with {} lines",
                        lines.len()
                    )));
                }
                (start, end)
            }
        };

        self.tracker.record(self.workspace.display(&resolved));
        Ok(lines
            .iter()
            .enumerate()
            .skip(start.saturating_sub(1))
            .take(end.saturating_sub(start.saturating_sub(1)))
            .map(|(index, line)| format!("{:>6}\t{line}", index + 1))
            .collect::<Vec<_>>()
            .join("\n"))
    }

    async fn list_directory(&self, directory: &Path) -> Result<String, ToolError> {
        let mut entries = fs::read_dir(directory).await.map_err(|error| {
            ToolError::execution(format!("Failed to list {}: {error}", directory.display()))
        })?;

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|error| {
            ToolError::execution(format!("Failed to list {}: {error}", directory.display()))
        })? {
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') {
                continue;
            }
            let is_dir = entry.file_type().await.map(|kind| kind.is_dir()).unwrap_or(false);
            names.push(if is_dir { format!("{name}/") } else { name });
        }
        names.sort();
        Ok(names.join("\n"))
    }

    async fn create(&self, path: &str, file_text: &str) -> Result<String, ToolError> {
        let resolved = self.workspace.resolve_write_path(path)?;
        let existed = resolved.exists();
        if let Some(parent) = resolved.parent() {
            fs::create_dir_all(parent).await.map_err(|error| {
                ToolError::execution(format!(
                    "Failed to create parent directories {}: {error}",
                    parent.display()
                ))
            })?;
        }
        fs::write(&resolved, file_text).await.map_err(|error| {
            ToolError::execution(format!("Failed to write file {}: {error}", resolved.display()))
        })?;

        let display = self.workspace.display(&resolved);
        self.tracker.record(display.clone());
        Ok(if existed {
            format!("Overwrote {display}")
        } else {
            format!("Created {display}")
        })
    }

    async fn str_replace(&self, path: &str, old_str: &str, new_str: &str) -> Result<String, ToolError> {
        if old_str.is_empty() {
            return Err(ToolError::execution("old_str must not be empty"));
        }
        let resolved = self.workspace.resolve_existing_path(path)?;
        let current = read_text(&resolved, usize::MAX).await?;

        let occurrences = current.match_indices(old_str).count();
        if occurrences != 1 {
            return Err(ToolError::execution(format!(
                "str_replace requires exactly one match; found {occurrences}"
            )));
        }

        write_text(&resolved, &current.replacen(old_str, new_str, 1)).await?;
        let display = self.workspace.display(&resolved);
        self.tracker.record(display.clone());
        Ok(format!("Updated {display}"))
    }

    async fn insert(&self, path: &str, insert_line: usize, new_str: &str) -> Result<String, ToolError> {
        let resolved = self.workspace.resolve_existing_path(path)?;
        let current = read_text(&resolved, usize::MAX).await?;

        let mut lines = current.lines().map(ToString::to_string).collect::<Vec<_>>();
        if insert_line > lines.len() {
            return Err(ToolError::execution(format!(
                "insert_line {insert_line} is past the end of a file with {} lines",
                lines.len()
            )));
        }
        let inserted = new_str.lines().map(ToString::to_string).collect::<Vec<_>>();
        let count = inserted.len();
        lines.splice(insert_line..insert_line, inserted);

        let mut updated = lines.join("\n");
        if current.ends_with('\n') || current.is_empty() {
            updated.push('\n');
        }
        write_text(&resolved, &updated).await?;

        let display = self.workspace.display(&resolved);
        self.tracker.record(display.clone());
        Ok(format!("Inserted {count} line(s) into {display} after line {insert_line}"))
    }
}

#[async_trait]
impl Tool for FileEditorTool {
    fn name(&self) -> &str {
        FILE_EDITOR_TOOL
    }

    fn description(&self) -> &str {
        "View a file or directory, create a file, replace one exact string in a file, \
         or insert lines after a given line number. Paths are relative to the workspace root."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": { "type": "string", "enum": ["view", "create", "str_replace", "insert"] },
                "path": { "type": "string" },
                "file_text": { "type": "string", "description": "Content for create" },
                "old_str": { "type": "string", "description": "Exact text to replace; must match once" },
                "new_str": { "type": "string", "description": "Replacement or inserted text" },
                "insert_line": { "type": "integer", "minimum": 0, "description": "Insert after this line; 0 inserts at the top" },
                "view_range": {
                    "type": "array",
                    "items": { "type": "integer" },
                    "minItems": 2,
                    "maxItems": 2,
                    "description": "1-indexed [start, end]; end -1 reads to the end"
                }
            },
            "required": ["command", "path"]
        })
    }

    async fn execute(&self, arguments: Value) -> Result<String, ToolError> {
        if self.is_disposed() {
            return Err(ToolError::execution("file editor has been disposed"));
        }
        match parse_arguments(FILE_EDITOR_TOOL, arguments)? {
            EditorCommand::View { path, view_range } => self.view(&path, view_range).await,
            EditorCommand::Create { path, file_text } => self.create(&path, &file_text).await,
            EditorCommand::StrReplace {
                path,
                old_str,
                new_str,
            } => self.str_replace(&path, &old_str, &new_str).await,
            EditorCommand::Insert {
                path,
                insert_line,
                new_str,
            } => self.insert(&path, insert_line, &new_str).await,
        }
    }

    async fn dispose(&self) {
        if !self.disposed.swap(true, Ordering::AcqRel) {
            debug!(tool = FILE_EDITOR_TOOL, "tool disposed");
        }
    }
}

async fn read_text(path: &Path, max_bytes: usize) -> Result<String, ToolError> {
    let bytes = fs::read(path).await.map_err(|error| {
        ToolError::execution(format!("Failed to read file {}: {error}", path.display()))
    })?;
    if bytes.len() > max_bytes {
        return Err(ToolError::execution(format!(
            "File exceeds max read size ({} bytes > {max_bytes} bytes)",
            bytes.len()
        )));
    }
    String::from_utf8(bytes).map_err(|_| ToolError::execution("File is not valid UTF-8 text"))
}

async fn write_text(path: &Path, content: &str) -> Result<(), ToolError> {
    fs::write(path, content).await.map_err(|error| {
        ToolError::execution(format!("Failed to write file {}: {error}", path.display()))
    })
}
