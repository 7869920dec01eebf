//! Tools offered to the model during each phase.
//!
//! Every path a tool accepts is resolved against one workspace root and must
//! stay inside it. Execution tools report the files they touch to a
//! [`PathTracker`] owned by the session for the duration of one todo.

use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use agent_provider::{ToolError, ToolSet};
use serde::de::DeserializeOwned;
use serde_json::Value;

mod file_editor;
mod read_only_shell;
mod shell;
mod web;
mod write_plan;

pub use file_editor::FileEditorTool;
pub use read_only_shell::{check_read_only, ReadOnlyShellTool};
pub use shell::{ShellOptions, ShellTool};
pub use web::{WebFetchTool, WebSearchSettings, WebSearchTool};
pub use write_plan::{parse_plan, PlannedTodo, WritePlanTool};

pub const SHELL_TOOL: &str = "shell";
pub const READ_ONLY_SHELL_TOOL: &str = "read_only_shell";
pub const FILE_EDITOR_TOOL: &str = "file_editor";
pub const WEB_SEARCH_TOOL: &str = "web_search";
pub const WEB_FETCH_TOOL: &str = "web_fetch";
pub const WRITE_PLAN_TOOL: &str = "write_plan";

const DEFAULT_WEB_TIMEOUT_SEC: u64 = 20;

/// Root directory every tool path is resolved against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl AsRef<Path>) -> Result<Self, String> {
        let root = root.as_ref();
        let canonical = root
            .canonicalize()
            .map_err(|error| format!("Failed to resolve workspace root {}: {error}", root.display()))?;
        if !canonical.is_dir() {
            return Err(format!(
                "Workspace root {} is not a directory",
                canonical.display()
            ));
        }
        Ok(Self { root: canonical })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resolve_existing_path(&self, path: &str) -> Result<PathBuf, ToolError> {
        if path.trim().is_empty() {
            return Err(ToolError::execution("Path must not be empty"));
        }

        let candidate = self.absolute_candidate(path);
        let canonical = candidate.canonicalize().map_err(|error| {
            ToolError::execution(format!("Failed to resolve path {}: {error}", candidate.display()))
        })?;

        self.ensure_inside_workspace(&canonical)?;
        Ok(canonical)
    }

    pub fn resolve_write_path(&self, path: &str) -> Result<PathBuf, ToolError> {
        if path.trim().is_empty() {
            return Err(ToolError::execution("Path must not be empty"));
        }

        let candidate = self.absolute_candidate(path);
        let parent = candidate.parent().ok_or_else(|| {
            ToolError::execution(format!(
                "Path {} has no parent directory and cannot be written safely",
                candidate.display()
            ))
        })?;

        let anchor = canonicalize_existing_ancestor(parent)?;
        self.ensure_inside_workspace(&anchor)?;

        Ok(candidate)
    }

    /// Path relative to the root when it lies inside, otherwise as given.
    #[must_use]
    pub fn display(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .map(|relative| relative.display().to_string())
            .unwrap_or_else(|_| path.display().to_string())
    }

    fn absolute_candidate(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        let joined = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };
        normalize_lexically(&joined)
    }

    fn ensure_inside_workspace(&self, canonical_path: &Path) -> Result<(), ToolError> {
        if canonical_path.starts_with(&self.root) {
            Ok(())
        } else {
            Err(ToolError::execution(format!(
                "Path escapes workspace root: {}",
                canonical_path.display()
            )))
        }
    }
}

/// Paths touched while one todo runs.
#[derive(Debug, Clone, Default)]
pub struct PathTracker {
    paths: Arc<Mutex<BTreeSet<String>>>,
}

impl PathTracker {
    #[must_use]
    pub fn seeded<I>(paths: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        Self {
            paths: Arc::new(Mutex::new(paths.into_iter().collect())),
        }
    }

    pub fn record(&self, path: impl Into<String>) {
        lock_unpoisoned(&self.paths).insert(path.into());
    }

    #[must_use]
    pub fn snapshot(&self) -> BTreeSet<String> {
        lock_unpoisoned(&self.paths).clone()
    }
}

/// Settings shared by the tool sets built for one session.
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub workspace: Workspace,
    pub shell: ShellOptions,
    pub web_search: Option<WebSearchSettings>,
    pub web_timeout: Duration,
}

impl ToolContext {
    #[must_use]
    pub fn new(workspace: Workspace) -> Self {
        Self {
            workspace,
            shell: ShellOptions::default(),
            web_search: None,
            web_timeout: Duration::from_secs(DEFAULT_WEB_TIMEOUT_SEC),
        }
    }

    #[must_use]
    pub fn with_web_search(mut self, settings: Option<WebSearchSettings>) -> Self {
        self.web_search = settings;
        self
    }

    /// The single inspection tool used while analyzing the project.
    #[must_use]
    pub fn analysis_tools(&self) -> ToolSet {
        ToolSet::new().with(ReadOnlyShellTool::new(self.workspace.clone(), self.shell.clone()))
    }

    #[must_use]
    pub fn plan_tools(&self) -> ToolSet {
        ToolSet::new().with(WritePlanTool)
    }

    /// Full tool set for one todo; touched files land in `tracker`.
    #[must_use]
    pub fn execution_tools(&self, tracker: &PathTracker) -> ToolSet {
        ToolSet::new()
            .with(ShellTool::new(self.workspace.clone(), self.shell.clone()))
            .with(FileEditorTool::new(self.workspace.clone(), tracker.clone()))
            .with(WebSearchTool::new(self.web_search.clone(), self.web_timeout))
            .with(WebFetchTool::new(self.web_timeout))
    }
}

/// Decodes a tool's argument object into its typed form.
pub(crate) fn parse_arguments<T: DeserializeOwned>(tool: &str, arguments: Value) -> Result<T, ToolError> {
    serde_json::from_value(arguments).map_err(|error| ToolError::malformed(tool, error.to_string()))
}

pub(crate) fn truncate_to_byte_limit(content: String, max_bytes: usize) -> String {
    if content.len() <= max_bytes {
        return content;
    }

    let mut cutoff = max_bytes.min(content.len());
    while cutoff > 0 && !content.is_char_boundary(cutoff) {
        cutoff -= 1;
    }

    let mut truncated = content[..cutoff].to_string();
    truncated.push_str("\n[truncated]");
    truncated
}

fn canonicalize_existing_ancestor(path: &Path) -> Result<PathBuf, ToolError> {
    for ancestor in path.ancestors() {
        if ancestor.exists() {
            return ancestor.canonicalize().map_err(|error| {
                ToolError::execution(format!("Failed to resolve path {}: {error}", ancestor.display()))
            });
        }
    }

    Err(ToolError::execution(format!(
        "No existing ancestor found for path {}",
        path.display()
    )))
}

fn normalize_lexically(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;

    #[test]
    fn write_paths_cannot_climb_out_of_the_workspace() {
        let workspace = tempdir().expect("temp workspace");
        let root = Workspace::new(workspace.path()).expect("workspace");

        let error = root
            .resolve_write_path("missing/../../outside.txt")
            .expect_err("escape should fail");
        assert!(error.to_string().contains("Path escapes workspace root"), "{error}");

        let inside = root.resolve_write_path("a/b/../c.txt").expect("inside path");
        assert_eq!(root.display(&inside), "a/c.txt");
    }

    #[test]
    fn existing_paths_resolve_relative_to_root() {
        let workspace = tempdir().expect("temp workspace");
        fs::write(workspace.path().join("notes.txt"), "hi").expect("seed file");
        let root = Workspace::new(workspace.path()).expect("workspace");

        let resolved = root.resolve_existing_path("./notes.txt").expect("resolve");
        assert_eq!(root.display(&resolved), "notes.txt");
        assert!(root.resolve_existing_path("   ").is_err());
    }

    #[test]
    fn tracker_keeps_seeded_and_recorded_paths() {
        let tracker = PathTracker::seeded(["src/lib.rs".to_string()]);
        tracker.clone().record("src/main.rs");

        assert_eq!(
            tracker.snapshot().into_iter().collect::<Vec<_>>(),
            vec!["src/lib.rs".to_string(), "src/main.rs".to_string()]
        );
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_to_byte_limit("héllo".to_string(), 2), "h\n[truncated]");
        assert_eq!(truncate_to_byte_limit("short".to_string(), 10), "short");
    }

    #[test]
    fn tool_sets_expose_expected_names() {
        let workspace = tempdir().expect("temp workspace");
        let context = ToolContext::new(Workspace::new(workspace.path()).expect("workspace"));

        assert_eq!(context.analysis_tools().names(), vec![READ_ONLY_SHELL_TOOL.to_string()]);
        assert_eq!(context.plan_tools().names(), vec![WRITE_PLAN_TOOL.to_string()]);
        assert_eq!(
            context.execution_tools(&PathTracker::default()).names(),
            vec![
                SHELL_TOOL.to_string(),
                FILE_EDITOR_TOOL.to_string(),
                WEB_SEARCH_TOOL.to_string(),
                WEB_FETCH_TOOL.to_string(),
            ]
        );
    }
}
