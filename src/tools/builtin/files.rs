//! `glob_search` and `grep_search`: file search confined to one root.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use globset::{Glob, GlobMatcher};
use ignore::WalkBuilder;
use regex::Regex;

use crate::error::RelayError;
use crate::tools::tool::{AgentTool, Tool};
use crate::tools::types::AgentToolParameters;
use crate::util::text::truncate_utf8;

pub const GLOB_TOOL_NAME: &str = "glob_search";
pub const GREP_TOOL_NAME: &str = "grep_search";
pub const MAX_FILE_BYTES: u64 = 10 * 1024 * 1024;
const OUTPUT_MAX_BYTES: usize = 32_768;

/// Search scope shared by both tools.
#[derive(Debug, Clone)]
pub struct FileSearch {
    root: PathBuf,
}

impl FileSearch {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Files under the root, relative paths with `/` separators, sorted.
    /// Oversized files are left out.
    fn files(&self) -> Vec<(String, PathBuf)> {
        if !self.root.exists() {
            return Vec::new();
        }
        let mut builder = WalkBuilder::new(&self.root);
        builder.hidden(true).git_ignore(true).parents(false).follow_links(false);

        let mut files: Vec<(String, PathBuf)> = builder
            .build()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_some_and(|t| t.is_file()))
            .filter(|entry| {
                entry
                    .metadata()
                    .map(|m| m.len() <= MAX_FILE_BYTES)
                    .unwrap_or(false)
            })
            .filter_map(|entry| {
                let rel = entry.path().strip_prefix(&self.root).ok()?;
                let rel = rel.to_string_lossy().replace('\\', "/");
                Some((rel, entry.into_path()))
            })
            .collect();
        files.sort();
        files
    }

    /// Relative paths matching a glob such as `**/*.py`.
    pub fn glob(&self, pattern: &str) -> Result<Vec<String>, RelayError> {
        let matcher = compile_glob(pattern)?;
        Ok(self
            .files()
            .into_iter()
            .map(|(rel, _)| rel)
            .filter(|rel| matcher.is_match(rel))
            .collect())
    }

    /// `path:line: text` for every line matching `pattern`, optionally only
    /// in files whose relative path matches `include`.
    pub fn grep(&self, pattern: &str, include: Option<&str>) -> Result<Vec<String>, RelayError> {
        let regex = Regex::new(pattern)
            .map_err(|e| RelayError::InvalidArgument(format!("Invalid regex pattern: {e}")))?;
        let include = include.map(compile_glob).transpose()?;

        let mut hits = Vec::new();
        for (rel, path) in self.files() {
            if include.as_ref().is_some_and(|m| !m.is_match(&rel)) {
                continue;
            }
            // Binary and unreadable files are skipped.
            let Ok(content) = fs::read_to_string(&path) else { continue };
            for (idx, line) in content.lines().enumerate() {
                if regex.is_match(line) {
                    hits.push(format!("{rel}:{}: {line}", idx + 1));
                }
            }
        }
        Ok(hits)
    }
}

fn compile_glob(pattern: &str) -> Result<GlobMatcher, RelayError> {
    Glob::new(pattern)
        .map(|g| g.compile_matcher())
        .map_err(|e| RelayError::InvalidArgument(format!("Invalid glob pattern: {e}")))
}

fn render(lines: Vec<String>, empty: &str) -> String {
    if lines.is_empty() {
        return empty.to_string();
    }
    let joined = lines.join("\n");
    if joined.len() > OUTPUT_MAX_BYTES {
        format!("{}\n... (truncated)", truncate_utf8(&joined, OUTPUT_MAX_BYTES))
    } else {
        joined
    }
}

async fn blocking<T: Send + 'static>(
    tool_name: &str,
    f: impl FnOnce() -> T + Send + 'static,
) -> Result<T, RelayError> {
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| RelayError::ToolExecution {
            tool_name: tool_name.to_string(),
            message: e.to_string(),
        })
}

/// Create the `glob_search` tool.
pub fn glob_search_tool(search: FileSearch) -> Arc<dyn Tool> {
    let search = Arc::new(search);
    Arc::new(AgentTool::new(
        GLOB_TOOL_NAME,
        "Find files in the workspace by glob pattern (e.g. '**/*.py'). Returns relative paths.",
        AgentToolParameters::object()
            .string("pattern", "Glob pattern to match file paths against", true)
            .build(),
        move |args, _ctx| {
            let search = search.clone();
            async move {
                let pattern = args.get_str("pattern")?.to_string();
                let found = blocking(GLOB_TOOL_NAME, move || search.glob(&pattern)).await??;
                Ok(render(found, "No files found."))
            }
        },
    ))
}

/// Create the `grep_search` tool.
pub fn grep_search_tool(search: FileSearch) -> Arc<dyn Tool> {
    let search = Arc::new(search);
    Arc::new(AgentTool::new(
        GREP_TOOL_NAME,
        "Search file contents in the workspace with a regular expression. Returns \
         matching lines as 'path:line: text'.",
        AgentToolParameters::object()
            .string("pattern", "Regular expression to search for", true)
            .string("include", "Optional glob restricting which files are searched", false)
            .build(),
        move |args, _ctx| {
            let search = search.clone();
            async move {
                let pattern = args.get_str("pattern")?.to_string();
                let include = args.get_str_opt("include").map(str::to_string);
                let hits =
                    blocking(GREP_TOOL_NAME, move || search.grep(&pattern, include.as_deref())).await??;
                Ok(render(hits, "No matches found."))
            }
        },
    ))
}
