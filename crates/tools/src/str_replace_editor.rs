//! File editor tool: view, create, and edit files by exact string replacement.
//!
//! Every edit records the previous file content so `undo_edit` can roll it
//! back. The history belongs to the tool instance, so two agents never see
//! each other's edits.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use taskloom_core::error::{EditorError, ToolError};
use taskloom_core::tool::{Tool, ToolResult};
use tracing::debug;

pub const NAME: &str = "str_replace_editor";

/// Context lines shown around an edit.
pub const SNIPPET_LINES: usize = 4;

/// Longest file content shown before clipping.
pub const MAX_RESPONSE_LEN: usize = 16_000;

pub const TRUNCATED_MESSAGE: &str = "<response clipped><NOTE>To save on context only part of this file has been shown to you. You should retry this tool after you have searched inside the file with `grep -n` in order to find the line numbers of what you are looking for.</NOTE>";

const COMMANDS: [&str; 5] = ["view", "create", "str_replace", "insert", "undo_edit"];

const DESCRIPTION: &str = "Custom editing tool for viewing, creating and editing files
* State is persistent across command calls and discussions with the user
* If `path` is a file, `view` displays the result of applying `cat -n`. If `path` is a directory, `view` lists non-hidden files and directories up to 2 levels deep
* The `create` command cannot be used if the specified `path` already exists as a file
* If a `command` generates a long output, it will be truncated and marked with `<response clipped>`
* The `undo_edit` command will revert the last edit made to the file at `path`

Notes for using the `str_replace` command:
* The `old_str` parameter should match EXACTLY one or more consecutive lines from the original file. Be mindful of whitespaces!
* If the `old_str` parameter is not unique in the file, the replacement will not be performed. Make sure to include enough context in `old_str` to make it unique
* The `new_str` parameter should contain the edited lines that should replace the `old_str`";

/// One decoded editor command.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum EditorCommand {
    View {
        path: String,
        #[serde(default)]
        view_range: Option<Vec<i64>>,
    },
    Create {
        path: String,
        #[serde(default)]
        file_text: Option<String>,
    },
    StrReplace {
        path: String,
        #[serde(default)]
        old_str: Option<String>,
        #[serde(default)]
        new_str: Option<String>,
    },
    Insert {
        path: String,
        #[serde(default)]
        insert_line: Option<i64>,
        #[serde(default)]
        new_str: Option<String>,
    },
    UndoEdit {
        path: String,
    },
}

impl EditorCommand {
    pub fn from_arguments(arguments: serde_json::Value) -> Result<Self, ToolError> {
        let command = arguments
            .get("command")
            .and_then(|c| c.as_str())
            .map(str::to_string);
        match command {
            Some(c) if !COMMANDS.contains(&c.as_str()) => {
                Err(EditorError::UnknownCommand(c).into())
            }
            _ => serde_json::from_value(arguments)
                .map_err(|e| ToolError::InvalidArguments(e.to_string())),
        }
    }

    fn path(&self) -> &str {
        match self {
            EditorCommand::View { path, .. }
            | EditorCommand::Create { path, .. }
            | EditorCommand::StrReplace { path, .. }
            | EditorCommand::Insert { path, .. }
            | EditorCommand::UndoEdit { path } => path,
        }
    }
}

#[derive(Default)]
pub struct StrReplaceEditor {
    history: Mutex<HashMap<PathBuf, Vec<String>>>,
}

impl StrReplaceEditor {
    pub fn new() -> Self {
        Self::default()
    }

    fn push_history(&self, path: &Path, content: String) {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(path.to_path_buf())
            .or_default()
            .push(content);
    }

    fn pop_history(&self, path: &Path) -> Option<String> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(path)
            .and_then(Vec::pop)
    }

    /// Run one command and return the text shown to the oracle.
    pub async fn apply(&self, command: EditorCommand) -> Result<String, EditorError> {
        let path = PathBuf::from(command.path());
        validate_path(&command, &path).await?;

        match command {
            EditorCommand::View { view_range, .. } => view(&path, view_range).await,
            EditorCommand::Create { file_text, .. } => {
                let text = file_text.ok_or(EditorError::MissingParameter {
                    param: "file_text",
                    command: "create",
                })?;
                write_file(&path, &text).await?;
                self.push_history(&path, text);
                Ok(format!("File created successfully at: {}", path.display()))
            }
            EditorCommand::StrReplace {
                old_str, new_str, ..
            } => {
                let old = old_str.ok_or(EditorError::MissingParameter {
                    param: "old_str",
                    command: "str_replace",
                })?;
                self.str_replace(&path, &old, new_str.as_deref().unwrap_or(""))
                    .await
            }
            EditorCommand::Insert {
                insert_line,
                new_str,
                ..
            } => {
                let line = insert_line.ok_or(EditorError::MissingParameter {
                    param: "insert_line",
                    command: "insert",
                })?;
                let text = new_str.ok_or(EditorError::MissingParameter {
                    param: "new_str",
                    command: "insert",
                })?;
                self.insert(&path, line, &text).await
            }
            EditorCommand::UndoEdit { .. } => {
                let previous = self
                    .pop_history(&path)
                    .ok_or_else(|| EditorError::NoHistory(path.display().to_string()))?;
                write_file(&path, &previous).await?;
                Ok(format!(
                    "Last edit to {} undone successfully. {}",
                    path.display(),
                    make_output(&previous, &path.display().to_string(), 1)
                ))
            }
        }
    }

    async fn str_replace(
        &self,
        path: &Path,
        old_str: &str,
        new_str: &str,
    ) -> Result<String, EditorError> {
        let content = expand_tabs(&read_file(path).await?);
        let old_str = expand_tabs(old_str);
        let new_str = expand_tabs(new_str);

        match content.matches(old_str.as_str()).count() {
            0 => {
                return Err(EditorError::NoMatch {
                    old_str,
                    path: path.display().to_string(),
                });
            }
            1 => {}
            _ => {
                let lines = content
                    .split('\n')
                    .enumerate()
                    .filter(|(_, line)| line.contains(old_str.as_str()))
                    .map(|(i, _)| i + 1)
                    .collect();
                return Err(EditorError::MultipleMatches { old_str, lines });
            }
        }

        let new_content = content.replacen(old_str.as_str(), &new_str, 1);
        write_file(path, &new_content).await?;

        let replacement_line = content
            .split(old_str.as_str())
            .next()
            .map_or(0, |before| before.matches('\n').count());
        let start = replacement_line.saturating_sub(SNIPPET_LINES);
        let end = replacement_line + SNIPPET_LINES + new_str.matches('\n').count();
        let snippet = new_content
            .split('\n')
            .skip(start)
            .take(end + 1 - start)
            .collect::<Vec<_>>()
            .join("\n");

        self.push_history(path, content);
        debug!(path = %path.display(), "File edited");

        Ok(format!(
            "The file {} has been edited. {}Review the changes and make sure they are as expected. Edit the file again if necessary.",
            path.display(),
            make_output(&snippet, &format!("a snippet of {}", path.display()), start + 1)
        ))
    }

    async fn insert(&self, path: &Path, line: i64, new_str: &str) -> Result<String, EditorError> {
        let content = expand_tabs(&read_file(path).await?);
        let new_str = expand_tabs(new_str);
        let lines: Vec<&str> = content.split('\n').collect();

        let at = usize::try_from(line)
            .ok()
            .filter(|l| *l <= lines.len())
            .ok_or(EditorError::InvalidInsertLine {
                line,
                max: lines.len(),
            })?;

        let inserted: Vec<&str> = new_str.split('\n').collect();
        let new_lines: Vec<&str> = lines[..at]
            .iter()
            .chain(&inserted)
            .chain(&lines[at..])
            .copied()
            .collect();
        let snippet: Vec<&str> = lines[at.saturating_sub(SNIPPET_LINES)..at]
            .iter()
            .chain(&inserted)
            .chain(lines[at..].iter().take(SNIPPET_LINES))
            .copied()
            .collect();

        write_file(path, &new_lines.join("\n")).await?;
        self.push_history(path, content.clone());

        Ok(format!(
            "The file {} has been edited. {}Review the changes and make sure they are as expected (correct indentation, no duplicate lines, etc). Edit the file again if necessary.",
            path.display(),
            make_output(
                &snippet.join("\n"),
                "a snippet of the edited file",
                (at + 1).saturating_sub(SNIPPET_LINES).max(1)
            )
        ))
    }
}

async fn validate_path(command: &EditorCommand, path: &Path) -> Result<(), EditorError> {
    let shown = path.display().to_string();
    if !path.is_absolute() {
        return Err(EditorError::NotAbsolute {
            suggestion: Path::new("/").join(path).display().to_string(),
            path: shown,
        });
    }
    let is_create = matches!(command, EditorCommand::Create { .. });
    let exists = tokio::fs::try_exists(path).await.unwrap_or(false);
    if !exists && !is_create {
        return Err(EditorError::NotFound(shown));
    }
    if exists && is_create {
        return Err(EditorError::AlreadyExists(shown));
    }
    if path.is_dir() && !matches!(command, EditorCommand::View { .. }) {
        return Err(EditorError::IsDirectory(shown));
    }
    Ok(())
}

async fn view(path: &Path, view_range: Option<Vec<i64>>) -> Result<String, EditorError> {
    if path.is_dir() {
        if view_range.as_ref().is_some_and(|r| !r.is_empty()) {
            return Err(EditorError::ViewRangeOnDirectory);
        }
        let mut entries = vec![path.display().to_string()];
        list_dir(path, 2, &mut entries).await?;
        return Ok(format!(
            "Here's the files and directories up to 2 levels deep in {}, excluding hidden items:\n{}\n",
            path.display(),
            entries.join("\n")
        ));
    }

    let content = read_file(path).await?;
    let Some(range) = view_range.filter(|r| !r.is_empty()) else {
        return Ok(make_output(&content, &path.display().to_string(), 1));
    };

    let [start, end] = range[..] else {
        return Err(EditorError::InvalidViewRange(format!(
            "{range:?}. It should be a list of two integers."
        )));
    };
    let lines: Vec<&str> = content.split('\n').collect();
    let n = lines.len() as i64;
    if start < 1 || start > n {
        return Err(EditorError::InvalidViewRange(format!(
            "{range:?}. Its first element `{start}` should be within the range of lines of the file: [1, {n}]"
        )));
    }
    if end > n {
        return Err(EditorError::InvalidViewRange(format!(
            "{range:?}. Its second element `{end}` should be smaller than the number of lines in the file: `{n}`"
        )));
    }
    if end != -1 && end < start {
        return Err(EditorError::InvalidViewRange(format!(
            "{range:?}. Its second element `{end}` should be larger or equal than its first `{start}`"
        )));
    }

    let from = (start - 1) as usize;
    let to = if end == -1 { lines.len() } else { end as usize };
    Ok(make_output(
        &lines[from..to].join("\n"),
        &path.display().to_string(),
        from + 1,
    ))
}

/// Non-hidden entries under `dir`, depth-first, sorted by name.
async fn list_dir(dir: &Path, depth: usize, out: &mut Vec<String>) -> Result<(), EditorError> {
    if depth == 0 {
        return Ok(());
    }
    let mut reader = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| io_error("read", dir, e))?;
    let mut children = Vec::new();
    while let Some(entry) = reader
        .next_entry()
        .await
        .map_err(|e| io_error("read", dir, e))?
    {
        if !entry.file_name().to_string_lossy().starts_with('.') {
            children.push(entry.path());
        }
    }
    children.sort();
    for child in children {
        out.push(child.display().to_string());
        if child.is_dir() {
            Box::pin(list_dir(&child, depth - 1, out)).await?;
        }
    }
    Ok(())
}

async fn read_file(path: &Path) -> Result<String, EditorError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| io_error("read", path, e))
}

async fn write_file(path: &Path, content: &str) -> Result<(), EditorError> {
    tokio::fs::write(path, content)
        .await
        .map_err(|e| io_error("write to", path, e))
}

fn io_error(action: &'static str, path: &Path, e: std::io::Error) -> EditorError {
    EditorError::Io {
        action,
        path: path.display().to_string(),
        reason: e.to_string(),
    }
}

/// Clip content longer than [`MAX_RESPONSE_LEN`] characters.
pub fn maybe_truncate(content: &str) -> String {
    match content.char_indices().nth(MAX_RESPONSE_LEN) {
        Some((cut, _)) => format!("{}{TRUNCATED_MESSAGE}", &content[..cut]),
        None => content.to_string(),
    }
}

/// Replace tabs with spaces up to the next multiple-of-8 column.
fn expand_tabs(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut column = 0;
    for c in text.chars() {
        match c {
            '\t' => {
                let pad = 8 - column % 8;
                out.extend(std::iter::repeat_n(' ', pad));
                column += pad;
            }
            '\n' | '\r' => {
                out.push(c);
                column = 0;
            }
            _ => {
                out.push(c);
                column += 1;
            }
        }
    }
    out
}

/// `cat -n` style listing.
fn make_output(content: &str, descriptor: &str, first_line: usize) -> String {
    let content = expand_tabs(&maybe_truncate(content));
    let numbered = content
        .split('\n')
        .enumerate()
        .map(|(i, line)| format!("{:6}\t{line}", i + first_line))
        .collect::<Vec<_>>()
        .join("\n");
    format!("Here's the result of running `cat -n` on {descriptor}:\n{numbered}\n")
}

#[async_trait]
impl Tool for StrReplaceEditor {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        DESCRIPTION
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": {
                    "description": "The commands to run. Allowed options are: `view`, `create`, `str_replace`, `insert`, `undo_edit`.",
                    "enum": COMMANDS,
                    "type": "string"
                },
                "path": {
                    "description": "Absolute path to file or directory.",
                    "type": "string"
                },
                "file_text": {
                    "description": "Required parameter of `create` command, with the content of the file to be created.",
                    "type": "string"
                },
                "old_str": {
                    "description": "Required parameter of `str_replace` command containing the string in `path` to replace.",
                    "type": "string"
                },
                "new_str": {
                    "description": "Optional parameter of `str_replace` command containing the new string (if not given, no string will be added). Required parameter of `insert` command containing the string to insert.",
                    "type": "string"
                },
                "insert_line": {
                    "description": "Required parameter of `insert` command. The `new_str` will be inserted AFTER the line `insert_line` of `path`.",
                    "type": "integer"
                },
                "view_range": {
                    "description": "Optional parameter of `view` command when `path` points to a file. If none is given, the full file is shown. If provided, the file will be shown in the indicated line number range, e.g. [11, 12] will show lines 11 and 12. Indexing at 1 to start. Setting `[start_line, -1]` shows all lines from `start_line` to the end of the file.",
                    "items": {"type": "integer"},
                    "type": "array"
                }
            },
            "required": ["command", "path"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let command = EditorCommand::from_arguments(arguments)?;
        let output = self.apply(command).await?;
        Ok(ToolResult::success(output))
    }
}
