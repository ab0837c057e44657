//! File saver tool: write or append text to a local file.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use taskloom_core::error::ToolError;
use taskloom_core::tool::{Tool, ToolResult};
use tokio::io::AsyncWriteExt;

pub const NAME: &str = "file_saver";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum SaveMode {
    #[default]
    #[serde(rename = "w")]
    Write,
    #[serde(rename = "a")]
    Append,
}

#[derive(Debug, Deserialize)]
struct SaveArgs {
    content: String,
    file_path: String,
    #[serde(default)]
    mode: SaveMode,
}

#[derive(Debug, Default)]
pub struct FileSaver;

async fn save(path: &Path, content: &str, mode: SaveMode) -> std::io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .append(mode == SaveMode::Append)
        .truncate(mode == SaveMode::Write)
        .open(path)
        .await?;
    file.write_all(content.as_bytes()).await?;
    file.flush().await
}

#[async_trait]
impl Tool for FileSaver {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Save content to a local file at a specified path.
Use this tool when you need to save text, code, or generated content to a file on the local filesystem.
The tool accepts content and a file path, and saves the content to that location."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "content": {
                    "type": "string",
                    "description": "(required) The content to save to the file."
                },
                "file_path": {
                    "type": "string",
                    "description": "(required) The path where the file should be saved, including filename and extension."
                },
                "mode": {
                    "type": "string",
                    "description": "(optional) The file opening mode. Default is 'w' for write. Use 'a' for append.",
                    "enum": ["w", "a"],
                    "default": "w"
                }
            },
            "required": ["content", "file_path"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let args: SaveArgs = serde_json::from_value(arguments)
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;

        match save(Path::new(&args.file_path), &args.content, args.mode).await {
            Ok(()) => Ok(ToolResult::success(format!(
                "Content successfully saved to {}",
                args.file_path
            ))),
            Err(e) => Ok(ToolResult::failure(format!("Error saving file: {e}"))),
        }
    }
}
