//! 写文件工具 - write_file_content
//!
//! 把模型生成的文件内容写入工作区；新文件标记 GENERATED，覆盖已有文件标记 MODIFIED，写入失败标记 ERROR。

use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use crate::core::{preview_content, FileStatus, FileUpdate, Sender, ToolError};
use crate::tools::registry::parse_args;
use crate::tools::{schema_value, Tool, ToolFailure, ToolOutput, Workspace};

pub const WRITE_FILE_TOOL: &str = "write_file_content";

#[derive(Debug, Deserialize, JsonSchema)]
pub struct WriteFileArgs {
    /// 工作区内的相对路径，如 src/main.rs
    pub filename: String,
    /// 完整文件内容
    pub content: String,
    /// 文件用途说明
    #[serde(default)]
    pub description: Option<String>,
}

pub struct WriteFileTool {
    workspace: Arc<dyn Workspace>,
}

impl WriteFileTool {
    pub fn new(workspace: Arc<dyn Workspace>) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        WRITE_FILE_TOOL
    }

    fn description(&self) -> &str {
        "Write the complete content of one project file into the workspace. \
         Parent directories are created automatically; an existing file is overwritten."
    }

    fn parameters_schema(&self) -> Value {
        schema_value::<WriteFileArgs>()
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput, ToolFailure> {
        let args: WriteFileArgs = parse_args(WRITE_FILE_TOOL, args)?;
        let description = args.description.unwrap_or_default();
        tracing::info!(file = %args.filename, bytes = args.content.len(), "write_file_content");

        let existed = self.workspace.file_exists(&args.filename);
        if let Err(e) = self.workspace.write_file(&args.filename, &args.content) {
            return Err(ToolFailure::from(ToolError::from(e))
                .with_file(FileUpdate::new(&args.filename, FileStatus::Error)));
        }

        let status = if existed {
            FileStatus::Modified
        } else {
            FileStatus::Generated
        };
        let mut output = ToolOutput::new(format!(
            "File {} saved successfully ({} bytes)",
            args.filename,
            args.content.len()
        ))
        .with_chat(
            Sender::Ai,
            format!("I've generated the contents for **{}**:", args.filename),
        )
        .with_chat(
            Sender::Ai,
            format!("```\n{}\n```", preview_content(&args.content)),
        );
        if !description.is_empty() {
            output = output.with_chat(Sender::Ai, format!("**File Description**: {}", description));
        }
        Ok(output
            .with_chat(
                Sender::System,
                format!("Editor: File {} saved successfully.", args.filename),
            )
            .with_file(FileUpdate::new(&args.filename, status).with_description(description))
            .with_status(format!("{} generated successfully.", args.filename)))
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::tools::FsWorkspace;

    #[tokio::test]
    async fn test_generated_then_modified() {
        let dir = TempDir::new().unwrap();
        let ws = Arc::new(FsWorkspace::new(dir.path()));
        let tool = WriteFileTool::new(ws.clone());

        let out = tool
            .execute(serde_json::json!({"filename": "src/lib.rs", "content": "pub fn a() {}"}))
            .await
            .unwrap();
        assert_eq!(out.files[0].status, FileStatus::Generated);
        assert_eq!(ws.read_file("src/lib.rs").unwrap(), "pub fn a() {}");

        let out = tool
            .execute(serde_json::json!({
                "filename": "src/lib.rs",
                "content": "pub fn b() {}",
                "description": "library root"
            }))
            .await
            .unwrap();
        assert_eq!(out.files[0].status, FileStatus::Modified);
        assert!(out.chat.iter().any(|(_, t)| t == "**File Description**: library root"));
    }

    #[tokio::test]
    async fn test_write_failure_marks_error() {
        let dir = TempDir::new().unwrap();
        let tool = WriteFileTool::new(Arc::new(FsWorkspace::new(dir.path())));
        let failure = tool
            .execute(serde_json::json!({"filename": "../escape.rs", "content": "x"}))
            .await
            .unwrap_err();
        assert_eq!(failure.files[0].status, FileStatus::Error);
        assert!(matches!(failure.error, ToolError::Workspace(_)));
    }

    #[tokio::test]
    async fn test_missing_content_is_invalid() {
        let dir = TempDir::new().unwrap();
        let tool = WriteFileTool::new(Arc::new(FsWorkspace::new(dir.path())));
        let failure = tool
            .execute(serde_json::json!({"filename": "a.rs"}))
            .await
            .unwrap_err();
        assert!(matches!(failure.error, ToolError::InvalidArguments { .. }));
    }
}
