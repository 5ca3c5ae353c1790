//! 读文件 / 列文件工具：read_file_content、list_workspace_files

use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use crate::core::ToolError;
use crate::tools::registry::parse_args;
use crate::tools::{schema_value, Tool, ToolFailure, ToolOutput, Workspace};

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ReadFileArgs {
    /// 工作区内的相对路径
    pub filename: String,
}

pub struct ReadFileTool {
    workspace: Arc<dyn Workspace>,
}

impl ReadFileTool {
    pub fn new(workspace: Arc<dyn Workspace>) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file_content"
    }

    fn description(&self) -> &str {
        "Read the current content of a workspace file."
    }

    fn parameters_schema(&self) -> Value {
        schema_value::<ReadFileArgs>()
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput, ToolFailure> {
        let args: ReadFileArgs = parse_args(self.name(), args)?;
        tracing::info!(file = %args.filename, "read_file_content");
        let content = self
            .workspace
            .read_file(&args.filename)
            .map_err(ToolError::from)?;
        Ok(ToolOutput::new(content))
    }
}

pub struct ListFilesTool {
    workspace: Arc<dyn Workspace>,
}

impl ListFilesTool {
    pub fn new(workspace: Arc<dyn Workspace>) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for ListFilesTool {
    fn name(&self) -> &str {
        "list_workspace_files"
    }

    fn description(&self) -> &str {
        "List all files in the workspace, one relative path per line."
    }

    async fn execute(&self, _args: Value) -> Result<ToolOutput, ToolFailure> {
        let files = self.workspace.list_files().map_err(ToolError::from)?;
        if files.is_empty() {
            return Ok(ToolOutput::new("(workspace is empty)"));
        }
        Ok(ToolOutput::new(files.join("\n")))
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::tools::FsWorkspace;

    #[tokio::test]
    async fn test_read_and_list() {
        let dir = TempDir::new().unwrap();
        let ws = Arc::new(FsWorkspace::new(dir.path()));
        let list = ListFilesTool::new(ws.clone());
        assert_eq!(
            list.execute(Value::Null).await.unwrap().content,
            "(workspace is empty)"
        );

        ws.write_file("b.txt", "bee").unwrap();
        ws.write_file("a/c.txt", "sea").unwrap();
        assert_eq!(list.execute(Value::Null).await.unwrap().content, "a/c.txt\nb.txt");

        let read = ReadFileTool::new(ws);
        let out = read
            .execute(serde_json::json!({"filename": "a/c.txt"}))
            .await
            .unwrap();
        assert_eq!(out.content, "sea");
        assert!(read
            .execute(serde_json::json!({"filename": "missing"}))
            .await
            .is_err());
    }
}
