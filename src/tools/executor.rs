//! 工具执行器
//!
//! 持有 ToolRegistry 与超时，dispatch(call) 解析模型给出的参数文本并在超时内执行对应工具；
//! 每次调用输出一条结构化审计日志（JSON）。

use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::time::timeout;
use uuid::Uuid;

use crate::core::ToolError;
use crate::llm::{ToolCall, ToolDefinition};
use crate::tools::{ToolFailure, ToolOutput, ToolRegistry};

/// 工具执行器：解析参数、施加超时、记录审计日志
pub struct ToolExecutor {
    registry: ToolRegistry,
    timeout: Duration,
}

impl ToolExecutor {
    pub fn new(registry: ToolRegistry, timeout_secs: u64) -> Self {
        Self {
            registry,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// 执行一次工具调用；参数文本为空视为 `{}`
    pub async fn dispatch(&self, call: &ToolCall) -> Result<ToolOutput, ToolFailure> {
        let start = Instant::now();
        let result = match parse_arguments(call) {
            Ok(args) => match timeout(self.timeout, self.registry.execute(&call.name, args)).await {
                Ok(r) => r,
                Err(_) => Err(ToolError::ExecutionFailed(format!(
                    "{} timed out after {}s",
                    call.name,
                    self.timeout.as_secs()
                ))
                .into()),
            },
            Err(e) => Err(e.into()),
        };

        let outcome = match &result {
            Ok(_) => "ok",
            Err(f) if matches!(f.error, ToolError::UnknownTool(_)) => "unknown_tool",
            Err(_) => "error",
        };
        let call_id = if call.id.is_empty() {
            Uuid::new_v4().to_string()
        } else {
            call.id.clone()
        };
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": call.name,
            "call_id": call_id,
            "ok": result.is_ok(),
            "outcome": outcome,
            "duration_ms": start.elapsed().as_millis() as u64,
            "args_preview": args_preview(&call.arguments),
        });
        tracing::info!(audit = %audit.to_string(), "tool");

        result
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.registry.definitions()
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.registry.tool_names()
    }
}

fn parse_arguments(call: &ToolCall) -> Result<Value, ToolError> {
    if call.arguments.trim().is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_str(&call.arguments).map_err(|e| ToolError::InvalidArguments {
        tool: call.name.clone(),
        message: e.to_string(),
    })
}

fn args_preview(args: &str) -> String {
    if args.chars().count() > 200 {
        format!("{}...", args.chars().take(200).collect::<String>())
    } else {
        args.to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tempfile::TempDir;

    use super::*;
    use crate::tools::{FsWorkspace, WriteFileTool};

    fn executor(dir: &TempDir) -> ToolExecutor {
        let mut registry = ToolRegistry::new();
        registry.register(WriteFileTool::new(Arc::new(FsWorkspace::new(dir.path()))));
        ToolExecutor::new(registry, 5)
    }

    #[tokio::test]
    async fn test_malformed_arguments() {
        let dir = TempDir::new().unwrap();
        let exec = executor(&dir);
        let call = ToolCall::new("c1", "write_file_content", "{not json");
        let failure = exec.dispatch(&call).await.unwrap_err();
        assert!(matches!(failure.error, ToolError::InvalidArguments { .. }));
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let dir = TempDir::new().unwrap();
        let exec = executor(&dir);
        let call = ToolCall::new("c1", "launch_rocket", "{}");
        let failure = exec.dispatch(&call).await.unwrap_err();
        assert_eq!(failure.error, ToolError::UnknownTool("launch_rocket".into()));
    }

    #[test]
    fn test_args_preview_truncates() {
        let long = "a".repeat(250);
        assert_eq!(args_preview(&long).len(), 203);
    }
}
