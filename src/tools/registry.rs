//! 工具注册表
//!
//! 所有工具实现 Tool trait（name / description / parameters_schema / execute），由 ToolRegistry 按名注册与查找，
//! 每轮请求前通过 definitions() 生成向模型声明的 ToolDefinition 列表。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::core::{FileUpdate, Sender, ToolError};
use crate::llm::ToolDefinition;

/// 工具执行成功的结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolOutput {
    /// 写入 TOOL 消息、下一轮回传给模型的内容
    pub content: String,
    /// 需要展示在聊天记录中的消息
    pub chat: Vec<(Sender, String)>,
    pub files: Vec<FileUpdate>,
    pub status: Option<String>,
}

impl ToolOutput {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn with_chat(mut self, sender: Sender, text: impl Into<String>) -> Self {
        self.chat.push((sender, text.into()));
        self
    }

    pub fn with_file(mut self, update: FileUpdate) -> Self {
        self.files.push(update);
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }
}

/// 工具执行失败：错误 + 失败时也要反映到 UI 的文件状态
#[derive(Debug, Clone, PartialEq)]
pub struct ToolFailure {
    pub error: ToolError,
    pub files: Vec<FileUpdate>,
}

impl ToolFailure {
    pub fn with_file(mut self, update: FileUpdate) -> Self {
        self.files.push(update);
        self
    }
}

impl From<ToolError> for ToolFailure {
    fn from(error: ToolError) -> Self {
        Self {
            error,
            files: Vec::new(),
        }
    }
}

impl std::fmt::Display for ToolFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.error.fmt(f)
    }
}

/// 工具 trait：名称、描述（供模型理解）、参数 schema、异步执行（args 为 JSON）
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// 参数 JSON Schema，默认无参数
    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput, ToolFailure>;

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            schema: self.parameters_schema().to_string(),
        }
    }
}

/// 工具注册表：按名称存储 Arc<dyn Tool>，definitions() 保持注册顺序
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: impl Tool + 'static) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), Arc::new(tool)).is_none() {
            self.order.push(name);
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub async fn execute(&self, name: &str, args: Value) -> Result<ToolOutput, ToolFailure> {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        tool.execute(args).await
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.order.clone()
    }

    /// 本轮向模型声明的工具
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| tool.definition())
            .collect()
    }
}

/// 把 JSON 参数反序列化为工具的参数结构
pub(crate) fn parse_args<T: serde::de::DeserializeOwned>(
    tool: &str,
    args: Value,
) -> Result<T, ToolFailure> {
    serde_json::from_value(args).map_err(|e| {
        ToolFailure::from(ToolError::InvalidArguments {
            tool: tool.to_string(),
            message: e.to_string(),
        })
    })
}
