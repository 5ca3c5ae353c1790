//! Provider 请求 / 响应数据类型

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// 模型信息（来自 Provider 的模型目录）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
    pub provider: String,
    pub version: String,
    /// 能力名 -> 支持程度（如 "tools" -> "full"）
    pub capabilities: BTreeMap<String, String>,
    pub is_local: bool,
    pub context_window_size: usize,
    pub additional_info: BTreeMap<String, String>,
}

impl ModelInfo {
    pub fn new(id: impl Into<String>, provider: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            provider: provider.into(),
            ..Self::default()
        }
    }

    pub fn with_capability(mut self, name: impl Into<String>, level: impl Into<String>) -> Self {
        self.capabilities.insert(name.into(), level.into());
        self
    }

    pub fn with_context_window(mut self, tokens: usize) -> Self {
        self.context_window_size = tokens;
        self
    }
}

/// Provider 选项；网络相关字段同时决定默认的 RetryPolicy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderOptions {
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub temperature: f32,
    pub max_tokens: u32,
    /// 使用的 prompt 模板 ID
    pub template_id: Option<String>,
    /// Provider 私有选项（api_key、base_url 等）
    pub additional: BTreeMap<String, String>,
}

impl Default for ProviderOptions {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_retries: 3,
            retry_delay_ms: 1000,
            temperature: 0.7,
            max_tokens: 2000,
            template_id: None,
            additional: BTreeMap::new(),
        }
    }
}

/// 本轮向模型声明的工具；schema 为参数的 JSON Schema 文本
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub schema: String,
}

/// 模型返回的工具调用；arguments 为未解析的 JSON 文本
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionStatus {
    Success,
    ApiError,
}

/// 一次请求的不可变结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub status: CompletionStatus,
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    pub error_message: String,
    pub metadata: BTreeMap<String, String>,
}

impl CompletionResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            status: CompletionStatus::Success,
            content: content.into(),
            tool_calls: Vec::new(),
            error_message: String::new(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls,
            ..Self::text(content)
        }
    }

    pub fn api_error(message: impl Into<String>) -> Self {
        Self {
            status: CompletionStatus::ApiError,
            content: String::new(),
            tool_calls: Vec::new(),
            error_message: message.into(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == CompletionStatus::Success
    }
}
