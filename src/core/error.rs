//! 注册表与工具调度的错误类型
//!
//! 这些错误都以 Result 值跨越模块边界；编排器把它们转成一条 System 聊天消息加 AI_ERROR 状态。

use thiserror::Error;

/// ProviderRegistry 的错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    #[error("Provider not registered: {0}")]
    NotRegistered(String),

    #[error("No active provider")]
    NoActiveProvider,

    #[error("Unknown {what}: {id}")]
    NotFound { what: &'static str, id: String },

    #[error("Provider initialization failed: {0}")]
    InitializationFailed(String),

    /// 重试耗尽后的底层失败（如 embedding 请求）
    #[error("Provider error: {0}")]
    Provider(String),
}

/// 单个工具调用的失败
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments for {tool}: {message}")]
    InvalidArguments { tool: String, message: String },

    #[error("Tool execution failed: {0}")]
    ExecutionFailed(String),

    #[error(transparent)]
    Workspace(#[from] WorkspaceError),
}

/// 工作区读写错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WorkspaceError {
    #[error("Path escape attempt: {0}")]
    PathEscape(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("IO error on {path}: {message}")]
    Io { path: String, message: String },
}

impl WorkspaceError {
    pub fn io(path: impl Into<String>, err: std::io::Error) -> Self {
        WorkspaceError::Io {
            path: path.into(),
            message: err.to_string(),
        }
    }
}
