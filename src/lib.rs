//! Maestro - AI 编码助手的对话编排核心
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **context**: 代码上下文收集与 prompt 增强
//! - **core**: 编排器状态机、UI 模型、后台会话驱动、错误类型
//! - **llm**: Provider 适配器抽象、重试策略与统计、带重试调用、Provider 注册表、Mock
//! - **memory**: 对话历史
//! - **observability**: tracing 初始化
//! - **tools**: 工作区与内置工具（计划、澄清、读写文件）

pub mod config;
pub mod context;
pub mod core;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod tools;

pub use crate::core::{
    spawn_conversation, Command, ConversationOrchestrator, OrchestratorState, UiModel,
};
pub use crate::llm::{ProviderRegistry, ResilientClient, RetryPolicy, RetryStatistics};
