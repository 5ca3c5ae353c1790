//! Provider 适配器抽象
//!
//! 每个后端（OpenAI 兼容 / 本地模型 / Mock）实现 ProviderAdapter，以名字注册进 ProviderRegistry。
//! 适配器以 Arc 共享，状态变更（当前模型、模板、选项）走内部可变性。

use std::time::Duration;

use async_trait::async_trait;

use crate::llm::{
    CompletionResponse, ModelInfo, ProviderError, ProviderOptions, RetryPolicy, ToolDefinition,
};
use crate::memory::Message;

/// 后端适配器 trait
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// 展示用名称
    fn name(&self) -> &str;

    /// 用选项初始化；失败返回 false
    fn initialize(&self, options: &ProviderOptions) -> bool;

    fn list_models(&self) -> Vec<ModelInfo>;

    fn current_model_info(&self) -> ModelInfo;

    /// 切换当前模型；id 不在目录中时返回 false
    fn set_current_model(&self, model_id: &str) -> bool;

    /// 单次远程调用，不含重试（重试由上层 ResilientClient 负责）
    async fn send_completion_request(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<CompletionResponse, ProviderError>;

    async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>, ProviderError>;

    fn options(&self) -> ProviderOptions;

    fn set_options(&self, options: ProviderOptions);

    fn supports_capability(&self, capability: &str) -> bool;

    fn current_template(&self) -> Option<String>;

    fn set_current_template(&self, template_id: &str) -> bool;

    fn available_templates(&self) -> Vec<String>;

    /// 默认按选项生成重试策略，见 [`policy_from_options`]
    fn retry_policy(&self) -> RetryPolicy {
        policy_from_options(&self.options())
    }
}

/// 由选项中的 max_retries / retry_delay_ms 生成重试策略，其余字段取默认值
pub fn policy_from_options(options: &ProviderOptions) -> RetryPolicy {
    let defaults = RetryPolicy::default();
    RetryPolicy::default()
        .with_max_retries(options.max_retries)
        .with_backoff(
            Duration::from_millis(options.retry_delay_ms),
            defaults.max_backoff,
            defaults.backoff_factor,
        )
}
