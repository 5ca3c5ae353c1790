//! Mock Provider（用于测试与离线运行，无需 API）
//!
//! 按脚本依次返回预置的响应或错误；脚本用完后回显最后一条 User 消息，便于本地跑通整条链路。

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::{
    policy_from_options, CompletionResponse, ModelInfo, ProviderAdapter, ProviderError,
    ProviderOptions, RetryPolicy, ToolDefinition,
};
use crate::memory::{Message, Role};

#[derive(Debug)]
struct MockState {
    script: VecDeque<Result<CompletionResponse, ProviderError>>,
    models: Vec<ModelInfo>,
    current_model: usize,
    templates: Vec<String>,
    current_template: Option<String>,
    options: ProviderOptions,
    retry_policy: Option<RetryPolicy>,
    initialized: bool,
    reject_initialize: bool,
    last_messages: Vec<Message>,
    last_tools: Vec<String>,
}

/// Mock 适配器：脚本化响应 + 调用计数
#[derive(Debug)]
pub struct MockProvider {
    name: String,
    state: Mutex<MockState>,
    calls: AtomicUsize,
}

impl MockProvider {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let models = vec![
            ModelInfo::new("mock-small", &name)
                .with_capability("tools", "full")
                .with_context_window(8_192),
            ModelInfo::new("mock-large", &name)
                .with_capability("tools", "full")
                .with_capability("embeddings", "full")
                .with_context_window(128_000),
        ];
        Self {
            state: Mutex::new(MockState {
                script: VecDeque::new(),
                models,
                current_model: 0,
                templates: vec!["default".to_string(), "code".to_string()],
                current_template: Some("default".to_string()),
                options: ProviderOptions::default(),
                retry_policy: None,
                initialized: false,
                reject_initialize: false,
                last_messages: Vec::new(),
                last_tools: Vec::new(),
            }),
            name,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_models(self, models: Vec<ModelInfo>) -> Self {
        {
            let mut state = self.lock();
            state.models = models;
            state.current_model = 0;
        }
        self
    }

    pub fn with_templates(self, templates: Vec<String>) -> Self {
        {
            let mut state = self.lock();
            state.current_template = templates.first().cloned();
            state.templates = templates;
        }
        self
    }

    pub fn with_retry_policy(self, policy: RetryPolicy) -> Self {
        self.lock().retry_policy = Some(policy);
        self
    }

    /// initialize 将返回 false
    pub fn rejecting_initialize(self) -> Self {
        self.lock().reject_initialize = true;
        self
    }

    pub fn push_response(&self, response: CompletionResponse) {
        self.lock().script.push_back(Ok(response));
    }

    pub fn push_text(&self, content: impl Into<String>) {
        self.push_response(CompletionResponse::text(content));
    }

    pub fn push_error(&self, error: ProviderError) {
        self.lock().script.push_back(Err(error));
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn is_initialized(&self) -> bool {
        self.lock().initialized
    }

    /// 最近一次请求携带的消息
    pub fn last_messages(&self) -> Vec<Message> {
        self.lock().last_messages.clone()
    }

    /// 最近一次请求声明的工具名
    pub fn last_tool_names(&self) -> Vec<String> {
        self.lock().last_tools.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl ProviderAdapter for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn initialize(&self, options: &ProviderOptions) -> bool {
        let mut state = self.lock();
        if state.reject_initialize {
            return false;
        }
        state.options = options.clone();
        state.initialized = true;
        true
    }

    fn list_models(&self) -> Vec<ModelInfo> {
        self.lock().models.clone()
    }

    fn current_model_info(&self) -> ModelInfo {
        let state = self.lock();
        state
            .models
            .get(state.current_model)
            .cloned()
            .unwrap_or_default()
    }

    fn set_current_model(&self, model_id: &str) -> bool {
        let mut state = self.lock();
        match state.models.iter().position(|m| m.id == model_id) {
            Some(index) => {
                state.current_model = index;
                true
            }
            None => false,
        }
    }

    async fn send_completion_request(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<CompletionResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.lock();
        state.last_messages = messages.to_vec();
        state.last_tools = tools.iter().map(|t| t.name.clone()).collect();

        if let Some(next) = state.script.pop_front() {
            return next;
        }

        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or("(no input)");
        Ok(CompletionResponse::text(format!("Echo from Mock: {}", last_user)))
    }

    async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        // 按字节分桶的确定性向量
        let mut vector = vec![0f32; 16];
        for (i, b) in text.bytes().enumerate() {
            vector[i % 16] += f32::from(b) / 255.0;
        }
        Ok(vector)
    }

    fn options(&self) -> ProviderOptions {
        self.lock().options.clone()
    }

    fn set_options(&self, options: ProviderOptions) {
        self.lock().options = options;
    }

    fn supports_capability(&self, capability: &str) -> bool {
        let state = self.lock();
        state
            .models
            .get(state.current_model)
            .map(|m| m.capabilities.contains_key(capability))
            .unwrap_or(false)
    }

    fn current_template(&self) -> Option<String> {
        self.lock().current_template.clone()
    }

    fn set_current_template(&self, template_id: &str) -> bool {
        let mut state = self.lock();
        if state.templates.iter().any(|t| t == template_id) {
            state.current_template = Some(template_id.to_string());
            true
        } else {
            false
        }
    }

    fn available_templates(&self) -> Vec<String> {
        self.lock().templates.clone()
    }

    fn retry_policy(&self) -> RetryPolicy {
        let state = self.lock();
        match &state.retry_policy {
            Some(policy) => policy.clone(),
            None => policy_from_options(&state.options),
        }
    }
}
