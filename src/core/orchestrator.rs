//! 对话编排器：状态机
//!
//! 接收用户输入，维护消息历史，可选地用代码上下文增强 prompt，经 ProviderRegistry 发请求，
//! 解释响应（纯文本 / 工具调用），驱动工作区写入并更新 UiModel。
//!
//! 编排器是单写者（方法取 &mut self），自身不做重试；重试发生在下一层的 ResilientClient。
//! 本轮失败后需要显式 reset_state，或由下一次 submit_prompt 隐式重置。

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::context::{ContextError, ContextOptions, ContextProvider, ContextRequest};
use crate::core::{OrchestratorState, UiModel};
use crate::llm::{CompletionResponse, ProviderRegistry};
use crate::memory::{ConversationHistory, Message};
use crate::tools::ToolExecutor;

const RECOVERY_NOTICE: &str = "Recovering from previous error. Starting a fresh request.";

struct ContextAttachment {
    provider: Arc<dyn ContextProvider>,
    options: ContextOptions,
    enabled: bool,
}

/// 对话编排器
pub struct ConversationOrchestrator {
    registry: Arc<ProviderRegistry>,
    tools: ToolExecutor,
    history: ConversationHistory,
    ui: UiModel,
    state: OrchestratorState,
    context: Option<ContextAttachment>,
    focus: ContextRequest,
}

impl ConversationOrchestrator {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        tools: ToolExecutor,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            tools,
            history: ConversationHistory::new(system_prompt),
            ui: UiModel::new(),
            state: OrchestratorState::Idle,
            context: None,
            focus: ContextRequest::default(),
        }
    }

    /// 挂接上下文协作者（默认启用）
    pub fn with_context_provider(
        mut self,
        provider: Arc<dyn ContextProvider>,
        options: ContextOptions,
    ) -> Self {
        self.context = Some(ContextAttachment {
            provider,
            options,
            enabled: true,
        });
        self
    }

    pub fn set_context_enabled(&mut self, enabled: bool) {
        if let Some(ctx) = self.context.as_mut() {
            ctx.enabled = enabled;
        }
    }

    /// 更新编辑器焦点（当前文件、光标、选中文本），下一轮增强时使用
    pub fn set_editor_focus(&mut self, focus: ContextRequest) {
        self.focus = focus;
    }

    pub fn state(&self) -> OrchestratorState {
        self.state
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    pub fn ui_model(&self) -> &UiModel {
        &self.ui
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    /// 在聊天记录中追加一条 System 消息（如切换 Provider 的结果）
    pub fn post_system_message(&mut self, text: impl Into<String>) {
        self.ui.add_system(text);
    }

    /// 新一轮请求。处于 AI_ERROR 时先把历史截断到 system 消息并提示恢复。
    pub async fn submit_prompt(&mut self, text: &str) -> OrchestratorState {
        if self.state == OrchestratorState::AiError {
            self.history.truncate_to_system();
            self.ui.add_system(RECOVERY_NOTICE);
            tracing::info!("implicit reset after AI error");
        }
        self.ui.add_user(text);
        self.send_user_turn(text, "AI is processing your request...")
            .await
    }

    /// 对计划 / 回答的反馈；不在 AWAITING_APPROVAL 时退化为 submit_prompt
    pub async fn submit_feedback(&mut self, text: &str) -> OrchestratorState {
        if self.state != OrchestratorState::AwaitingApproval {
            tracing::debug!(state = %self.state, "feedback outside approval, treating as prompt");
            return self.submit_prompt(text).await;
        }
        self.ui.add_user(text);
        self.send_user_turn(text, "Processing your feedback...").await
    }

    /// 执行阶段的反馈；不在 EXECUTING_TASK 时退化为 submit_prompt
    pub async fn submit_feedback_during_execution(&mut self, text: &str) -> OrchestratorState {
        if self.state != OrchestratorState::ExecutingTask {
            tracing::debug!(state = %self.state, "execution feedback outside task, treating as prompt");
            return self.submit_prompt(text).await;
        }
        self.ui.add_user(text);
        self.send_user_turn(text, "Continuing the task with your feedback...")
            .await
    }

    /// 解释一次响应：API_ERROR 直接进入 AI_ERROR；成功则记录 assistant 消息并按声明顺序调度工具调用
    pub async fn process_response(&mut self, response: CompletionResponse) -> OrchestratorState {
        if !response.is_success() {
            self.fail(response.error_message.clone());
            return self.state;
        }

        self.history.push(Message::assistant(response.content.clone()));
        if !response.content.trim().is_empty() {
            self.ui.add_ai(response.content.clone());
        }

        if response.tool_calls.is_empty() {
            self.transition(OrchestratorState::AwaitingApproval);
            self.ui
                .set_status("AI responded. Please review and reply.");
            return self.state;
        }

        let mut failures = Vec::new();
        for call in &response.tool_calls {
            match self.tools.dispatch(call).await {
                Ok(output) => {
                    for (sender, text) in output.chat {
                        self.ui.add_message(sender, text);
                    }
                    for update in output.files {
                        self.ui.upsert_file(update);
                    }
                    if let Some(status) = output.status {
                        self.ui.set_status(status);
                    }
                    self.history.push(Message::tool(&call.name, output.content));
                }
                Err(failure) => {
                    tracing::warn!(tool = %call.name, error = %failure, "tool call failed");
                    for update in failure.files {
                        self.ui.upsert_file(update);
                    }
                    self.history
                        .push(Message::tool(&call.name, format!("Error: {}", failure.error)));
                    failures.push(format!("{}: {}", call.name, failure.error));
                }
            }
        }

        if failures.is_empty() {
            self.transition(OrchestratorState::ExecutingTask);
        } else {
            self.transition(OrchestratorState::AiError);
            self.ui
                .add_system(format!("Tool execution failed: {}", failures.join("; ")));
            self.ui.set_status("One or more tool calls failed.");
        }
        self.state
    }

    /// 无条件回到 IDLE，历史只保留 system 消息
    pub fn reset_state(&mut self) {
        self.history.truncate_to_system();
        self.transition(OrchestratorState::Idle);
        self.ui.ai_processing = false;
        self.ui.set_status("Ready");
        self.ui.add_system("Conversation reset.");
        tracing::info!("conversation reset");
    }

    async fn send_user_turn(&mut self, text: &str, status: &str) -> OrchestratorState {
        let content = self.enrich(text);
        self.history.push(Message::user(content));
        self.transition(OrchestratorState::AwaitingAiResponse);
        self.ui.ai_processing = true;
        self.ui.set_status(status);

        let tools = self.tools.definitions();
        let result = self
            .registry
            .send_completion_request(self.history.messages(), &tools)
            .await;

        // 失败时已追加的 user 消息保留在历史中
        match result {
            Ok(response) => {
                self.process_response(response).await;
            }
            Err(e) => self.fail(e.to_string()),
        }
        self.ui.ai_processing = false;
        self.state
    }

    /// 上下文增强；任何失败（包括协作者 panic）都退回原始 prompt
    fn enrich(&self, text: &str) -> String {
        let Some(ctx) = self.context.as_ref().filter(|c| c.enabled) else {
            return text.to_string();
        };
        let result = catch_unwind(AssertUnwindSafe(|| -> Result<String, ContextError> {
            let context = ctx.provider.get_context(&self.focus, &ctx.options)?;
            ctx.provider
                .generate_contextual_prompt(text, &context, &ctx.options)
        }));
        match result {
            Ok(Ok(prompt)) => prompt,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "context enrichment failed, using raw prompt");
                text.to_string()
            }
            Err(_) => {
                tracing::warn!("context provider panicked, using raw prompt");
                text.to_string()
            }
        }
    }

    fn fail(&mut self, message: String) {
        tracing::warn!(error = %message, "turn failed");
        self.transition(OrchestratorState::AiError);
        self.ui.add_system(message);
        self.ui.set_status("Error from AI.");
        self.ui.ai_processing = false;
    }

    fn transition(&mut self, next: OrchestratorState) {
        if self.state != next {
            tracing::debug!(from = %self.state, to = %next, "state transition");
        }
        self.state = next;
        self.ui.state = next;
    }
}
