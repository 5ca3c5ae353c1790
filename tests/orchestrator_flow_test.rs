//! 编排器状态机集成测试：Mock Provider + 临时工作区

use std::sync::Arc;
use std::time::Duration;

use maestro::context::{
    CodeContext, ContextError, ContextOptions, ContextProvider, ContextRequest,
    WorkspaceContextProvider,
};
use maestro::core::{ConversationOrchestrator, FileStatus, OrchestratorState, Sender};
use maestro::llm::{
    CompletionResponse, MockProvider, ProviderError, ProviderRegistry, RetryPolicy,
    RetryStatistics, ToolCall,
};
use maestro::memory::Role;
use maestro::tools::{default_registry, FsWorkspace, ToolExecutor, Workspace};
use tempfile::TempDir;

struct Harness {
    dir: TempDir,
    workspace: Arc<FsWorkspace>,
    mock: Arc<MockProvider>,
    registry: Arc<ProviderRegistry>,
    orchestrator: ConversationOrchestrator,
}

fn harness() -> Harness {
    let dir = TempDir::new().unwrap();
    let workspace = Arc::new(FsWorkspace::new(dir.path()));
    let registry = Arc::new(ProviderRegistry::new(Arc::new(RetryStatistics::new())));
    let mock = Arc::new(MockProvider::new("mock"));
    registry.register_instance("mock", mock.clone()).unwrap();
    registry.set_active("mock").unwrap();
    registry
        .set_retry_policy(
            "mock",
            RetryPolicy::default()
                .with_backoff(Duration::from_millis(100), Duration::from_secs(5), 2.0)
                .with_jitter(0.0),
        )
        .unwrap();
    let tools = ToolExecutor::new(default_registry(workspace.clone()), 5);
    let orchestrator = ConversationOrchestrator::new(registry.clone(), tools, "You are a coder.");
    Harness {
        dir,
        workspace,
        mock,
        registry,
        orchestrator,
    }
}

#[tokio::test]
async fn test_plain_reply_awaits_approval_and_grows_history_by_two() {
    let mut h = harness();
    h.mock.push_text("Here is my plan.");
    let before = h.orchestrator.history().len();

    let state = h.orchestrator.submit_prompt("Build a greeter").await;

    assert_eq!(state, OrchestratorState::AwaitingApproval);
    assert_eq!(h.orchestrator.history().len(), before + 2);
    let messages = h.orchestrator.history().messages();
    assert_eq!(messages[1].role, Role::User);
    assert_eq!(messages[2].role, Role::Assistant);
    assert_eq!(messages[2].content, "Here is my plan.");
    assert!(!h.orchestrator.ui_model().ai_processing);
}

#[tokio::test]
async fn test_resubmit_after_error_truncates_history() {
    let mut h = harness();
    h.mock
        .push_error(ProviderError::from_status(401, "Invalid API key"));
    let state = h.orchestrator.submit_prompt("first").await;
    assert_eq!(state, OrchestratorState::AiError);
    // user 消息不回滚
    assert_eq!(h.orchestrator.history().len(), 2);
    let ui = h.orchestrator.ui_model();
    assert_eq!(ui.last_chat().unwrap().sender, Sender::System);
    assert_eq!(ui.last_chat().unwrap().text, "Invalid API key");

    h.mock.push_text("recovered");
    let state = h.orchestrator.submit_prompt("second").await;
    assert_eq!(state, OrchestratorState::AwaitingApproval);

    // 请求发出时历史只有 system + 新的 user
    let sent = h.mock.last_messages();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].role, Role::System);
    assert_eq!(sent[1].content, "second");
    assert_eq!(h.orchestrator.history().len(), 3);
}

#[tokio::test]
async fn test_unknown_tool_and_write_file_marks_turn_failed() {
    let mut h = harness();
    h.mock.push_response(CompletionResponse::with_tool_calls(
        "Writing files",
        vec![
            ToolCall::new("call_1", "compile_project", "{}"),
            ToolCall::new(
                "call_2",
                "write_file_content",
                r#"{"filename": "src/main.rs", "content": "fn main() {}\n"}"#,
            ),
        ],
    ));

    let state = h.orchestrator.submit_prompt("go").await;

    assert_eq!(state, OrchestratorState::AiError);
    assert_eq!(h.orchestrator.history().count_role(Role::Tool), 2);
    assert!(h.workspace.file_exists("src/main.rs"));
    assert!(h.dir.path().join("src/main.rs").is_file());
    let file = h.orchestrator.ui_model().file("src/main.rs").unwrap();
    assert_eq!(file.status, FileStatus::Generated);

    let tool_messages: Vec<_> = h
        .orchestrator
        .history()
        .messages()
        .iter()
        .filter(|m| m.role == Role::Tool)
        .collect();
    assert_eq!(tool_messages[0].name.as_deref(), Some("compile_project"));
    assert!(tool_messages[0].content.contains("Unknown tool"));
    assert_eq!(tool_messages[1].name.as_deref(), Some("write_file_content"));
}

#[tokio::test]
async fn test_tool_outcomes_are_sent_on_next_turn() {
    let mut h = harness();
    h.mock.push_response(CompletionResponse::with_tool_calls(
        "",
        vec![ToolCall::new(
            "call_1",
            "propose_plan",
            r#"{"project_name": "Greeter", "language": "Rust", "description": "hello",
                "files": [{"filename": "src/main.rs", "description": "entry"}],
                "steps": ["write main"]}"#,
        )],
    ));
    h.mock.push_text("ok");

    assert_eq!(
        h.orchestrator.submit_prompt("plan it").await,
        OrchestratorState::ExecutingTask
    );
    assert_eq!(
        h.orchestrator.ui_model().file("src/main.rs").unwrap().status,
        FileStatus::Planned
    );
    assert_eq!(h.mock.last_tool_names().len(), 5);

    h.orchestrator
        .submit_feedback_during_execution("looks good")
        .await;
    let sent = h.mock.last_messages();
    assert!(sent.iter().any(|m| m.role == Role::Tool && m.content.contains("Greeter")));
}

#[tokio::test(start_paused = true)]
async fn test_transient_failures_are_invisible_to_orchestrator() {
    let mut h = harness();
    h.mock.push_error(ProviderError::rate_limited("429 Too Many Requests"));
    h.mock.push_error(ProviderError::server("503 Service Unavailable"));
    h.mock.push_text("finally");

    let state = h.orchestrator.submit_prompt("hello").await;

    assert_eq!(state, OrchestratorState::AwaitingApproval);
    assert_eq!(h.mock.call_count(), 3);
    let stats = h.registry.statistics().snapshot();
    assert_eq!(stats.successful_retried_requests, 1);
    assert_eq!(stats.total_retry_attempts, 2);
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_retries_surface_annotated_error() {
    let mut h = harness();
    for _ in 0..4 {
        h.mock.push_error(ProviderError::server("Internal Server Error"));
    }
    let state = h.orchestrator.submit_prompt("hello").await;
    assert_eq!(state, OrchestratorState::AiError);
    assert_eq!(
        h.orchestrator.ui_model().last_chat().unwrap().text,
        "Internal Server Error (Retried 3 times)"
    );
    assert_eq!(h.registry.statistics().snapshot().failed_after_retries, 1);
}

#[tokio::test]
async fn test_reset_returns_to_idle() {
    let mut h = harness();
    h.mock.push_text("plan");
    h.orchestrator.submit_prompt("x").await;
    h.orchestrator.reset_state();
    assert_eq!(h.orchestrator.state(), OrchestratorState::Idle);
    assert_eq!(h.orchestrator.history().len(), 1);
    assert_eq!(h.orchestrator.ui_model().state, OrchestratorState::Idle);
}

struct FailingContext;

impl ContextProvider for FailingContext {
    fn get_context(
        &self,
        _request: &ContextRequest,
        _options: &ContextOptions,
    ) -> Result<CodeContext, ContextError> {
        Err(ContextError::Unavailable("index not built".into()))
    }

    fn generate_contextual_prompt(
        &self,
        prompt: &str,
        _context: &CodeContext,
        _options: &ContextOptions,
    ) -> Result<String, ContextError> {
        Ok(prompt.to_string())
    }
}

struct PanickingContext;

impl ContextProvider for PanickingContext {
    fn get_context(
        &self,
        _request: &ContextRequest,
        _options: &ContextOptions,
    ) -> Result<CodeContext, ContextError> {
        panic!("context bug")
    }

    fn generate_contextual_prompt(
        &self,
        prompt: &str,
        _context: &CodeContext,
        _options: &ContextOptions,
    ) -> Result<String, ContextError> {
        Ok(prompt.to_string())
    }
}

#[tokio::test]
async fn test_context_failures_fall_back_to_raw_prompt() {
    for provider in [
        Arc::new(FailingContext) as Arc<dyn ContextProvider>,
        Arc::new(PanickingContext) as Arc<dyn ContextProvider>,
    ] {
        let h = harness();
        let mut orchestrator = h
            .orchestrator
            .with_context_provider(provider, ContextOptions::default());
        h.mock.push_text("ok");
        let state = orchestrator.submit_prompt("raw prompt").await;
        assert_eq!(state, OrchestratorState::AwaitingApproval);
        assert_eq!(orchestrator.history().messages()[1].content, "raw prompt");
    }
}

#[tokio::test]
async fn test_context_enrichment_adds_code() {
    let h = harness();
    h.workspace
        .write_file("src/lib.rs", "pub fn greet() -> &'static str {\n    \"hi\"\n}\n")
        .unwrap();
    let mut orchestrator = h.orchestrator.with_context_provider(
        Arc::new(WorkspaceContextProvider::new(h.workspace.clone())),
        ContextOptions::default(),
    );
    orchestrator.set_editor_focus(ContextRequest::at("src/lib.rs", 2, 5));
    h.mock.push_text("ok");

    orchestrator.submit_prompt("rename greet").await;
    let user = &orchestrator.history().messages()[1].content;
    assert!(user.starts_with("rename greet"));
    assert!(user.contains("## Relevant code context"));
    assert!(user.contains("pub fn greet()"));

    orchestrator.set_context_enabled(false);
    h.mock.push_text("ok");
    orchestrator.submit_feedback("plain").await;
    assert_eq!(orchestrator.history().last().unwrap().role, Role::Assistant);
    assert_eq!(orchestrator.history().messages()[3].content, "plain");
}
