//! Maestro 命令行入口
//!
//! 初始化日志、加载配置、组装 Provider 注册表 / 工具 / 编排器，并运行一个按行读取的 REPL：
//! 普通输入按当前状态作为 prompt 或反馈提交；`/reset`、`/stats`、`/provider <name>`、
//! `/model <id>`、`/template <id>`、`/quit` 为控制命令。

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use maestro::config::{load_config, AppConfig};
use maestro::context::WorkspaceContextProvider;
use maestro::core::{spawn_conversation, Command, ConversationOrchestrator, Sender, UiModel};
use maestro::llm::{
    MockProvider, ProviderAdapter, ProviderRegistry, ResilientClient, RetryStatistics,
};
use maestro::tools::{default_registry, FsWorkspace, ToolExecutor};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    maestro::observability::init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let cfg = load_config(config_path).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        AppConfig::default()
    });

    let stats = Arc::new(RetryStatistics::new());
    let orchestrator = build_orchestrator(&cfg, stats.clone())?;
    let handle = spawn_conversation(orchestrator);
    let mut ui = handle.ui.clone();

    let mut printed = 0;
    print_new_entries(&ui.borrow(), &mut printed);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let command = match parse_command(line) {
            Some(ReplAction::Send(cmd)) => cmd,
            Some(ReplAction::Stats) => {
                print!("{}", stats.report());
                continue;
            }
            Some(ReplAction::Quit) => break,
            None => {
                println!("Unknown command: {}", line);
                continue;
            }
        };

        handle
            .commands
            .send(command)
            .context("Conversation driver stopped")?;
        wait_until_idle(&mut ui).await?;
        let model = ui.borrow().clone();
        print_new_entries(&model, &mut printed);
        println!("[{}] {}", model.state, model.global_status);
    }

    let _ = handle.commands.send(Command::Quit);
    handle.task.await.context("Conversation driver panicked")?;
    Ok(())
}

fn build_orchestrator(
    cfg: &AppConfig,
    stats: Arc<RetryStatistics>,
) -> anyhow::Result<ConversationOrchestrator> {
    let workspace_root = cfg
        .app
        .workspace_root
        .clone()
        .unwrap_or_else(|| PathBuf::from("workspace"));
    std::fs::create_dir_all(&workspace_root)
        .with_context(|| format!("Failed to create {}", workspace_root.display()))?;
    let workspace = Arc::new(FsWorkspace::new(&workspace_root));

    let client = ResilientClient::new(stats).with_retries_enabled(cfg.retry.enabled);
    let registry = Arc::new(ProviderRegistry::with_client(client));
    registry.register_adapter("mock", || -> Arc<dyn ProviderAdapter> {
        Arc::new(MockProvider::new("mock"))
    })?;
    registry.set_retry_policy("mock", cfg.retry.to_policy())?;
    registry.initialize_adapter("mock", &cfg.provider.to_options(&cfg.retry))?;

    if let Err(e) = registry.set_active(&cfg.provider.active) {
        tracing::warn!("{}; falling back to mock provider", e);
        registry.set_active("mock")?;
    }
    if let Some(model) = &cfg.provider.model {
        registry.set_current_model(model)?;
    }
    if let Some(template) = &cfg.provider.template {
        registry.set_current_template(template)?;
    }
    tracing::info!(
        provider = ?registry.active_name(),
        workspace = %workspace_root.display(),
        "maestro ready"
    );

    let tools = ToolExecutor::new(
        default_registry(workspace.clone()),
        cfg.provider.tool_timeout_secs,
    );
    let mut orchestrator =
        ConversationOrchestrator::new(registry, tools, cfg.app.system_prompt.clone())
            .with_context_provider(
                Arc::new(WorkspaceContextProvider::new(workspace)),
                cfg.context.to_options(),
            );
    orchestrator.set_context_enabled(cfg.context.enabled);
    Ok(orchestrator)
}

enum ReplAction {
    Send(Command),
    Stats,
    Quit,
}

fn parse_command(line: &str) -> Option<ReplAction> {
    if !line.starts_with('/') {
        return Some(ReplAction::Send(Command::Submit(line.to_string())));
    }
    let (name, arg) = match line.split_once(' ') {
        Some((name, arg)) => (name, arg.trim().to_string()),
        None => (line, String::new()),
    };
    let action = match (name, arg.is_empty()) {
        ("/reset", _) => ReplAction::Send(Command::Reset),
        ("/stats", _) => ReplAction::Stats,
        ("/quit", _) | ("/exit", _) => ReplAction::Quit,
        ("/provider", false) => ReplAction::Send(Command::SetProvider(arg)),
        ("/model", false) => ReplAction::Send(Command::SetModel(arg)),
        ("/template", false) => ReplAction::Send(Command::SetTemplate(arg)),
        _ => return None,
    };
    Some(action)
}

/// 等到驱动发布一个非处理中的 UiModel
async fn wait_until_idle(ui: &mut watch::Receiver<UiModel>) -> anyhow::Result<()> {
    loop {
        ui.changed().await.context("Conversation driver stopped")?;
        if !ui.borrow_and_update().ai_processing {
            return Ok(());
        }
    }
}

fn print_new_entries(model: &UiModel, printed: &mut usize) {
    for entry in model.chat.iter().skip(*printed) {
        let who = match entry.sender {
            Sender::User => continue,
            Sender::Ai => "AI",
            Sender::System => "System",
        };
        println!("{} [{}]: {}", entry.timestamp.format("%H:%M:%S"), who, entry.text);
    }
    *printed = model.chat.len();
}
