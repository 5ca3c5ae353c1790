//! 会话驱动：后台任务独占编排器
//!
//! UI 通过 mpsc 发送 Command，后台任务按顺序处理（保证编排器单写者），
//! 每处理完一条命令就把最新 UiModel 发到 watch 通道，UI 线程从不等待 Provider 调用。

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::core::{ConversationOrchestrator, OrchestratorState, UiModel};

/// 从 UI 发往编排器的命令
#[derive(Debug, Clone)]
pub enum Command {
    /// 按当前状态路由：AWAITING_APPROVAL 作为反馈，EXECUTING_TASK 作为执行中反馈，其余作为新 prompt
    Submit(String),
    /// 总是作为新 prompt 提交
    Prompt(String),
    Reset,
    SetProvider(String),
    SetModel(String),
    SetTemplate(String),
    Quit,
}

/// 后台会话句柄
pub struct ConversationHandle {
    pub commands: mpsc::UnboundedSender<Command>,
    pub ui: watch::Receiver<UiModel>,
    pub task: JoinHandle<()>,
}

/// 启动后台任务；命令通道关闭或收到 Quit 时结束
pub fn spawn_conversation(mut orchestrator: ConversationOrchestrator) -> ConversationHandle {
    let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel::<Command>();
    let (ui_tx, ui_rx) = watch::channel(orchestrator.ui_model().clone());

    let task = tokio::spawn(async move {
        while let Some(cmd) = cmd_rx.recv().await {
            if matches!(cmd, Command::Quit) {
                break;
            }
            if let Command::Submit(_) | Command::Prompt(_) = &cmd {
                // 先让 UI 看到输入已锁定
                let mut busy = orchestrator.ui_model().clone();
                busy.ai_processing = true;
                let _ = ui_tx.send(busy);
            }
            handle_command(&mut orchestrator, cmd).await;
            let _ = ui_tx.send(orchestrator.ui_model().clone());
        }
        tracing::debug!("conversation driver stopped");
    });

    ConversationHandle {
        commands: cmd_tx,
        ui: ui_rx,
        task,
    }
}

async fn handle_command(orchestrator: &mut ConversationOrchestrator, cmd: Command) {
    match cmd {
        Command::Submit(text) => match orchestrator.state() {
            OrchestratorState::AwaitingApproval => {
                orchestrator.submit_feedback(&text).await;
            }
            OrchestratorState::ExecutingTask => {
                orchestrator.submit_feedback_during_execution(&text).await;
            }
            _ => {
                orchestrator.submit_prompt(&text).await;
            }
        },
        Command::Prompt(text) => {
            orchestrator.submit_prompt(&text).await;
        }
        Command::Reset => orchestrator.reset_state(),
        Command::SetProvider(name) => {
            let message = match orchestrator.registry().set_active(&name) {
                Ok(()) => format!("Switched provider to {}", name),
                Err(e) => e.to_string(),
            };
            orchestrator.post_system_message(message);
        }
        Command::SetModel(id) => {
            let message = match orchestrator.registry().set_current_model(&id) {
                Ok(info) => format!("Switched model to {}", info.id),
                Err(e) => e.to_string(),
            };
            orchestrator.post_system_message(message);
        }
        Command::SetTemplate(id) => {
            let message = match orchestrator.registry().set_current_template(&id) {
                Ok(()) => format!("Switched template to {}", id),
                Err(e) => e.to_string(),
            };
            orchestrator.post_system_message(message);
        }
        Command::Quit => {}
    }
}
