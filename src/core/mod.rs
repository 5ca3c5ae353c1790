//! 核心编排层：错误类型、状态与 UI 模型、对话编排器、后台会话驱动

pub mod error;
pub mod orchestrator;
pub mod runtime;
pub mod state;

pub use error::{RegistryError, ToolError, WorkspaceError};
pub use orchestrator::ConversationOrchestrator;
pub use runtime::{spawn_conversation, Command, ConversationHandle};
pub use state::{
    preview_content, ChatEntry, FileStatus, FileUpdate, OrchestratorState, ProjectFile, Sender,
    UiModel, WELCOME_MESSAGE,
};
