//! 状态定义：编排器状态机与 UI 可观察模型
//!
//! UI 只读取 UiModel（聊天记录、文件状态、全局状态文本、处理中标记）；
//! 编排器是唯一写者，每次状态变化后整体克隆一份发给 UI。

use chrono::{DateTime, Utc};
use serde::Serialize;

/// 编排器状态，任一时刻只有一个值
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrchestratorState {
    Idle,
    AwaitingAiResponse,
    AwaitingApproval,
    ExecutingTask,
    AiError,
}

impl OrchestratorState {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrchestratorState::Idle => "IDLE",
            OrchestratorState::AwaitingAiResponse => "AWAITING_AI_RESPONSE",
            OrchestratorState::AwaitingApproval => "AWAITING_APPROVAL",
            OrchestratorState::ExecutingTask => "EXECUTING_TASK",
            OrchestratorState::AiError => "AI_ERROR",
        }
    }
}

impl std::fmt::Display for OrchestratorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 聊天记录发送方
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Sender {
    User,
    Ai,
    System,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChatEntry {
    pub sender: Sender,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// 文件生成状态
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FileStatus {
    Planned,
    Generating,
    Generated,
    Modified,
    Error,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProjectFile {
    pub filename: String,
    pub status: FileStatus,
    pub description: String,
}

/// 工具执行产生的文件状态更新
#[derive(Clone, Debug, PartialEq)]
pub struct FileUpdate {
    pub filename: String,
    pub status: FileStatus,
    /// 为空时保留已有描述
    pub description: String,
}

impl FileUpdate {
    pub fn new(filename: impl Into<String>, status: FileStatus) -> Self {
        Self {
            filename: filename.into(),
            status,
            description: String::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

pub const WELCOME_MESSAGE: &str =
    "Welcome! Describe what you want to build and the assistant will plan and write it.";

/// UI 可观察状态
#[derive(Clone, Debug, Serialize)]
pub struct UiModel {
    pub state: OrchestratorState,
    pub chat: Vec<ChatEntry>,
    pub files: Vec<ProjectFile>,
    pub global_status: String,
    pub ai_processing: bool,
}

impl Default for UiModel {
    fn default() -> Self {
        let mut model = Self {
            state: OrchestratorState::Idle,
            chat: Vec::new(),
            files: Vec::new(),
            global_status: "Ready".to_string(),
            ai_processing: false,
        };
        model.add_system(WELCOME_MESSAGE);
        model
    }
}

impl UiModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_message(&mut self, sender: Sender, text: impl Into<String>) {
        self.chat.push(ChatEntry {
            sender,
            text: text.into(),
            timestamp: Utc::now(),
        });
    }

    pub fn add_user(&mut self, text: impl Into<String>) {
        self.add_message(Sender::User, text);
    }

    pub fn add_ai(&mut self, text: impl Into<String>) {
        self.add_message(Sender::Ai, text);
    }

    pub fn add_system(&mut self, text: impl Into<String>) {
        self.add_message(Sender::System, text);
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.global_status = status.into();
    }

    /// 按文件名更新状态；不存在则追加
    pub fn upsert_file(&mut self, update: FileUpdate) {
        match self.files.iter_mut().find(|f| f.filename == update.filename) {
            Some(file) => {
                file.status = update.status;
                if !update.description.is_empty() {
                    file.description = update.description;
                }
            }
            None => self.files.push(ProjectFile {
                filename: update.filename,
                status: update.status,
                description: update.description,
            }),
        }
    }

    pub fn file(&self, filename: &str) -> Option<&ProjectFile> {
        self.files.iter().find(|f| f.filename == filename)
    }

    pub fn last_chat(&self) -> Option<&ChatEntry> {
        self.chat.last()
    }

    pub fn count_sender(&self, sender: Sender) -> usize {
        self.chat.iter().filter(|c| c.sender == sender).count()
    }
}

const PREVIEW_LIMIT: usize = 300;

/// 文件内容预览：超过 300 字符时截到其后第一个换行处，并附 "... (file continues)"
pub fn preview_content(content: &str) -> String {
    if content.chars().count() <= PREVIEW_LIMIT {
        return content.to_string();
    }
    let limit_byte = content
        .char_indices()
        .nth(PREVIEW_LIMIT)
        .map(|(i, _)| i)
        .unwrap_or(content.len());
    let cutoff = content[limit_byte..]
        .find('\n')
        .map(|offset| limit_byte + offset)
        .unwrap_or(limit_byte);
    format!("{}\n... (file continues)", &content[..cutoff])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_model_has_welcome() {
        let model = UiModel::new();
        assert_eq!(model.chat.len(), 1);
        assert_eq!(model.chat[0].sender, Sender::System);
        assert_eq!(model.state, OrchestratorState::Idle);
        assert!(!model.ai_processing);
    }

    #[test]
    fn test_upsert_file_keeps_description() {
        let mut model = UiModel::new();
        model.upsert_file(FileUpdate::new("main.rs", FileStatus::Planned).with_description("entry"));
        model.upsert_file(FileUpdate::new("main.rs", FileStatus::Generated));
        assert_eq!(model.files.len(), 1);
        let file = model.file("main.rs").unwrap();
        assert_eq!(file.status, FileStatus::Generated);
        assert_eq!(file.description, "entry");
    }

    #[test]
    fn test_preview_cuts_on_line_boundary() {
        let short = "fn main() {}";
        assert_eq!(preview_content(short), short);

        let line = "x".repeat(99);
        let long = vec![line.clone(); 5].join("\n");
        let preview = preview_content(&long);
        assert!(preview.ends_with("\n... (file continues)"));
        let kept = preview.trim_end_matches("\n... (file continues)");
        assert_eq!(kept, vec![line; 4].join("\n"));
    }

    #[test]
    fn test_preview_without_newline_cuts_at_limit() {
        let long = "y".repeat(400);
        let preview = preview_content(&long);
        assert_eq!(preview, format!("{}\n... (file continues)", "y".repeat(300)));
    }

    #[test]
    fn test_state_display() {
        assert_eq!(OrchestratorState::AiError.to_string(), "AI_ERROR");
    }
}
