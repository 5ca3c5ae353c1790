//! 对话历史
//!
//! 只追加的消息序列，下标 0 永远是 System 消息；重置时截断回仅剩 System 消息，供 Provider 请求与 UI 渲染使用。

use serde::{Deserialize, Serialize};

/// 消息角色（与 LLM API 一致）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

/// 单条消息；Tool 消息的 name 为对应的工具名
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            name: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            name: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            name: None,
        }
    }

    pub fn tool(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            name: Some(name.into()),
        }
    }
}

/// 对话历史：构造时写入 System 消息，之后只追加；truncate_to_system 回到初始状态
#[derive(Clone, Debug)]
pub struct ConversationHistory {
    messages: Vec<Message>,
}

impl ConversationHistory {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::system(system_prompt)],
        }
    }

    pub fn push(&mut self, msg: Message) {
        self.messages.push(msg);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn system_message(&self) -> &Message {
        &self.messages[0]
    }

    /// 丢弃除 System 以外的所有消息
    pub fn truncate_to_system(&mut self) {
        self.messages.truncate(1);
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// 历史至少含 System 消息，永不为空
    pub fn is_empty(&self) -> bool {
        false
    }

    /// 统计指定角色的消息数
    pub fn count_role(&self, role: Role) -> usize {
        self.messages.iter().filter(|m| m.role == role).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_starts_with_system() {
        let history = ConversationHistory::new("You are helpful.");
        assert_eq!(history.len(), 1);
        assert_eq!(history.system_message().role, Role::System);
    }

    #[test]
    fn test_truncate_keeps_system_only() {
        let mut history = ConversationHistory::new("sys");
        history.push(Message::user("hi"));
        history.push(Message::assistant("hello"));
        history.push(Message::tool("write_file_content", "{\"ok\":true}"));
        assert_eq!(history.len(), 4);

        history.truncate_to_system();
        assert_eq!(history.len(), 1);
        assert_eq!(history.messages()[0].content, "sys");
    }

    #[test]
    fn test_tool_message_carries_name() {
        let msg = Message::tool("propose_plan", "done");
        assert_eq!(msg.role, Role::Tool);
        assert_eq!(msg.name.as_deref(), Some("propose_plan"));
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&Message::user("x")).unwrap();
        assert!(json.contains("\"role\":\"user\""));
        assert!(!json.contains("name"));
    }
}
