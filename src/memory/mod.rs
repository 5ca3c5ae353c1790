//! 记忆层：对话历史（进程内，不跨重启持久化）

pub mod conversation;

pub use conversation::{ConversationHistory, Message, Role};
