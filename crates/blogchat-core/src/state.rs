//! UI-agnostic conversation state
//!
//! The transcript is the single source of truth for the conversation. Any UI
//! renders it as a projection and never parses text back out of what it drew.

use serde::{Deserialize, Serialize};

/// Number of messages kept as conversation context for a request.
pub const HISTORY_WINDOW: usize = 10;

/// Reserved id of the loading placeholder. Regular entries never use it.
pub const LOADING_ENTRY_ID: u64 = 0;

pub const GREETING: &str = "👋 你好！我是 AI 助手，基于 DeepSeek 模型。我可以帮助你查找和介绍博客文章，回答技术问题等。请输入你的问题！";

pub const LOADING_TEXT: &str = "正在思考...";

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// A chat message as sent to the completion endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// One rendered entry. `loading` is an explicit tag, not a text marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub id: u64,
    pub message: ChatMessage,
    pub loading: bool,
}

/// Append-only list of entries, plus at most one loading placeholder.
#[derive(Debug, Clone)]
pub struct Transcript {
    entries: Vec<Entry>,
    next_id: u64,
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new()
    }
}

impl Transcript {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_id: LOADING_ENTRY_ID + 1,
        }
    }

    /// A fresh transcript holding only the system greeting.
    pub fn with_greeting() -> Self {
        let mut transcript = Self::new();
        transcript.append(ChatRole::System, GREETING);
        transcript
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn append(&mut self, role: ChatRole, content: impl Into<String>) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push(Entry {
            id,
            message: ChatMessage::new(role, content),
            loading: false,
        });
        id
    }

    /// Show the loading placeholder, replacing any existing one.
    pub fn push_loading(&mut self) -> u64 {
        self.remove_loading();
        self.entries.push(Entry {
            id: LOADING_ENTRY_ID,
            message: ChatMessage::new(ChatRole::Assistant, LOADING_TEXT),
            loading: true,
        });
        LOADING_ENTRY_ID
    }

    /// Remove the loading placeholder. Returns whether one was present.
    pub fn remove_loading(&mut self) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != LOADING_ENTRY_ID);
        before != self.entries.len()
    }

    pub fn has_loading(&self) -> bool {
        self.entries.iter().any(|e| e.loading)
    }

    /// The last `HISTORY_WINDOW` non-system, settled messages in display order.
    pub fn history(&self) -> Vec<ChatMessage> {
        let messages: Vec<ChatMessage> = self
            .entries
            .iter()
            .filter(|e| !e.loading && e.message.role != ChatRole::System)
            .filter_map(|e| {
                let content = e.message.content.trim();
                if content.is_empty() {
                    None
                } else {
                    Some(ChatMessage::new(e.message.role, content))
                }
            })
            .collect();

        let skip = messages.len().saturating_sub(HISTORY_WINDOW);
        messages.into_iter().skip(skip).collect()
    }
}
