//! Error taxonomy for the chat core.
//!
//! Every variant carries a message that is already fit to show to the user,
//! since the session surfaces errors inline in the conversation.

use thiserror::Error;

/// Message used when the completion endpoint answers 200 without any choice.
pub const BAD_FORMAT_MESSAGE: &str = "API 返回格式错误";

#[derive(Debug, Error)]
pub enum ChatError {
    /// The credential is missing. Never retried, never sent over the wire.
    #[error("{0}")]
    Configuration(String),

    /// Transport failure or a non-2xx answer from the completion endpoint.
    #[error("{0}")]
    Network(String),

    /// The endpoint answered successfully but the body had no usable choice.
    #[error("{0}")]
    Format(String),

    /// The feed could not be fetched or parsed. Logged and swallowed.
    #[error("failed to load feed: {0}")]
    FeedLoad(String),
}

impl ChatError {
    pub fn bad_format() -> Self {
        ChatError::Format(BAD_FORMAT_MESSAGE.to_string())
    }

    /// Build the error for a non-2xx response.
    ///
    /// `body` is the raw response text; when it holds `{"error":{"message":..}}`
    /// that message wins, otherwise the status line is used.
    pub fn from_status(status: u16, reason: &str, body: &str) -> Self {
        let structured = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| {
                v.get("error")
                    .and_then(|e| e.get("message"))
                    .and_then(|m| m.as_str())
                    .map(str::to_string)
            })
            .filter(|m| !m.is_empty());

        match structured {
            Some(message) => ChatError::Network(message),
            None => ChatError::Network(format!("HTTP {}: {}", status, reason)),
        }
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        ChatError::Network(err.to_string())
    }
}
