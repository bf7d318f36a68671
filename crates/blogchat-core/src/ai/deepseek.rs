use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;
use crate::config::ChatSettings;
use crate::error::ChatError;
use crate::state::{ChatMessage, ChatRole};

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f64,
    max_tokens: u32,
    stream: bool,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: Option<CompletionMessage>,
}

#[derive(Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

/// Assemble the request messages.
///
/// The system prompt is inserted first unless the history already holds a
/// system message; the new user message always goes last.
pub fn build_payload(history: Vec<ChatMessage>, system_prompt: &str, user_message: &str) -> Vec<ChatMessage> {
    let mut messages = history;

    if !messages.iter().any(|m| m.role == ChatRole::System) {
        messages.insert(0, ChatMessage::new(ChatRole::System, system_prompt));
    }

    messages.push(ChatMessage::new(ChatRole::User, user_message));
    messages
}

/// Client for an OpenAI-compatible chat completion endpoint.
#[derive(Clone)]
pub struct DeepSeekClient {
    client: Client,
    endpoint: String,
}

impl DeepSeekClient {
    pub fn new(endpoint: &str) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.to_string(),
        }
    }

    /// One POST, no retry. Resolves with the first choice's text.
    pub async fn complete(
        &self,
        api_key: &str,
        settings: &ChatSettings,
        messages: &[ChatMessage],
    ) -> Result<String, ChatError> {
        let request = CompletionRequest {
            model: &settings.model,
            messages,
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            stream: false,
        };

        debug!(model = %settings.model, messages = messages.len(), "sending completion request");

        let response = self.client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let reason = status.canonical_reason().unwrap_or("");
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::from_status(status.as_u16(), reason, &body));
        }

        let body = response.text().await?;
        let parsed: CompletionResponse =
            serde_json::from_str(&body).map_err(|_| ChatError::bad_format())?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .map(|m| m.content.unwrap_or_default())
            .ok_or_else(ChatError::bad_format)
    }
}
