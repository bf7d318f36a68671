//! The chat session: one widget instance's state and its send cycle.
//!
//! A UI drives the session either through [`ChatSession::send`] (one linear
//! async call) or, when it must keep drawing while the request is in flight,
//! through [`ChatSession::begin_send`] / [`ChatSession::finish_send`] with the
//! request executed elsewhere.

use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use crate::ai::{build_payload, DeepSeekClient};
use crate::config::{ChatSettings, Config};
use crate::error::ChatError;
use crate::feed::{PostCache, PostSummary};
use crate::prompt::build_system_prompt;
use crate::state::{ChatMessage, ChatRole, Transcript};

pub const TOAST_DURATION: Duration = Duration::from_secs(2);
pub const MISSING_KEY_MESSAGE: &str = "API Key 未配置，请联系网站管理员";
pub const CLEAR_CONFIRM_PROMPT: &str = "确定要清空所有对话吗？";
pub const ERROR_PREFIX: &str = "❌ 错误: ";
pub const FALLBACK_ERROR_MESSAGE: &str = "请求失败，请稍后重试";
const CLEARED_MESSAGE: &str = "对话已清空";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendState {
    Idle,
    Sending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Info,
    Success,
    Error,
}

/// A short notification shown outside the conversation.
#[derive(Debug, Clone)]
pub struct Toast {
    pub text: String,
    pub level: ToastLevel,
    pub shown_at: Instant,
}

impl Toast {
    pub fn new(text: impl Into<String>, level: ToastLevel) -> Self {
        Self {
            text: text.into(),
            level,
            shown_at: Instant::now(),
        }
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.shown_at) >= TOAST_DURATION
    }
}

/// Everything needed to perform one completion call off the UI thread.
#[derive(Clone)]
pub struct PendingRequest {
    pub client: DeepSeekClient,
    pub api_key: String,
    pub settings: ChatSettings,
    pub messages: Vec<ChatMessage>,
}

impl PendingRequest {
    pub async fn execute(self) -> Result<String, ChatError> {
        self.client
            .complete(&self.api_key, &self.settings, &self.messages)
            .await
    }
}

/// Result of one send attempt.
#[derive(Debug)]
pub enum SendOutcome {
    /// Blank input; nothing changed.
    Ignored,
    /// A request is already in flight.
    Busy,
    /// Refused before any network activity.
    Rejected(ChatError),
    Answered(String),
    Failed(ChatError),
}

pub struct ChatSession {
    config: Config,
    posts: PostCache,
    client: DeepSeekClient,
    transcript: Transcript,
    state: SendState,
    toast: Option<Toast>,
    confirming_clear: bool,
}

impl ChatSession {
    pub fn new(config: Config, posts: PostCache) -> Self {
        let client = DeepSeekClient::new(config.endpoint());
        Self {
            config,
            posts,
            client,
            transcript: Transcript::with_greeting(),
            state: SendState::Idle,
            toast: None,
            confirming_clear: false,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn posts(&self) -> &PostCache {
        &self.posts
    }

    /// Replace the post cache once the feed finishes loading.
    pub fn set_posts(&mut self, posts: PostCache) {
        self.posts = posts;
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn state(&self) -> SendState {
        self.state
    }

    pub fn is_sending(&self) -> bool {
        self.state == SendState::Sending
    }

    pub fn toast(&self) -> Option<&Toast> {
        self.toast.as_ref()
    }

    pub fn show_toast(&mut self, text: impl Into<String>, level: ToastLevel) {
        self.toast = Some(Toast::new(text, level));
    }

    /// Drop the toast once its display time has passed.
    pub fn expire_toast(&mut self, now: Instant) {
        if self.toast.as_ref().is_some_and(|t| t.is_expired(now)) {
            self.toast = None;
        }
    }

    pub fn system_prompt(&self) -> String {
        build_system_prompt(self.posts.get_all_posts(), self.config.site_origin())
    }

    pub fn search_posts(&self, query: &str) -> Vec<&PostSummary> {
        self.posts.search(query)
    }

    /// Idle → Sending. Records the user message, shows the loading
    /// placeholder and returns the request to run.
    pub fn begin_send(&mut self, input: &str) -> Result<PendingRequest, SendOutcome> {
        let message = input.trim();
        if message.is_empty() {
            return Err(SendOutcome::Ignored);
        }
        if self.is_sending() {
            return Err(SendOutcome::Busy);
        }

        let Some(api_key) = self.config.api_key().map(str::to_string) else {
            warn!("send attempted without an API key");
            self.show_toast(MISSING_KEY_MESSAGE, ToastLevel::Error);
            return Err(SendOutcome::Rejected(ChatError::Configuration(
                MISSING_KEY_MESSAGE.to_string(),
            )));
        };

        // History is taken before the new message lands in the transcript;
        // the payload appends it exactly once.
        let history = self.transcript.history();
        let messages = build_payload(history, &self.system_prompt(), message);

        self.transcript.append(ChatRole::User, message);
        self.transcript.push_loading();
        self.state = SendState::Sending;

        Ok(PendingRequest {
            client: self.client.clone(),
            api_key,
            settings: self.config.settings(),
            messages,
        })
    }

    /// Sending → Idle. Replaces the placeholder with the answer or an error.
    pub fn finish_send(&mut self, result: Result<String, ChatError>) -> SendOutcome {
        self.transcript.remove_loading();
        self.state = SendState::Idle;

        match result {
            Ok(answer) => {
                info!(chars = answer.chars().count(), "received answer");
                self.transcript.append(ChatRole::Assistant, answer.as_str());
                SendOutcome::Answered(answer)
            }
            Err(e) => {
                error!(error = %e, "completion request failed");
                self.transcript.append(ChatRole::Assistant, error_text(&e));
                SendOutcome::Failed(e)
            }
        }
    }

    /// One full send cycle.
    pub async fn send(&mut self, input: &str) -> SendOutcome {
        let request = match self.begin_send(input) {
            Ok(request) => request,
            Err(outcome) => return outcome,
        };
        let result = request.execute().await;
        self.finish_send(result)
    }

    /// Append a locally generated listing of posts matching `query`.
    pub fn show_search(&mut self, query: &str) {
        let hits = self.search_posts(query);
        let text = if hits.is_empty() {
            format!("没有找到与“{}”相关的文章", query.trim())
        } else {
            let origin = self.config.site_origin();
            let mut text = format!("找到 {} 篇相关文章：", hits.len());
            for (i, post) in hits.iter().enumerate() {
                text.push_str(&format!("\n{}. **{}** {}{}", i + 1, post.title, origin, post.link));
            }
            text
        };
        self.transcript.append(ChatRole::Assistant, text);
    }

    pub fn request_clear(&mut self) {
        self.confirming_clear = true;
    }

    pub fn is_confirming_clear(&self) -> bool {
        self.confirming_clear
    }

    pub fn cancel_clear(&mut self) {
        self.confirming_clear = false;
    }

    /// Reset to the greeting. Only acts after `request_clear`.
    pub fn confirm_clear(&mut self) -> bool {
        if !self.confirming_clear {
            return false;
        }
        self.confirming_clear = false;
        self.transcript = Transcript::with_greeting();
        self.show_toast(CLEARED_MESSAGE, ToastLevel::Info);
        true
    }
}

/// The text shown in the conversation for a failed send.
pub fn error_text(err: &ChatError) -> String {
    let message = err.to_string();
    if message.trim().is_empty() {
        format!("{}{}", ERROR_PREFIX, FALLBACK_ERROR_MESSAGE)
    } else {
        format!("{}{}", ERROR_PREFIX, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::GREETING;

    fn config_for(server_url: &str, api_key: Option<&str>) -> Config {
        Config {
            api_key: api_key.map(str::to_string),
            endpoint: Some(format!("{}/v1/chat/completions", server_url)),
            ..Config::default()
        }
    }

    fn posts() -> PostCache {
        PostCache::from_posts(vec![PostSummary {
            title: "LRU 缓存".to_string(),
            link: "/2023/lru/".to_string(),
            description: "cache eviction".to_string(),
            content: String::new(),
        }])
    }

    fn last_text(session: &ChatSession) -> &str {
        &session.transcript().entries().last().unwrap().message.content
    }

    #[tokio::test]
    async fn missing_key_makes_no_request_and_raises_toast() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .expect(0)
            .create_async()
            .await;

        let mut session = ChatSession::new(config_for(&server.url(), None), posts());
        let outcome = session.send("hello").await;

        assert!(matches!(outcome, SendOutcome::Rejected(ChatError::Configuration(_))));
        let toast = session.toast().unwrap();
        assert_eq!(toast.text, MISSING_KEY_MESSAGE);
        assert_eq!(toast.level, ToastLevel::Error);
        assert_eq!(session.transcript().len(), 1);
        assert_eq!(session.state(), SendState::Idle);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn server_error_is_shown_inline() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(500)
            .with_body(r#"{"error":{"message":"overloaded"}}"#)
            .create_async()
            .await;

        let mut session = ChatSession::new(config_for(&server.url(), Some("sk")), posts());
        let outcome = session.send("hello").await;

        assert!(matches!(outcome, SendOutcome::Failed(ChatError::Network(_))));
        assert_eq!(last_text(&session), "❌ 错误: overloaded");
        assert!(!session.transcript().has_loading());
        assert_eq!(session.state(), SendState::Idle);
    }

    #[tokio::test]
    async fn empty_choices_is_reported_as_format_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_body(r#"{"choices":[]}"#)
            .create_async()
            .await;

        let mut session = ChatSession::new(config_for(&server.url(), Some("sk")), posts());
        let outcome = session.send("hello").await;

        assert!(matches!(outcome, SendOutcome::Failed(ChatError::Format(_))));
        assert_eq!(last_text(&session), "❌ 错误: API 返回格式错误");
    }

    #[tokio::test]
    async fn answer_replaces_placeholder() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_body(r#"{"choices":[{"message":{"content":"**LRU** 是一种缓存淘汰策略"}}]}"#)
            .create_async()
            .await;

        let mut session = ChatSession::new(config_for(&server.url(), Some("sk")), posts());
        let outcome = session.send("  什么是 LRU?  ").await;

        assert!(matches!(outcome, SendOutcome::Answered(_)));
        let entries = session.transcript().entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[1].message, ChatMessage::new(ChatRole::User, "什么是 LRU?"));
        assert_eq!(entries[2].message.role, ChatRole::Assistant);
        assert!(!session.transcript().has_loading());
    }

    #[test]
    fn every_payload_has_exactly_one_leading_system_message() {
        let config = Config {
            api_key: Some("sk".to_string()),
            ..Config::default()
        };
        let mut session = ChatSession::new(config, posts());

        for i in 0..12 {
            let request = session.begin_send(&format!("question {}", i)).ok().unwrap();
            let systems = request.messages.iter().filter(|m| m.role == ChatRole::System).count();
            assert_eq!(systems, 1);
            assert_eq!(request.messages[0].role, ChatRole::System);
            assert!(request.messages[0].content.contains("1. LRU 缓存"));

            let last = request.messages.last().unwrap();
            assert_eq!(last, &ChatMessage::new(ChatRole::User, format!("question {}", i)));
            let users = request
                .messages
                .iter()
                .filter(|m| m.content == format!("question {}", i))
                .count();
            assert_eq!(users, 1);
            assert!(request.messages.len() <= 1 + 10 + 1);

            session.finish_send(Ok(format!("answer {}", i)));
        }
    }

    #[test]
    fn second_send_while_in_flight_is_busy() {
        let config = Config {
            api_key: Some("sk".to_string()),
            ..Config::default()
        };
        let mut session = ChatSession::new(config, PostCache::new());

        assert!(session.begin_send("first").is_ok());
        assert!(session.is_sending());
        assert!(matches!(session.begin_send("second"), Err(SendOutcome::Busy)));
        assert_eq!(session.transcript().entries().iter().filter(|e| e.loading).count(), 1);
    }

    #[test]
    fn blank_input_is_ignored() {
        let mut session = ChatSession::new(Config::default(), PostCache::new());
        assert!(matches!(session.begin_send("   \n"), Err(SendOutcome::Ignored)));
        assert!(session.toast().is_none());
        assert_eq!(session.transcript().len(), 1);
    }

    #[test]
    fn clear_requires_confirmation() {
        let config = Config {
            api_key: Some("sk".to_string()),
            ..Config::default()
        };
        let mut session = ChatSession::new(config, PostCache::new());
        let _ = session.begin_send("hello");
        session.finish_send(Ok("hi".to_string()));

        assert!(!session.confirm_clear());
        assert_eq!(session.transcript().len(), 3);

        session.request_clear();
        session.cancel_clear();
        assert!(!session.confirm_clear());

        session.request_clear();
        assert!(session.confirm_clear());
        let entries = session.transcript().entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].message, ChatMessage::new(ChatRole::System, GREETING));
    }

    #[test]
    fn toast_expires_after_two_seconds() {
        let mut session = ChatSession::new(Config::default(), PostCache::new());
        session.show_toast("hi", ToastLevel::Success);
        let shown_at = session.toast().unwrap().shown_at;

        session.expire_toast(shown_at + Duration::from_millis(1500));
        assert!(session.toast().is_some());
        session.expire_toast(shown_at + TOAST_DURATION);
        assert!(session.toast().is_none());
    }

    #[test]
    fn search_listing_is_local() {
        let mut session = ChatSession::new(Config::default(), posts());
        assert!(!session.search_posts("eviction").is_empty());
        assert!(session.search_posts("paxos").is_empty());

        session.show_search("eviction");
        assert!(last_text(&session).contains("https://jasminerain.github.io/2023/lru/"));

        session.show_search("paxos");
        assert!(last_text(&session).contains("没有找到"));
    }

    #[test]
    fn blank_error_message_uses_fallback() {
        let err = ChatError::Network(String::new());
        assert_eq!(error_text(&err), "❌ 错误: 请求失败，请稍后重试");
    }
}
