pub mod ai;
pub mod config;
pub mod error;
pub mod feed;
pub mod format;
pub mod prompt;
pub mod session;
pub mod state;

// Re-export main types for convenience
pub use ai::{build_payload, DeepSeekClient};
pub use config::{ChatSettings, Config};
pub use error::ChatError;
pub use feed::{parse_feed, FeedLoader, PostCache, PostSummary};
pub use format::{format_message, markup, to_markup, Segment};
pub use prompt::build_system_prompt;
pub use session::{ChatSession, PendingRequest, SendOutcome, SendState, Toast, ToastLevel};
pub use state::{ChatMessage, ChatRole, Entry, Transcript};
