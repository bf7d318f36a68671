use ratatui::layout::Rect;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use blogchat_core::{ChatError, ChatSession, FeedLoader, PostCache, SendOutcome};

/// Input prefix that searches the loaded posts locally instead of asking.
pub const FIND_COMMAND: &str = "/find ";

pub struct App {
    pub should_quit: bool,
    pub session: ChatSession,

    // Input box
    pub input: String,
    pub cursor: usize, // cursor position in chars

    // Message list
    pub scroll: u16,
    pub follow_bottom: bool,
    pub chat_height: u16, // inner height, updated during render
    pub max_scroll: u16,
    pub chat_area: Option<Rect>,

    // Animation state
    pub animation_frame: u8,

    // Background work
    pub send_task: Option<JoinHandle<Result<String, ChatError>>>,
    pub feed_task: Option<JoinHandle<PostCache>>,
}

impl App {
    pub fn new(session: ChatSession) -> Self {
        Self {
            should_quit: false,
            session,
            input: String::new(),
            cursor: 0,
            scroll: 0,
            follow_bottom: true,
            chat_height: 0,
            max_scroll: 0,
            chat_area: None,
            animation_frame: 0,
            send_task: None,
            feed_task: None,
        }
    }

    /// Start loading the feed. The chat is usable before it completes.
    pub fn spawn_feed_load(&mut self, loader: FeedLoader) {
        info!(location = %loader.location(), "loading feed in background");
        self.feed_task = Some(tokio::spawn(async move { loader.load().await }));
    }

    pub fn feed_loading(&self) -> bool {
        self.feed_task.is_some()
    }

    /// Submit the input box: a local search or a question.
    pub fn submit(&mut self) {
        if self.session.is_sending() {
            return;
        }

        if let Some(query) = self.input.strip_prefix(FIND_COMMAND) {
            if !query.trim().is_empty() {
                let query = query.to_string();
                self.session.show_search(&query);
                self.clear_input();
                self.scroll_to_bottom();
            }
            return;
        }

        match self.session.begin_send(&self.input) {
            Ok(request) => {
                self.clear_input();
                self.scroll_to_bottom();
                self.send_task = Some(tokio::spawn(request.execute()));
            }
            // Rejections raise a toast; the input is kept so it can be resent.
            Err(SendOutcome::Rejected(e)) => warn!(error = %e, "send rejected"),
            Err(_) => {}
        }
    }

    /// Collect finished background tasks.
    pub async fn poll_tasks(&mut self) {
        if self.feed_task.as_ref().is_some_and(|t| t.is_finished()) {
            if let Some(task) = self.feed_task.take() {
                match task.await {
                    Ok(posts) => self.session.set_posts(posts),
                    Err(e) => warn!(error = %e, "feed task failed"),
                }
            }
        }

        if self.send_task.as_ref().is_some_and(|t| t.is_finished()) {
            if let Some(task) = self.send_task.take() {
                let result = task
                    .await
                    .unwrap_or_else(|e| Err(ChatError::Network(e.to_string())));
                self.session.finish_send(result);
                self.scroll_to_bottom();
            }
        }
    }

    pub async fn tick(&mut self) {
        if self.session.is_sending() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
        self.session.expire_toast(std::time::Instant::now());
        self.poll_tasks().await;
    }

    pub fn clear_input(&mut self) {
        self.input.clear();
        self.cursor = 0;
    }

    pub fn insert_char(&mut self, c: char) {
        let byte_pos = char_to_byte_index(&self.input, self.cursor);
        self.input.insert(byte_pos, c);
        self.cursor += 1;
    }

    pub fn delete_before_cursor(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let byte_pos = char_to_byte_index(&self.input, self.cursor);
            self.input.remove(byte_pos);
        }
    }

    pub fn delete_at_cursor(&mut self) {
        if self.cursor < self.input.chars().count() {
            let byte_pos = char_to_byte_index(&self.input, self.cursor);
            self.input.remove(byte_pos);
        }
    }

    pub fn cursor_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn cursor_right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.input.chars().count());
    }

    pub fn cursor_home(&mut self) {
        self.cursor = 0;
    }

    pub fn cursor_end(&mut self) {
        self.cursor = self.input.chars().count();
    }

    /// Re-enable following; render pins the view to the last line.
    pub fn scroll_to_bottom(&mut self) {
        self.follow_bottom = true;
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.follow_bottom = false;
        self.scroll = self.scroll.saturating_sub(lines);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.scroll = self.scroll.saturating_add(lines).min(self.max_scroll);
        if self.scroll >= self.max_scroll {
            self.follow_bottom = true;
        }
    }

    pub fn half_page(&self) -> u16 {
        (self.chat_height / 2).max(1)
    }
}

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}
