use ratatui::text::Line;

use crate::client::GenerateClient;
use crate::config::Config;
use crate::orchestrator::{deliver, RequestOrchestrator};
use crate::reveal::RevealScheduler;
use crate::state::Conversation;

// The "Thinking..." dots advance roughly this often regardless of tick rate.
const ANIMATION_FRAME_MS: u64 = 300;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub struct App {
    pub should_quit: bool,
    pub tutor_name: String,
    pub code_theme: String,

    // Core state
    pub conversation: Conversation,
    pub reveal: RevealScheduler,
    pub orchestrator: RequestOrchestrator,

    // Input line
    pub input_cursor: usize, // cursor position in chars

    // Chat view
    pub rendered: Vec<Vec<Line<'static>>>, // Styled lines per committed message
    pub chat_scroll: u16,
    pub follow_latest: bool,
    pub max_scroll: u16,   // Updated during render
    pub chat_height: u16,  // Inner height of the chat area, updated during render

    // Last request failure, shown in the footer until the next submission
    pub notice: Option<String>,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation
    tick_count: u64,
    ticks_per_frame: u64,
}

impl App {
    pub fn new(config: &Config) -> Self {
        let interval_ms = config.reveal_interval().as_millis() as u64;
        Self {
            should_quit: false,
            tutor_name: config.tutor_name.clone(),
            code_theme: config.code_theme.clone(),

            conversation: Conversation::new(),
            reveal: RevealScheduler::new(),
            orchestrator: RequestOrchestrator::new(GenerateClient::new(&config.endpoint)),

            input_cursor: 0,

            rendered: Vec::new(),
            chat_scroll: 0,
            follow_latest: true,
            max_scroll: 0,
            chat_height: 0,

            notice: None,

            animation_frame: 0,
            tick_count: 0,
            ticks_per_frame: (ANIMATION_FRAME_MS / interval_ms.max(1)).max(1),
        }
    }

    pub fn is_waiting(&self) -> bool {
        self.orchestrator.in_flight() > 0
    }

    /// Submit the input line and send it to the endpoint
    pub fn submit(&mut self) {
        let Some(prompt) = self.conversation.submit_pending() else {
            return;
        };
        self.input_cursor = 0;
        self.notice = None;
        self.orchestrator.send_prompt(prompt);
        self.scroll_to_latest();
    }

    /// One timer period: pick up finished requests, advance the reveal
    pub fn on_tick(&mut self) {
        while let Some(reply) = self.orchestrator.poll_reply() {
            match deliver(reply, &mut self.conversation, &mut self.reveal) {
                Ok(_) => self.scroll_to_latest(),
                Err(e) => self.notice = Some(format!("Request failed: {e}")),
            }
        }

        if self.reveal.tick(&mut self.conversation).is_some() {
            self.scroll_to_latest();
        }

        self.tick_count = self.tick_count.wrapping_add(1);
        if self.is_waiting() && self.tick_count % self.ticks_per_frame == 0 {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    // Scrolling
    pub fn scroll_to_latest(&mut self) {
        self.follow_latest = true;
        self.chat_scroll = self.max_scroll;
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.follow_latest = false;
        self.chat_scroll = self.chat_scroll.min(self.max_scroll).saturating_sub(lines);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_add(lines).min(self.max_scroll);
        if self.chat_scroll >= self.max_scroll {
            self.follow_latest = true;
        }
    }

    pub fn page_height(&self) -> u16 {
        self.chat_height.saturating_sub(1).max(1)
    }

    // Input editing
    pub fn insert_char(&mut self, c: char) {
        let input = self.conversation.pending_input_mut();
        let byte_pos = char_to_byte_index(input, self.input_cursor);
        input.insert(byte_pos, c);
        self.input_cursor += 1;
    }

    pub fn backspace(&mut self) {
        if self.input_cursor == 0 {
            return;
        }
        self.input_cursor -= 1;
        let input = self.conversation.pending_input_mut();
        let byte_pos = char_to_byte_index(input, self.input_cursor);
        input.remove(byte_pos);
    }

    pub fn delete(&mut self) {
        let input = self.conversation.pending_input_mut();
        if self.input_cursor < input.chars().count() {
            let byte_pos = char_to_byte_index(input, self.input_cursor);
            input.remove(byte_pos);
        }
    }

    pub fn cursor_left(&mut self) {
        self.input_cursor = self.input_cursor.saturating_sub(1);
    }

    pub fn cursor_right(&mut self) {
        let char_count = self.conversation.pending_input().chars().count();
        self.input_cursor = (self.input_cursor + 1).min(char_count);
    }

    pub fn cursor_home(&mut self) {
        self.input_cursor = 0;
    }

    pub fn cursor_end(&mut self) {
        self.input_cursor = self.conversation.pending_input().chars().count();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{Message, Origin};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn app_for(endpoint: &str) -> App {
        App::new(&Config {
            endpoint: endpoint.to_string(),
            ..Config::default()
        })
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            app.insert_char(c);
        }
    }

    async fn tick_until(app: &mut App, done: impl Fn(&App) -> bool) {
        for _ in 0..500 {
            app.on_tick();
            if done(app) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached");
    }

    #[test]
    fn test_input_editing_is_utf8_safe() {
        let mut app = app_for("http://127.0.0.1:9");
        type_text(&mut app, "héllo");
        app.cursor_home();
        app.cursor_right();
        app.delete();
        app.cursor_end();
        app.backspace();
        app.cursor_left();
        app.insert_char('!');

        assert_eq!(app.conversation.pending_input(), "hl!l");
        assert_eq!(app.input_cursor, 3);
    }

    #[test]
    fn test_blank_submit_sends_nothing() {
        let mut app = app_for("http://127.0.0.1:9");
        type_text(&mut app, "   ");

        app.submit();

        assert!(app.conversation.is_empty());
        assert_eq!(app.conversation.pending_input(), "   ");
        assert!(!app.is_waiting());
    }

    #[tokio::test]
    async fn test_submit_reveals_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "response": "**4**" })))
            .mount(&server)
            .await;
        let mut app = app_for(&server.uri());

        type_text(&mut app, "2 + 2");
        app.submit();

        assert_eq!(app.conversation.pending_input(), "");
        assert_eq!(app.input_cursor, 0);
        assert!(app.is_waiting());

        tick_until(&mut app, |app| app.reveal.is_revealing()).await;
        assert!(!app.is_waiting());
        assert!(app.follow_latest);

        tick_until(&mut app, |app| app.conversation.len() == 2).await;
        assert_eq!(
            app.conversation.last(),
            Some(&Message::new(Origin::Assistant, "**4**"))
        );
        assert_eq!(app.reveal.buffer(), "");
        assert_eq!(app.notice, None);
    }

    #[tokio::test]
    async fn test_failure_sets_notice_only() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;
        let mut app = app_for(&server.uri());

        type_text(&mut app, "hello");
        app.submit();
        tick_until(&mut app, |app| !app.is_waiting()).await;

        assert_eq!(app.conversation.len(), 1);
        assert!(!app.reveal.is_revealing());
        let notice = app.notice.clone().unwrap();
        assert!(notice.contains("502"), "{notice}");

        type_text(&mut app, "again");
        app.submit();
        assert_eq!(app.notice, None);
    }

    #[test]
    fn test_scrolling_releases_and_restores_follow() {
        let mut app = app_for("http://127.0.0.1:9");
        app.max_scroll = 10;
        app.scroll_to_latest();

        app.scroll_up(3);
        assert_eq!(app.chat_scroll, 7);
        assert!(!app.follow_latest);

        app.scroll_down(100);
        assert_eq!(app.chat_scroll, 10);
        assert!(app.follow_latest);
    }
}
