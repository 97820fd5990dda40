//! UI-agnostic conversation state
//!
//! Holds the ordered chat history and the text the user is currently typing.
//! Nothing in here depends on the terminal, so the same types back the TUI
//! and the one-shot `ask` command.

use serde::{Deserialize, Serialize};

/// Which party produced a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    User,
    Assistant,
}

/// One turn in the conversation. Text is markdown source and never changes
/// after the message is appended to the history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    origin: Origin,
    text: String,
}

impl Message {
    pub fn new(origin: Origin, text: impl Into<String>) -> Self {
        Self {
            origin,
            text: text.into(),
        }
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Append-only chat history plus the pending input line
#[derive(Debug, Default)]
pub struct Conversation {
    history: Vec<Message>,
    pending_input: String,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.history
    }

    pub fn last(&self) -> Option<&Message> {
        self.history.last()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn pending_input(&self) -> &str {
        &self.pending_input
    }

    pub fn pending_input_mut(&mut self) -> &mut String {
        &mut self.pending_input
    }

    /// Record a user turn and clear the input line.
    ///
    /// Blank or whitespace-only text is ignored and leaves everything as it
    /// was. On success the raw, untrimmed text is returned as the prompt to
    /// send to the endpoint.
    pub fn submit_user_text(&mut self, text: &str) -> Option<String> {
        if text.trim().is_empty() {
            return None;
        }

        self.history.push(Message::new(Origin::User, text));
        self.pending_input.clear();
        Some(text.to_string())
    }

    /// Submit whatever is currently in the input line
    pub fn submit_pending(&mut self) -> Option<String> {
        if self.pending_input.trim().is_empty() {
            return None;
        }
        let text = std::mem::take(&mut self.pending_input);
        self.submit_user_text(&text)
    }

    /// Append a finished assistant turn. Only the reveal scheduler calls this.
    pub(crate) fn commit_assistant_text(&mut self, text: impl Into<String>) {
        self.history.push(Message::new(Origin::Assistant, text));
    }
}
