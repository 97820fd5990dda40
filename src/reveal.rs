//! Typing reveal for assistant replies
//!
//! A reply arrives complete, then gets exposed one character per tick so it
//! looks like it is being typed. When the whole text is visible the next
//! tick commits it to the conversation and the buffer goes back to empty.

use std::io::{self, Write};
use std::time::Duration;

use crate::markdown::sanitize;
use crate::state::Conversation;

pub const DEFAULT_REVEAL_INTERVAL: Duration = Duration::from_millis(30);

/// Visible change produced by the scheduler. Callers scroll the view to the
/// latest content on every event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealEvent {
    Started,
    Advanced(char),
    Completed,
}

#[derive(Debug)]
struct ActiveReveal {
    target: String,
    buffer: String,
}

impl ActiveReveal {
    fn next_char(&self) -> Option<char> {
        self.target[self.buffer.len()..].chars().next()
    }
}

#[derive(Debug, Default)]
pub struct RevealScheduler {
    active: Option<ActiveReveal>,
}

impl RevealScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_revealing(&self) -> bool {
        self.active.is_some()
    }

    /// Text revealed so far; empty while idle
    pub fn buffer(&self) -> &str {
        self.active.as_ref().map(|r| r.buffer.as_str()).unwrap_or("")
    }

    /// Begin revealing `target`, replacing any reveal still in progress.
    ///
    /// An empty target has nothing to type, so it is committed straight away.
    pub fn start(&mut self, target: String, conversation: &mut Conversation) -> RevealEvent {
        if let Some(previous) = self.active.take() {
            tracing::debug!(
                revealed = previous.buffer.len(),
                total = previous.target.len(),
                "replacing unfinished reveal"
            );
        }

        if target.is_empty() {
            conversation.commit_assistant_text(target);
            return RevealEvent::Completed;
        }

        self.active = Some(ActiveReveal {
            buffer: String::with_capacity(target.len()),
            target,
        });
        RevealEvent::Started
    }

    /// Advance the reveal by one timer period. Returns `None` when idle.
    pub fn tick(&mut self, conversation: &mut Conversation) -> Option<RevealEvent> {
        let reveal = self.active.as_mut()?;

        if let Some(c) = reveal.next_char() {
            reveal.buffer.push(c);
            return Some(RevealEvent::Advanced(c));
        }

        let finished = self.active.take()?;
        conversation.commit_assistant_text(finished.target);
        Some(RevealEvent::Completed)
    }

    /// Play a started reveal out to `out` as plain text, one character per
    /// `interval`. Without an interval the reply is committed and written in
    /// one go. Control characters never reach `out`.
    pub async fn type_out<W: Write>(
        &mut self,
        conversation: &mut Conversation,
        out: &mut W,
        interval: Option<Duration>,
    ) -> io::Result<()> {
        let Some(interval) = interval else {
            let mut finished = false;
            while let Some(event) = self.tick(conversation) {
                finished = event == RevealEvent::Completed;
            }
            if let Some(message) = conversation.last().filter(|_| finished) {
                out.write_all(sanitize(message.text()).as_bytes())?;
            }
            return Ok(());
        };

        let mut timer = tokio::time::interval(interval);
        let mut utf8 = [0u8; 4];
        while self.is_revealing() {
            timer.tick().await;
            if let Some(RevealEvent::Advanced(c)) = self.tick(conversation) {
                out.write_all(sanitize(c.encode_utf8(&mut utf8)).as_bytes())?;
                out.flush()?;
            }
        }
        Ok(())
    }
}
