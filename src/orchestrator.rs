//! Bridges submitted prompts to the endpoint and replies to the reveal.
//!
//! Requests run as spawned tasks so the UI loop never waits on the network.
//! Each task sends its outcome back over a channel; the loop drains it and
//! hands successful replies to the [`RevealScheduler`].

use tokio::sync::mpsc;

use crate::client::{GenerateClient, RequestError};
use crate::reveal::{RevealEvent, RevealScheduler};
use crate::state::Conversation;

pub type Reply = Result<String, RequestError>;

pub struct RequestOrchestrator {
    client: GenerateClient,
    tx: mpsc::UnboundedSender<Reply>,
    rx: mpsc::UnboundedReceiver<Reply>,
    in_flight: usize,
}

impl RequestOrchestrator {
    pub fn new(client: GenerateClient) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            client,
            tx,
            rx,
            in_flight: 0,
        }
    }

    pub fn endpoint(&self) -> &str {
        self.client.endpoint()
    }

    /// Number of requests sent whose reply has not been received yet
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Fire off a request for `prompt`. Must be called inside a tokio runtime.
    pub fn send_prompt(&mut self, prompt: String) {
        let client = self.client.clone();
        let tx = self.tx.clone();
        self.in_flight += 1;

        tracing::info!(chars = prompt.chars().count(), "sending prompt");
        tokio::spawn(async move {
            let reply = client.generate(&prompt).await;
            // Receiver only goes away when the app is shutting down.
            let _ = tx.send(reply);
        });
    }

    /// Take the next finished reply without waiting
    pub fn poll_reply(&mut self) -> Option<Reply> {
        let reply = self.rx.try_recv().ok()?;
        self.in_flight = self.in_flight.saturating_sub(1);
        Some(reply)
    }

    /// Wait for the next reply; `None` when nothing is in flight
    pub async fn next_reply(&mut self) -> Option<Reply> {
        if self.in_flight == 0 {
            return None;
        }
        let reply = self.rx.recv().await?;
        self.in_flight -= 1;
        Some(reply)
    }
}

/// Route a finished request: text starts a new reveal, failures are logged
/// and leave the conversation untouched.
pub fn deliver(
    reply: Reply,
    conversation: &mut Conversation,
    reveal: &mut RevealScheduler,
) -> Result<RevealEvent, RequestError> {
    match reply {
        Ok(text) => {
            tracing::info!(chars = text.chars().count(), "reply received");
            Ok(reveal.start(text, conversation))
        }
        Err(e) => {
            tracing::error!(error = %e, "generation request failed");
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{Message, Origin};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::matchers::{body_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mock_endpoint(status: u16, body: serde_json::Value) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn test_two_plus_two_end_to_end() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_json(json!({ "prompt": "2 + 2" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "response": "4" })))
            .mount(&server)
            .await;

        let mut conversation = Conversation::new();
        let mut reveal = RevealScheduler::new();
        let mut orchestrator = RequestOrchestrator::new(GenerateClient::new(&server.uri()));

        conversation.pending_input_mut().push_str("2 + 2");
        let prompt = conversation.submit_pending().unwrap();
        orchestrator.send_prompt(prompt);

        assert_eq!(conversation.messages(), &[Message::new(Origin::User, "2 + 2")]);

        let reply = orchestrator.next_reply().await.unwrap();
        assert_eq!(
            deliver(reply, &mut conversation, &mut reveal).unwrap(),
            RevealEvent::Started
        );
        while reveal.tick(&mut conversation) != Some(RevealEvent::Completed) {}

        assert_eq!(
            conversation.messages(),
            &[
                Message::new(Origin::User, "2 + 2"),
                Message::new(Origin::Assistant, "4"),
            ]
        );
        assert_eq!(orchestrator.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_failed_request_leaves_conversation_unchanged() {
        let server = mock_endpoint(500, json!({ "error": "boom" })).await;
        let mut conversation = Conversation::new();
        let mut reveal = RevealScheduler::new();
        let mut orchestrator = RequestOrchestrator::new(GenerateClient::new(&server.uri()));

        let prompt = conversation.submit_user_text("hello").unwrap();
        orchestrator.send_prompt(prompt);
        let reply = orchestrator.next_reply().await.unwrap();

        assert!(deliver(reply, &mut conversation, &mut reveal).is_err());
        assert_eq!(conversation.len(), 1);
        assert!(!reveal.is_revealing());
        assert_eq!(reveal.buffer(), "");
    }

    #[tokio::test]
    async fn test_transport_failure_does_not_disturb_active_reveal() {
        let mut conversation = Conversation::new();
        let mut reveal = RevealScheduler::new();
        reveal.start("partial".to_string(), &mut conversation);
        reveal.tick(&mut conversation);

        let mut orchestrator =
            RequestOrchestrator::new(GenerateClient::new("http://127.0.0.1:9/generate"));
        orchestrator.send_prompt("hi".to_string());
        let reply = orchestrator.next_reply().await.unwrap();

        assert!(deliver(reply, &mut conversation, &mut reveal).is_err());
        assert!(conversation.is_empty());
        assert_eq!(reveal.buffer(), "p");
    }

    #[tokio::test]
    async fn test_empty_reply_commits_without_reveal() {
        let server = mock_endpoint(200, json!({ "response": "" })).await;
        let mut conversation = Conversation::new();
        let mut reveal = RevealScheduler::new();
        let mut orchestrator = RequestOrchestrator::new(GenerateClient::new(&server.uri()));

        orchestrator.send_prompt("say nothing".to_string());
        let reply = orchestrator.next_reply().await.unwrap();

        assert_eq!(
            deliver(reply, &mut conversation, &mut reveal).unwrap(),
            RevealEvent::Completed
        );
        assert_eq!(conversation.last(), Some(&Message::new(Origin::Assistant, "")));
    }

    #[tokio::test]
    async fn test_next_reply_is_none_when_idle() {
        let mut orchestrator = RequestOrchestrator::new(GenerateClient::new("http://127.0.0.1:9"));
        assert!(orchestrator.next_reply().await.is_none());
        assert!(orchestrator.poll_reply().is_none());
    }
}
