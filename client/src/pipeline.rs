//! The send state machine: `Idle -> Sending -> {Streaming -> Committed} | RolledBack`.

use std::time::Duration;

use log::{debug, info, warn};
use thiserror::Error;

use crate::api::ApiError;
use crate::client::ChatClient;
use crate::conversations;
use crate::models::{ConnectionStatus, Message, SendMessageRequest};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SendPhase {
    #[default]
    Idle,
    Sending,
    Streaming,
    Committed,
    RolledBack,
}

impl SendPhase {
    /// A send is in flight from the optimistic append until commit or rollback.
    pub fn is_in_flight(self) -> bool {
        matches!(self, SendPhase::Sending | SendPhase::Streaming)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SendOutcome {
    /// Blank input, or another send is still in flight.
    Ignored,
    /// Kept visible and parked in the offline queue.
    Queued,
    /// The assistant reply that was appended.
    Committed(Message),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SendFailureKind {
    Connectivity,
    RateLimited,
    Generic,
}

/// A send that was rolled back. `message` is fit for display.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct SendError {
    pub kind: SendFailureKind,
    pub message: String,
    #[source]
    pub cause: ApiError,
}

impl From<ApiError> for SendError {
    fn from(cause: ApiError) -> Self {
        let (kind, message) = match &cause {
            ApiError::Network(_) | ApiError::Server { status: 502..=504, .. } => (
                SendFailureKind::Connectivity,
                "Unable to reach the assistant. Check your connection and try again.",
            ),
            ApiError::RateLimited { .. } => (
                SendFailureKind::RateLimited,
                "You're sending messages too quickly. Please wait a moment and try again.",
            ),
            _ => (
                SendFailureKind::Generic,
                "Something went wrong while sending your message. Please try again.",
            ),
        };
        Self { kind, message: message.to_string(), cause }
    }
}

/// Splits `text` into reveal chunks, each a word with its trailing whitespace,
/// paired with the pause that follows it.
pub(crate) fn reveal_chunks(
    text: &str,
    word_delay: Duration,
    sentence_pause: Duration,
) -> Vec<(&str, Duration)> {
    text.split_inclusive(char::is_whitespace)
        .map(|chunk| {
            let ends_sentence = chunk.trim_end().ends_with(&['.', '!', '?'][..]);
            (chunk, if ends_sentence { sentence_pause } else { word_delay })
        })
        .collect()
}

impl ChatClient {
    /// Sends one user message through the pipeline.
    ///
    /// Network failures park the message in the offline queue and keep it visible;
    /// any other failure removes it again and returns a [`SendError`].
    pub async fn send_message(&self, text: &str) -> Result<SendOutcome, SendError> {
        let text = text.trim();
        if text.is_empty() || self.inner.state.borrow().phase.is_in_flight() {
            return Ok(SendOutcome::Ignored);
        }

        // ── Optimistic append ─────────────────────────────────────────────────
        let conversation_id = self.ensure_conversation();
        let user_message = Message::user(text, self.next_message_timestamp());
        let (history, status) = {
            let mut state = self.inner.state.borrow_mut();
            let history = state.messages.clone();
            state.messages.push(user_message.clone());
            state.phase = SendPhase::Sending;
            state.error = None;
            (history, state.status)
        };
        self.emit();

        if status == ConnectionStatus::Offline {
            info!("Offline, queueing message {}", user_message.timestamp);
            self.park_offline(&conversation_id, user_message);
            return Ok(SendOutcome::Queued);
        }

        // ── Network call ──────────────────────────────────────────────────────
        let request = SendMessageRequest {
            conversation_id: conversation_id.clone(),
            message: text.to_string(),
            messages: history,
            idempotency_key: Some(format!("msg-{}", user_message.timestamp)),
        };

        match self.inner.api.send_message(&request).await {
            Ok(response) => {
                if let Some(error) = &response.metadata.error {
                    debug!("Received degraded reply ({}): {error}", response.metadata.model);
                }
                self.stream_reply(&response.message.content).await;
                let reply = response.message;
                self.commit(&conversation_id, text, reply.clone());
                Ok(SendOutcome::Committed(reply))
            }
            Err(err) if err.is_network() => {
                warn!("Send failed on the network, going offline: {err}");
                self.set_connection_status(ConnectionStatus::Offline);
                self.park_offline(&conversation_id, user_message);
                Ok(SendOutcome::Queued)
            }
            Err(err) => {
                warn!("Send failed, rolling back: {err}");
                let failure = SendError::from(err);
                self.roll_back(&user_message, &failure);
                Err(failure)
            }
        }
    }

    /// Reveals `text` word by word in the streaming buffer.
    async fn stream_reply(&self, text: &str) {
        {
            let mut state = self.inner.state.borrow_mut();
            state.phase = SendPhase::Streaming;
            state.streaming_text = Some(String::new());
        }
        self.emit();

        let config = &self.inner.config;
        for (chunk, pause) in reveal_chunks(text, config.word_delay, config.sentence_pause) {
            if let Some(buffer) = self.inner.state.borrow_mut().streaming_text.as_mut() {
                buffer.push_str(chunk);
            }
            self.emit();
            self.inner.runtime.sleep(pause).await;
        }
    }

    fn commit(&self, conversation_id: &str, user_text: &str, reply: Message) {
        {
            let mut state = self.inner.state.borrow_mut();
            state.messages.push(reply.clone());
            state.streaming_text = None;
            state.phase = SendPhase::Committed;
        }
        self.persist_messages();
        if let Err(e) =
            conversations::record_exchange(self.inner.store.as_ref(), conversation_id, user_text, &reply)
        {
            warn!("Failed to update conversation list: {e}");
        }
        self.emit();
        self.refresh_conversations();
    }

    fn roll_back(&self, user_message: &Message, failure: &SendError) {
        {
            let mut state = self.inner.state.borrow_mut();
            if let Some(pos) = state.messages.iter().rposition(|m| m == user_message) {
                state.messages.remove(pos);
            }
            state.streaming_text = None;
            state.phase = SendPhase::RolledBack;
            state.error = Some(failure.message.clone());
        }
        self.emit();
    }

    fn park_offline(&self, conversation_id: &str, user_message: Message) {
        let persisted = self
            .inner
            .queue
            .borrow_mut()
            .enqueue(self.inner.store.as_ref(), conversation_id, user_message);
        if let Err(e) = persisted {
            warn!("Queued message is held in memory only: {e}");
        }
        self.inner.state.borrow_mut().phase = SendPhase::Idle;
        self.persist_messages();
        self.emit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use crate::store::{KeyValueStore, CURRENT_CONVERSATION_KEY};
    use crate::testing::{reply, run_local, Harness};

    #[test]
    fn test_reveal_chunks_pause_longer_after_sentences() {
        let fast = Duration::from_millis(1);
        let slow = Duration::from_millis(9);
        let chunks = reveal_chunks("Hi there. How are you?", fast, slow);
        let words: Vec<&str> = chunks.iter().map(|(w, _)| *w).collect();
        assert_eq!(words, vec!["Hi ", "there. ", "How ", "are ", "you?"]);
        let pauses: Vec<Duration> = chunks.iter().map(|(_, p)| *p).collect();
        assert_eq!(pauses, vec![fast, slow, fast, fast, slow]);
        assert_eq!(words.concat(), "Hi there. How are you?");
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_send_streams_then_commits() {
        run_local(async {
            let harness = Harness::new();
            harness.api.push(Ok(reply("hi there friend.")));
            let client = harness.client();

            let outcome = client.send_message("  hello  ").await.unwrap();

            let SendOutcome::Committed(message) = outcome else { panic!("not committed") };
            assert_eq!(message.content, "hi there friend.");

            let snapshot = client.snapshot();
            assert_eq!(snapshot.phase, SendPhase::Committed);
            assert_eq!(snapshot.streaming_text, None);
            let roles: Vec<Role> = snapshot.messages.iter().map(|m| m.role).collect();
            assert_eq!(roles, vec![Role::User, Role::Assistant]);
            assert_eq!(snapshot.messages[0].content, "hello");

            // streaming buffer only ever grew, in order
            let revealed: Vec<String> = harness
                .view
                .snapshots()
                .into_iter()
                .filter_map(|s| s.streaming_text)
                .collect();
            assert_eq!(revealed.last().map(String::as_str), Some("hi there friend."));
            assert!(revealed.windows(2).all(|w| w[1].starts_with(w[0].as_str())));

            // request carried the timestamp-derived key and a generated conversation id
            let request = harness.api.requests().remove(0);
            assert_eq!(request.message, "hello");
            assert_eq!(
                request.idempotency_key,
                Some(format!("msg-{}", snapshot.messages[0].timestamp))
            );
            assert!(request.conversation_id.starts_with("conv-"));
            assert_eq!(
                harness.store.get(CURRENT_CONVERSATION_KEY).unwrap(),
                Some(request.conversation_id.clone())
            );
            assert_eq!(harness.view.conversations().len(), 1);
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_history_excludes_current_message() {
        run_local(async {
            let harness = Harness::new();
            harness.api.push(Ok(reply("one")));
            harness.api.push(Ok(reply("two")));
            let client = harness.client();

            client.send_message("first").await.unwrap();
            client.send_message("second").await.unwrap();

            let requests = harness.api.requests();
            assert!(requests[0].messages.is_empty());
            let history: Vec<&str> = requests[1].messages.iter().map(|m| m.content.as_str()).collect();
            assert_eq!(history, vec!["first", "one"]);
            assert_eq!(requests[0].conversation_id, requests[1].conversation_id);
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_blank_input_is_ignored() {
        run_local(async {
            let harness = Harness::new();
            let client = harness.client();
            assert_eq!(client.send_message("   ").await.unwrap(), SendOutcome::Ignored);
            assert!(harness.api.requests().is_empty());
            assert!(client.snapshot().messages.is_empty());
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_send_while_in_flight_is_ignored() {
        run_local(async {
            let harness = Harness::new();
            harness.api.push(Ok(reply("a long answer with several words in it")));
            let client = harness.client();

            let first = tokio::task::spawn_local({
                let client = client.clone();
                async move { client.send_message("one").await }
            });
            tokio::task::yield_now().await;
            assert!(client.snapshot().is_sending());

            assert_eq!(client.send_message("two").await.unwrap(), SendOutcome::Ignored);
            assert!(matches!(first.await.unwrap(), Ok(SendOutcome::Committed(_))));
            assert_eq!(harness.api.requests().len(), 1);
            assert_eq!(client.snapshot().messages.len(), 2);
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_network_failure_rolls_back() {
        run_local(async {
            let harness = Harness::new();
            harness.api.push(Ok(reply("kept")));
            harness.api.push(Err(ApiError::RateLimited {
                message: "slow down".to_string(),
                retry_after_ms: Some(1_000),
            }));
            let client = harness.client();
            client.send_message("first").await.unwrap();
            let before = client.snapshot().messages;

            let err = client.send_message("second").await.unwrap_err();

            assert_eq!(err.kind, SendFailureKind::RateLimited);
            assert!(err.message.contains("too quickly"));
            let snapshot = client.snapshot();
            assert_eq!(snapshot.messages, before);
            assert_eq!(snapshot.phase, SendPhase::RolledBack);
            assert_eq!(snapshot.streaming_text, None);
            assert_eq!(snapshot.error.as_deref(), Some(err.message.as_str()));
            assert!(client.queue().is_empty());
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_error_is_generic() {
        run_local(async {
            let harness = Harness::new();
            harness.api.push(Err(ApiError::Server { status: 400, message: "bad".to_string() }));
            let client = harness.client();

            let err = client.send_message("hello").await.unwrap_err();

            assert_eq!(err.kind, SendFailureKind::Generic);
            assert!(client.snapshot().messages.is_empty());
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_network_failure_queues_and_goes_offline() {
        run_local(async {
            let harness = Harness::new();
            harness.api.push(Err(ApiError::Network("connection refused".to_string())));
            let client = harness.client();

            let outcome = client.send_message("hello").await.unwrap();

            assert_eq!(outcome, SendOutcome::Queued);
            let snapshot = client.snapshot();
            assert_eq!(snapshot.status, ConnectionStatus::Offline);
            assert_eq!(snapshot.messages.len(), 1);
            assert_eq!(snapshot.queued, 1);
            assert_eq!(snapshot.phase, SendPhase::Idle);
            assert_eq!(snapshot.error, None);
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_offline_send_skips_network() {
        run_local(async {
            let harness = Harness::new();
            let client = harness.client();
            client.set_connection_status(ConnectionStatus::Offline);

            let outcome = client.send_message("hello").await.unwrap();

            assert_eq!(outcome, SendOutcome::Queued);
            assert!(harness.api.requests().is_empty());
            assert_eq!(client.queue().len(), 1);
            assert_eq!(client.snapshot().messages[0].content, "hello");
        })
        .await;
    }
}
