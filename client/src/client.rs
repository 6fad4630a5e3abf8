use std::cell::{Cell, Ref, RefCell};
use std::rc::Rc;
use std::time::Duration;

use log::{error, info, warn};

use crate::api::ChatApi;
use crate::conversations;
use crate::models::{ConnectionStatus, Message};
use crate::offline_queue::OfflineQueue;
use crate::pipeline::SendPhase;
use crate::runtime::Runtime;
use crate::store::{KeyValueStore, CURRENT_CONVERSATION_KEY};
use crate::view::{ChatSnapshot, ChatView};

#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Pause after each revealed word.
    pub word_delay: Duration,
    /// Pause after a word that ends a sentence.
    pub sentence_pause: Duration,
    /// Wait before retrying a drain that stopped on a failure.
    pub drain_retry_delay: Duration,
    /// Wait between going online and draining, until a connectivity source overrides it.
    pub drain_debounce: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            word_delay: Duration::from_millis(30),
            sentence_pause: Duration::from_millis(150),
            drain_retry_delay: Duration::from_secs(5),
            drain_debounce: Duration::from_secs(1),
        }
    }
}

/// Host-provided collaborators.
pub struct ClientDeps {
    pub api: Rc<dyn ChatApi>,
    pub store: Rc<dyn KeyValueStore>,
    pub runtime: Rc<dyn Runtime>,
    pub view: Rc<dyn ChatView>,
}

#[derive(Debug, Default)]
pub(crate) struct ChatState {
    pub(crate) conversation_id: Option<String>,
    pub(crate) messages: Vec<Message>,
    pub(crate) streaming_text: Option<String>,
    pub(crate) phase: SendPhase,
    pub(crate) status: ConnectionStatus,
    pub(crate) error: Option<String>,
}

pub(crate) struct Inner {
    pub(crate) api: Rc<dyn ChatApi>,
    pub(crate) store: Rc<dyn KeyValueStore>,
    pub(crate) runtime: Rc<dyn Runtime>,
    pub(crate) view: Rc<dyn ChatView>,
    pub(crate) config: ClientConfig,
    pub(crate) state: RefCell<ChatState>,
    pub(crate) queue: RefCell<OfflineQueue>,
    /// Set while a drain is running; drains never overlap.
    pub(crate) draining: Cell<bool>,
    /// Bumped to invalidate pending drain timers.
    pub(crate) drain_epoch: Cell<u64>,
    pub(crate) drain_debounce: Cell<Duration>,
    /// Last timestamp handed to a user message.
    pub(crate) last_timestamp: Cell<i64>,
}

/// Handle to one chat client instance. Cheap to clone; all clones share state.
#[derive(Clone)]
pub struct ChatClient {
    pub(crate) inner: Rc<Inner>,
}

impl ChatClient {
    /// Restores the current conversation and the offline queue from storage.
    /// A restored non-empty queue gets a debounced drain.
    pub fn new(deps: ClientDeps, config: ClientConfig) -> Self {
        let queue = OfflineQueue::load(deps.store.as_ref()).unwrap_or_else(|e| {
            error!("Failed to restore offline queue: {e}");
            OfflineQueue::default()
        });

        let conversation_id = deps.store.get(CURRENT_CONVERSATION_KEY).unwrap_or_else(|e| {
            error!("Failed to read current conversation: {e}");
            None
        });
        let messages = conversation_id
            .as_deref()
            .map(|id| {
                conversations::load_messages(deps.store.as_ref(), id).unwrap_or_else(|e| {
                    warn!("Failed to load messages for {id}: {e}");
                    Vec::new()
                })
            })
            .unwrap_or_default();

        let last_timestamp = queue.latest_timestamp().unwrap_or_default();
        let client = Self {
            inner: Rc::new(Inner {
                api: deps.api,
                store: deps.store,
                runtime: deps.runtime,
                view: deps.view,
                drain_debounce: Cell::new(config.drain_debounce),
                config,
                state: RefCell::new(ChatState { conversation_id, messages, ..Default::default() }),
                queue: RefCell::new(queue),
                draining: Cell::new(false),
                drain_epoch: Cell::new(0),
                last_timestamp: Cell::new(last_timestamp),
            }),
        };

        let queued = client.inner.queue.borrow().len();
        if queued > 0 {
            info!("Restored {queued} queued message(s)");
            client.schedule_drain(client.inner.drain_debounce.get());
        }
        client.emit();
        client.refresh_conversations();
        client
    }

    pub fn snapshot(&self) -> ChatSnapshot {
        let state = self.inner.state.borrow();
        ChatSnapshot {
            conversation_id: state.conversation_id.clone(),
            messages: state.messages.clone(),
            streaming_text: state.streaming_text.clone(),
            phase: state.phase,
            status: state.status,
            queued: self.inner.queue.borrow().len(),
            error: state.error.clone(),
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.inner.state.borrow().status
    }

    pub fn queue(&self) -> Ref<'_, OfflineQueue> {
        self.inner.queue.borrow()
    }

    pub fn runtime(&self) -> Rc<dyn Runtime> {
        self.inner.runtime.clone()
    }

    /// Pushes the current state to the view.
    pub(crate) fn emit(&self) {
        let snapshot = self.snapshot();
        self.inner.view.render(&snapshot);
    }

    pub fn refresh_conversations(&self) {
        match conversations::list(self.inner.store.as_ref()) {
            Ok(list) => self.inner.view.conversations_changed(&list),
            Err(e) => error!("Failed to load conversations: {e}"),
        }
    }

    /// Timestamp for a new user message. Strictly increasing per client, so the
    /// `msg-`/`offline-` keys derived from it never collide.
    pub(crate) fn next_message_timestamp(&self) -> i64 {
        let timestamp = self.inner.runtime.now_ms().max(self.inner.last_timestamp.get() + 1);
        self.inner.last_timestamp.set(timestamp);
        timestamp
    }

    /// Current conversation id, creating `conv-<epoch-ms>` on first use.
    pub(crate) fn ensure_conversation(&self) -> String {
        if let Some(id) = self.inner.state.borrow().conversation_id.clone() {
            return id;
        }
        let id = format!("conv-{}", self.inner.runtime.now_ms());
        if let Err(e) = self.inner.store.set(CURRENT_CONVERSATION_KEY, &id) {
            warn!("Failed to persist current conversation: {e}");
        }
        self.inner.state.borrow_mut().conversation_id = Some(id.clone());
        id
    }

    /// Starts an empty conversation. Ignored while a send is in flight.
    pub fn new_conversation(&self) {
        {
            let mut state = self.inner.state.borrow_mut();
            if state.phase.is_in_flight() {
                return;
            }
            state.conversation_id = None;
            state.messages.clear();
            state.streaming_text = None;
            state.phase = SendPhase::Idle;
            state.error = None;
        }
        if let Err(e) = self.inner.store.remove(CURRENT_CONVERSATION_KEY) {
            warn!("Failed to clear current conversation: {e}");
        }
        self.emit();
    }

    /// Switches to a stored conversation. Ignored while a send is in flight.
    pub fn open_conversation(&self, conversation_id: &str) {
        let messages = conversations::load_messages(self.inner.store.as_ref(), conversation_id)
            .unwrap_or_else(|e| {
                warn!("Failed to load messages for {conversation_id}: {e}");
                Vec::new()
            });
        {
            let mut state = self.inner.state.borrow_mut();
            if state.phase.is_in_flight() {
                return;
            }
            state.conversation_id = Some(conversation_id.to_string());
            state.messages = messages;
            state.streaming_text = None;
            state.phase = SendPhase::Idle;
            state.error = None;
        }
        if let Err(e) = self.inner.store.set(CURRENT_CONVERSATION_KEY, conversation_id) {
            warn!("Failed to persist current conversation: {e}");
        }
        self.emit();
    }

    pub fn dismiss_error(&self) {
        self.inner.state.borrow_mut().error = None;
        self.emit();
    }

    /// Persists the visible history of the current conversation.
    pub(crate) fn persist_messages(&self) {
        let state = self.inner.state.borrow();
        if let Some(id) = state.conversation_id.as_deref() {
            if let Err(e) = conversations::save_messages(self.inner.store.as_ref(), id, &state.messages) {
                warn!("Failed to persist messages for {id}: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{KeyValueStore, OFFLINE_QUEUE_KEY};
    use crate::testing::{run_local, Harness};

    #[test]
    fn test_restores_current_conversation_and_history() {
        let harness = Harness::new();
        harness.store.set(CURRENT_CONVERSATION_KEY, "conv-5").unwrap();
        conversations::save_messages(harness.store.as_ref(), "conv-5", &[Message::user("hi", 1)])
            .unwrap();

        let client = harness.client();

        let snapshot = client.snapshot();
        assert_eq!(snapshot.conversation_id.as_deref(), Some("conv-5"));
        assert_eq!(snapshot.messages, vec![Message::user("hi", 1)]);
        assert_eq!(harness.view.last().unwrap(), snapshot);
    }

    #[test]
    fn test_corrupt_queue_starts_empty() {
        let harness = Harness::new();
        harness.store.set(OFFLINE_QUEUE_KEY, "not json").unwrap();
        let client = harness.client();
        assert!(client.queue().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_message_timestamps_increase_past_restored_queue() {
        run_local(async {
            let harness = Harness::new();
            let mut queue = OfflineQueue::default();
            queue
                .enqueue(harness.store.as_ref(), "conv-1", Message::user("future", 9_999_999_999_999))
                .unwrap();
            let client = harness.client();

            let first = client.next_message_timestamp();
            let second = client.next_message_timestamp();

            assert_eq!(first, 10_000_000_000_000);
            assert_eq!(second, first + 1);
        })
        .await;
    }

    #[test]
    fn test_new_conversation_clears_state() {
        let harness = Harness::new();
        harness.store.set(CURRENT_CONVERSATION_KEY, "conv-5").unwrap();
        let client = harness.client();

        client.new_conversation();

        assert_eq!(client.snapshot().conversation_id, None);
        assert_eq!(harness.store.get(CURRENT_CONVERSATION_KEY).unwrap(), None);
    }

    #[test]
    fn test_open_conversation_loads_its_messages() {
        let harness = Harness::new();
        conversations::save_messages(harness.store.as_ref(), "conv-9", &[Message::user("yo", 3)])
            .unwrap();
        let client = harness.client();

        client.open_conversation("conv-9");

        assert_eq!(client.snapshot().messages, vec![Message::user("yo", 3)]);
        assert_eq!(
            harness.store.get(CURRENT_CONVERSATION_KEY).unwrap().as_deref(),
            Some("conv-9")
        );
    }
}
