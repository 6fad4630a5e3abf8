use std::collections::VecDeque;
use std::time::Duration;

use log::{error, info, warn};
use serde::{Deserialize, Serialize};

use crate::api::ApiError;
use crate::client::ChatClient;
use crate::conversations;
use crate::models::{ConnectionStatus, Message, SendMessageRequest};
use crate::store::{self, KeyValueStore, StoreError, OFFLINE_QUEUE_KEY};

/// A user message waiting for delivery, bound to the conversation it was written in.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedMessage {
    pub conversation_id: String,
    pub message: Message,
}

impl QueuedMessage {
    /// Replays are keyed apart from live sends of the same message.
    pub fn idempotency_key(&self) -> String {
        format!("offline-{}", self.message.timestamp)
    }
}

/// Persistent FIFO of user messages that have not been delivered yet.
///
/// Entries leave the queue only from the front, and only once the server has
/// answered them.
#[derive(Debug, Default)]
pub struct OfflineQueue {
    entries: VecDeque<QueuedMessage>,
}

impl OfflineQueue {
    pub fn load(store: &dyn KeyValueStore) -> Result<Self, StoreError> {
        let entries: Vec<QueuedMessage> =
            store::get_json(store, OFFLINE_QUEUE_KEY)?.unwrap_or_default();
        Ok(Self { entries: entries.into() })
    }

    /// Appends `message` and persists the whole queue. On a storage failure the
    /// message is still held in memory.
    pub fn enqueue(
        &mut self,
        store: &dyn KeyValueStore,
        conversation_id: &str,
        message: Message,
    ) -> Result<(), StoreError> {
        self.entries.push_back(QueuedMessage {
            conversation_id: conversation_id.to_string(),
            message,
        });
        self.persist(store)
    }

    /// Removes the oldest entry after its delivery was confirmed.
    pub fn confirm_front(
        &mut self,
        store: &dyn KeyValueStore,
    ) -> Result<Option<QueuedMessage>, StoreError> {
        let delivered = self.entries.pop_front();
        self.persist(store)?;
        Ok(delivered)
    }

    pub fn front(&self) -> Option<&QueuedMessage> {
        self.entries.front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueuedMessage> {
        self.entries.iter()
    }

    /// Newest timestamp held, if any.
    pub fn latest_timestamp(&self) -> Option<i64> {
        self.entries.iter().map(|e| e.message.timestamp).max()
    }

    fn persist(&self, store: &dyn KeyValueStore) -> Result<(), StoreError> {
        let entries: Vec<&QueuedMessage> = self.entries.iter().collect();
        store::set_json(store, OFFLINE_QUEUE_KEY, &entries)
    }
}

/// Result of one drain pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub delivered: usize,
    pub remaining: usize,
    /// The failure that stopped the pass early, if any.
    pub halted: Option<ApiError>,
}

/// Places `reply` right after the user message it answers.
fn insert_reply(messages: &mut Vec<Message>, user_message: &Message, reply: Message) {
    match messages.iter().position(|m| m == user_message) {
        Some(pos) => messages.insert(pos + 1, reply),
        None => messages.push(reply),
    }
}

impl ChatClient {
    /// Delivers queued messages oldest first, stopping at the first failure.
    ///
    /// Each entry goes out under the conversation it was written in, with that
    /// conversation's messages preceding it as history. A halted drain is retried
    /// as a whole after the configured delay. Only one drain runs at a time; a
    /// call while one is active returns immediately.
    pub async fn drain(&self) -> DrainReport {
        if self.inner.draining.get() || self.inner.queue.borrow().is_empty() {
            return DrainReport { remaining: self.inner.queue.borrow().len(), ..Default::default() };
        }
        self.inner.draining.set(true);
        info!("Draining {} queued message(s)", self.inner.queue.borrow().len());

        let mut report = DrainReport::default();

        loop {
            let Some(entry) = self.inner.queue.borrow().front().cloned() else {
                break;
            };

            let request = SendMessageRequest {
                conversation_id: entry.conversation_id.clone(),
                message: entry.message.content.clone(),
                messages: self.history_before(&entry),
                idempotency_key: Some(entry.idempotency_key()),
            };

            match self.inner.api.send_message(&request).await {
                Ok(response) => {
                    let confirmed = self.inner.queue.borrow_mut().confirm_front(self.inner.store.as_ref());
                    if let Err(e) = confirmed {
                        error!(
                            "Delivered message {} but failed to persist queue: {e}",
                            entry.message.timestamp
                        );
                    }
                    self.deliver_reply(&entry, response.message);
                    report.delivered += 1;
                    self.emit();
                }
                Err(err) => {
                    warn!("Drain stopped at message {}: {err}", entry.message.timestamp);
                    report.halted = Some(err);
                    break;
                }
            }
        }

        self.inner.draining.set(false);
        report.remaining = self.inner.queue.borrow().len();

        if report.halted.is_some() {
            self.schedule_drain(self.inner.config.drain_retry_delay);
        } else if report.remaining == 0 {
            info!("Offline queue drained ({} delivered)", report.delivered);
            self.refresh_conversations();
        }
        self.emit();
        report
    }

    /// Messages of the entry's conversation that precede it.
    fn history_before(&self, entry: &QueuedMessage) -> Vec<Message> {
        let messages = self.conversation_messages(&entry.conversation_id);
        let end = messages
            .iter()
            .position(|m| *m == entry.message)
            .unwrap_or(messages.len());
        messages[..end].to_vec()
    }

    /// Visible messages when `conversation_id` is open, stored ones otherwise.
    fn conversation_messages(&self, conversation_id: &str) -> Vec<Message> {
        {
            let state = self.inner.state.borrow();
            if state.conversation_id.as_deref() == Some(conversation_id) {
                return state.messages.clone();
            }
        }
        conversations::load_messages(self.inner.store.as_ref(), conversation_id).unwrap_or_else(|e| {
            warn!("Failed to load messages for {conversation_id}: {e}");
            Vec::new()
        })
    }

    /// Files a delivered reply under the conversation the entry belongs to.
    fn deliver_reply(&self, entry: &QueuedMessage, reply: Message) {
        let conversation_id = entry.conversation_id.as_str();
        let is_open = self.inner.state.borrow().conversation_id.as_deref() == Some(conversation_id);

        if is_open {
            insert_reply(&mut self.inner.state.borrow_mut().messages, &entry.message, reply.clone());
            self.persist_messages();
        } else {
            let mut stored = self.conversation_messages(conversation_id);
            insert_reply(&mut stored, &entry.message, reply.clone());
            if let Err(e) = conversations::save_messages(self.inner.store.as_ref(), conversation_id, &stored) {
                warn!("Failed to persist messages for {conversation_id}: {e}");
            }
        }

        if let Err(e) = conversations::record_exchange(
            self.inner.store.as_ref(),
            conversation_id,
            &entry.message.content,
            &reply,
        ) {
            warn!("Failed to update conversation list: {e}");
        }
    }

    /// Runs a drain after `delay` unless another schedule or an offline transition
    /// supersedes it first.
    pub(crate) fn schedule_drain(&self, delay: Duration) {
        let epoch = self.inner.drain_epoch.get() + 1;
        self.inner.drain_epoch.set(epoch);

        let client = self.clone();
        let sleep = self.inner.runtime.sleep(delay);
        self.inner.runtime.spawn(Box::pin(async move {
            sleep.await;
            if client.inner.drain_epoch.get() != epoch || client.status() == ConnectionStatus::Offline {
                return;
            }
            client.drain().await;
        }));
    }

    pub(crate) fn cancel_scheduled_drains(&self) {
        self.inner.drain_epoch.set(self.inner.drain_epoch.get() + 1);
    }
}
