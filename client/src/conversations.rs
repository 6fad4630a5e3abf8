//! Locally kept conversation list and per-conversation message history.

use crate::models::{Conversation, Message};
use crate::store::{self, KeyValueStore, StoreError, CONVERSATIONS_KEY};

const TITLE_MAX_CHARS: usize = 60;

fn title_from(text: &str) -> String {
    let t = text.trim();
    if t.chars().count() > TITLE_MAX_CHARS {
        format!("{}…", t.chars().take(TITLE_MAX_CHARS).collect::<String>())
    } else {
        t.to_string()
    }
}

/// All known conversations, newest first.
pub fn list(store: &dyn KeyValueStore) -> Result<Vec<Conversation>, StoreError> {
    let mut conversations: Vec<Conversation> =
        store::get_json(store, CONVERSATIONS_KEY)?.unwrap_or_default();
    conversations.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    Ok(conversations)
}

/// Records a completed exchange. The title is fixed by the first exchange.
pub fn record_exchange(
    store: &dyn KeyValueStore,
    conversation_id: &str,
    user_text: &str,
    reply: &Message,
) -> Result<(), StoreError> {
    let mut conversations: Vec<Conversation> =
        store::get_json(store, CONVERSATIONS_KEY)?.unwrap_or_default();

    match conversations.iter_mut().find(|c| c.id == conversation_id) {
        Some(existing) => {
            existing.last_message = reply.content.clone();
            existing.timestamp = reply.timestamp;
        }
        None => conversations.push(Conversation {
            id: conversation_id.to_string(),
            title: title_from(user_text),
            last_message: reply.content.clone(),
            timestamp: reply.timestamp,
        }),
    }

    store::set_json(store, CONVERSATIONS_KEY, &conversations)
}

pub fn load_messages(
    store: &dyn KeyValueStore,
    conversation_id: &str,
) -> Result<Vec<Message>, StoreError> {
    Ok(store::get_json(store, &store::messages_key(conversation_id))?.unwrap_or_default())
}

pub fn save_messages(
    store: &dyn KeyValueStore,
    conversation_id: &str,
    messages: &[Message],
) -> Result<(), StoreError> {
    store::set_json(store, &store::messages_key(conversation_id), messages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn test_first_exchange_sets_title() {
        let store = MemoryStore::new();
        record_exchange(&store, "conv-1", "  What is Rust?  ", &Message::assistant("A language.", 10))
            .unwrap();
        record_exchange(&store, "conv-1", "And Go?", &Message::assistant("Also one.", 20)).unwrap();

        let all = list(&store).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].title, "What is Rust?");
        assert_eq!(all[0].last_message, "Also one.");
        assert_eq!(all[0].timestamp, 20);
    }

    #[test]
    fn test_long_titles_are_truncated() {
        assert_eq!(title_from(&"a".repeat(80)).chars().count(), TITLE_MAX_CHARS + 1);
    }

    #[test]
    fn test_list_is_newest_first() {
        let store = MemoryStore::new();
        record_exchange(&store, "old", "a", &Message::assistant("x", 1)).unwrap();
        record_exchange(&store, "new", "b", &Message::assistant("y", 2)).unwrap();
        let ids: Vec<String> = list(&store).unwrap().into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec!["new", "old"]);
    }

    #[test]
    fn test_messages_round_trip_per_conversation() {
        let store = MemoryStore::new();
        save_messages(&store, "c1", &[Message::user("hi", 1)]).unwrap();
        assert_eq!(load_messages(&store, "c1").unwrap().len(), 1);
        assert!(load_messages(&store, "c2").unwrap().is_empty());
    }
}
