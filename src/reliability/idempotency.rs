use std::collections::HashMap;

use parking_lot::Mutex;

use crate::models::SendMessageResponse;

#[derive(Debug, Clone)]
struct IdempotencyEntry {
    payload: SendMessageResponse,
    expires_at: i64,
}

/// Response cache keyed by caller-supplied idempotency keys.
///
/// At most one entry per key. Expired entries read as absent and are evicted on
/// access; `sweep` clears the rest in bulk.
#[derive(Default)]
pub struct IdempotencyCache {
    entries: Mutex<HashMap<String, IdempotencyEntry>>,
}

impl IdempotencyCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str, now: i64) -> Option<SendMessageResponse> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if now < entry.expires_at => Some(entry.payload.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Stores `payload` until `now + ttl_ms`, replacing any previous entry.
    pub fn put(&self, key: &str, payload: SendMessageResponse, now: i64, ttl_ms: i64) {
        self.entries
            .lock()
            .insert(key.to_string(), IdempotencyEntry { payload, expires_at: now + ttl_ms });
    }

    /// Evicts every expired entry, returning how many were removed.
    pub fn sweep(&self, now: i64) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, e| now < e.expires_at);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }
}
