//! Local read-through cache of conversation history.
//!
//! Entries hold the server's raw message list verbatim under
//! `conversation_<id>` and are normalized into [`ChatMessage`] on the way
//! out, so neither historical message shape leaks past this module.

use crate::core::constants::CONVERSATION_KEY_PREFIX;
use crate::core::message::ChatMessage;
use crate::core::storage::{SessionStorage, StorageError};
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

#[derive(Clone)]
pub struct ConversationCache {
    storage: Arc<dyn SessionStorage>,
}

impl ConversationCache {
    pub fn new(storage: Arc<dyn SessionStorage>) -> Self {
        Self { storage }
    }

    pub fn key_for(conversation_id: i64) -> String {
        format!("{CONVERSATION_KEY_PREFIX}{conversation_id}")
    }

    /// Cached history for `conversation_id`. Missing, unreadable, and
    /// corrupt entries all read as a miss.
    pub fn read(&self, conversation_id: i64) -> Option<Vec<ChatMessage>> {
        let raw = match self.storage.get(&Self::key_for(conversation_id)) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                warn!(conversation_id, error = %err, "could not read cached messages");
                return None;
            }
        };

        let entries = match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Array(entries)) => entries,
            Ok(_) => {
                warn!(conversation_id, "cached messages are not a list; ignoring");
                return None;
            }
            Err(err) => {
                warn!(conversation_id, error = %err, "error parsing cached messages");
                return None;
            }
        };

        entries
            .iter()
            .enumerate()
            .map(|(index, entry)| ChatMessage::from_raw(conversation_id, index, entry))
            .collect::<Option<Vec<_>>>()
            .or_else(|| {
                warn!(conversation_id, "cached messages contain a malformed entry; ignoring");
                None
            })
    }

    /// Store the server's message list as-is.
    pub fn write(&self, conversation_id: i64, raw_messages: &[Value]) -> Result<(), StorageError> {
        let encoded = serde_json::to_string(raw_messages)?;
        self.storage.set(&Self::key_for(conversation_id), &encoded)
    }

    pub fn invalidate(&self, conversation_id: i64) {
        if let Err(err) = self.storage.remove(&Self::key_for(conversation_id)) {
            warn!(conversation_id, error = %err, "could not invalidate cached messages");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::message::Sender;
    use crate::core::storage::MemoryStorage;
    use serde_json::json;

    fn cache() -> (ConversationCache, Arc<dyn SessionStorage>) {
        let storage: Arc<dyn SessionStorage> = Arc::new(MemoryStorage::new());
        (ConversationCache::new(Arc::clone(&storage)), storage)
    }

    #[test]
    fn write_then_read_normalizes_both_shapes() {
        let (cache, storage) = cache();
        let legacy = vec![
            json!({"sender": "user", "text": "Hi", "timestamp": "2024-05-01T10:00:00Z"}),
            json!({"sender": "ai", "text": "Hello!", "timestamp": "2024-05-01T10:00:01Z"}),
        ];
        let current = vec![
            json!({"role": "user", "content": "Hi", "timestamp": "2024-05-01T10:00:00Z"}),
            json!({"role": "assistant", "content": "Hello!", "timestamp": "2024-05-01T10:00:01Z"}),
        ];

        cache.write(5, &legacy).unwrap();
        let from_legacy = cache.read(5).unwrap();
        assert_eq!(
            storage.get("conversation_5").unwrap().unwrap(),
            serde_json::to_string(&legacy).unwrap()
        );

        cache.write(5, &current).unwrap();
        let from_current = cache.read(5).unwrap();

        assert_eq!(from_legacy, from_current);
        assert_eq!(from_current.len(), 2);
        assert_eq!(from_current[0].sender, Sender::User);
        assert_eq!(from_current[1].text, "Hello!");
        assert_eq!(from_current[1].sender, Sender::Assistant);
    }

    #[test]
    fn corrupt_entries_are_a_miss() {
        let (cache, storage) = cache();
        storage.set("conversation_9", "{broken").unwrap();
        assert_eq!(cache.read(9), None);

        storage.set("conversation_9", "{\"not\": \"a list\"}").unwrap();
        assert_eq!(cache.read(9), None);

        storage.set("conversation_9", "[1, 2]").unwrap();
        assert_eq!(cache.read(9), None);
    }

    #[test]
    fn invalidate_removes_only_that_conversation() {
        let (cache, _storage) = cache();
        cache.write(1, &[json!({"role": "user", "content": "a"})]).unwrap();
        cache.write(2, &[json!({"role": "user", "content": "b"})]).unwrap();

        cache.invalidate(1);

        assert_eq!(cache.read(1), None);
        assert_eq!(cache.read(2).map(|messages| messages.len()), Some(1));
    }

    #[test]
    fn empty_history_is_a_hit() {
        let (cache, _storage) = cache();
        cache.write(4, &[]).unwrap();
        assert_eq!(cache.read(4), Some(Vec::new()));
    }
}
