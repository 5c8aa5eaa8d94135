use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::Mutex;

use super::{ ConversationStore, StoreError };
use crate::models::chat::{ ConversationRecord, Turn };

/// In-process store for development and tests. Writers are serialized behind
/// a lock, so the primary path cannot conflict here; both operations are
/// still exposed to satisfy the store contract.
#[derive(Default)]
pub struct MemoryConversationStore {
    records: Mutex<HashMap<String, ConversationRecord>>,
}

impl MemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationStore for MemoryConversationStore {
    async fn load(&self, user_id: &str) -> Result<Option<ConversationRecord>, StoreError> {
        let records = self.records.lock().await;
        Ok(records.get(user_id).cloned())
    }

    async fn append_turn(
        &self,
        user_id: &str,
        turn: &Turn
    ) -> Result<ConversationRecord, StoreError> {
        let mut records = self.records.lock().await;
        let record = records
            .entry(user_id.to_string())
            .or_insert_with(|| ConversationRecord::new(user_id));
        record.turns.push(turn.clone());
        record.updated_at = Utc::now().timestamp_millis();
        Ok(record.clone())
    }

    async fn push_turn(&self, user_id: &str, turn: &Turn) -> Result<(), StoreError> {
        self.append_turn(user_id, turn).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(text: &str, ts: i64) -> Turn {
        Turn {
            user_text: text.to_string(),
            assistant_text: format!("re: {}", text),
            timestamp: ts,
        }
    }

    #[tokio::test]
    async fn load_of_unknown_user_is_absent_not_error() {
        let store = MemoryConversationStore::new();
        assert!(store.load("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn first_append_creates_the_record() {
        let store = MemoryConversationStore::new();
        let record = store.append_turn("u1", &turn("hello", 1)).await.unwrap();
        assert_eq!(record.user_id, "u1");
        assert_eq!(record.turns.len(), 1);
        assert!(record.updated_at > 0);

        let loaded = store.load("u1").await.unwrap().unwrap();
        assert_eq!(loaded.turns[0].user_text, "hello");
    }

    #[tokio::test]
    async fn append_is_not_deduplicated() {
        let store = MemoryConversationStore::new();
        let t = turn("same", 7);
        store.append_turn("u1", &t).await.unwrap();
        let record = store.append_turn("u1", &t).await.unwrap();
        assert_eq!(record.turns.len(), 2);
        assert_eq!(record.turns[0], record.turns[1]);
    }

    #[tokio::test]
    async fn push_turn_upserts_on_absent_record() {
        let store = MemoryConversationStore::new();
        store.push_turn("u2", &turn("first", 1)).await.unwrap();
        let record = store.load("u2").await.unwrap().unwrap();
        assert_eq!(record.turns.len(), 1);
    }
}
